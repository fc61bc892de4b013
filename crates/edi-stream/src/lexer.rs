//! Tokenizer for delimited EDI text
//!
//! The lexer knows nothing about envelopes or schemas. It splits the byte
//! stream into segment tags and element values, reporting for each token
//! which delimiter ended it, and switches into binary mode when told the
//! length of a raw payload.

use crate::dialect::Charset;
use crate::source::ByteSource;
use edi_core::{Delimiters, Error, Result};
use std::io::{self, Read};

/// The delimiter that ended a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Element,
    Component,
    Repetition,
    Segment,
}

/// One raw token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A segment tag and the delimiter after it
    Tag { tag: String, next: Boundary },
    /// Element or component text, release characters removed
    Value { text: String, next: Boundary },
    /// A binary payload of `length` bytes is next; read it with
    /// [`Lexer::read_binary`]
    Binary { length: u64 },
    /// End of a segment whose last element was binary
    SegmentEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Between segments
    Idle,
    /// Inside a segment
    Segment,
    /// Binary length declared, payload not yet announced
    BinaryDeclared(u64),
    /// Payload announced; the remaining bytes belong to the caller
    Binary(u64),
}

/// Single-pass tokenizer over one interchange.
pub struct Lexer {
    delimiters: Delimiters,
    charset: Charset,
    mode: Mode,
    /// Only element separators and the terminator split a fixed-width
    /// header; its component and repetition characters are data.
    fixed_header: bool,
    segments: i32,
}

impl Lexer {
    #[must_use]
    pub fn new(delimiters: Delimiters, charset: Charset) -> Self {
        Self {
            delimiters,
            charset,
            mode: Mode::Idle,
            fixed_header: false,
            segments: 0,
        }
    }

    /// Whether a binary payload has been declared or announced and not yet
    /// finished.
    #[must_use]
    pub fn in_binary(&self) -> bool {
        matches!(self.mode, Mode::BinaryDeclared(_) | Mode::Binary(_))
    }

    /// Read the next token.
    ///
    /// Returns `Ok(None)` when input ends between segments.
    ///
    /// # Errors
    ///
    /// Input ending inside a segment, a malformed tag and a binary payload
    /// not followed by the segment terminator are fatal parse errors.
    pub fn next_token<R: Read>(&mut self, source: &mut ByteSource<R>) -> Result<Option<Token>> {
        match self.mode {
            Mode::BinaryDeclared(length) => {
                self.mode = Mode::Binary(length);
                Ok(Some(Token::Binary { length }))
            }
            Mode::Binary(_) => self.finish_binary(source).map(Some),
            Mode::Idle => self.read_tag(source),
            Mode::Segment => self.read_value(source).map(Some),
        }
    }

    /// Declare that the next element is a binary payload of `length` bytes.
    pub fn begin_binary(&mut self, length: u64) {
        self.mode = Mode::BinaryDeclared(length);
    }

    /// Read payload bytes; returns 0 once the declared length is consumed.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` when input ends inside the payload.
    pub fn read_binary<R: Read>(
        &mut self,
        source: &mut ByteSource<R>,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        let Mode::Binary(remaining) = self.mode else {
            return Ok(0);
        };
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let limit = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let count = source.read(&mut buf[..limit])?;
        if count == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input ended inside binary element",
            ));
        }
        self.mode = Mode::Binary(remaining - count as u64);
        Ok(count)
    }

    /// Skip whatever the caller left of the payload and require the
    /// segment terminator right after it.
    fn finish_binary<R: Read>(&mut self, source: &mut ByteSource<R>) -> Result<Token> {
        let mut scratch = [0u8; 512];
        while self.read_binary(source, &mut scratch)? > 0 {}

        match source.next_byte()? {
            Some(byte) if byte == self.delimiters.segment_byte() => {
                self.mode = Mode::Idle;
                Ok(Token::SegmentEnd)
            }
            Some(byte) => Err(self.error(
                source,
                format!(
                    "segment terminator expected after binary element, found '{}'",
                    char::from(byte)
                ),
            )),
            None => Err(self.error(source, "input ended after binary element")),
        }
    }

    fn read_tag<R: Read>(&mut self, source: &mut ByteSource<R>) -> Result<Option<Token>> {
        if source.skip_whitespace()?.is_none() {
            return Ok(None);
        }
        self.segments += 1;

        let (bytes, next) = self.read_raw(source)?;
        if !is_segment_tag(&bytes) {
            let found = String::from_utf8_lossy(&bytes).into_owned();
            return Err(self.error(source, format!("invalid segment tag '{found}'")));
        }
        if !matches!(next, Boundary::Element | Boundary::Segment) {
            return Err(self.error(source, "segment tag must be followed by an element separator"));
        }

        let tag = String::from_utf8_lossy(&bytes).into_owned();
        self.fixed_header = tag == "ISA" && next == Boundary::Element;
        self.mode = if next == Boundary::Segment {
            Mode::Idle
        } else {
            Mode::Segment
        };
        Ok(Some(Token::Tag { tag, next }))
    }

    fn read_value<R: Read>(&mut self, source: &mut ByteSource<R>) -> Result<Token> {
        let (bytes, next) = self.read_raw(source)?;
        if next == Boundary::Segment {
            self.mode = Mode::Idle;
            self.fixed_header = false;
        }
        Ok(Token::Value {
            text: self.charset.decode(&bytes),
            next,
        })
    }

    /// Read up to the next unreleased delimiter.
    fn read_raw<R: Read>(&mut self, source: &mut ByteSource<R>) -> Result<(Vec<u8>, Boundary)> {
        let mut bytes = Vec::new();
        let mut released = false;

        loop {
            let Some(byte) = source.next_byte()? else {
                return Err(self.error(source, "unexpected end of data inside segment"));
            };

            if released {
                bytes.push(byte);
                released = false;
            } else if self.delimiters.release_byte() == Some(byte) {
                released = true;
            } else if let Some(boundary) = self.boundary(byte) {
                return Ok((bytes, boundary));
            } else {
                bytes.push(byte);
            }
        }
    }

    fn boundary(&self, byte: u8) -> Option<Boundary> {
        if byte == self.delimiters.segment_byte() {
            Some(Boundary::Segment)
        } else if byte == self.delimiters.element_byte() {
            Some(Boundary::Element)
        } else if self.fixed_header {
            None
        } else if self.delimiters.component_byte() == Some(byte) {
            Some(Boundary::Component)
        } else if self.delimiters.repetition_byte() == Some(byte) {
            Some(Boundary::Repetition)
        } else {
            None
        }
    }

    fn error<R: Read>(&self, source: &ByteSource<R>, message: impl Into<String>) -> Error {
        Error::parse(self.segments, source.offset(), message)
    }
}

/// A letter followed by one or two letters or digits.
fn is_segment_tag(bytes: &[u8]) -> bool {
    matches!(bytes.len(), 2 | 3)
        && bytes[0].is_ascii_uppercase()
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
