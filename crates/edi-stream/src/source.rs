//! Buffered byte source with pushback
//!
//! Dialect detection reads ahead through the interchange header and hands
//! the bytes back, so the lexer sees the header exactly as it arrived.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};

/// Forward-only byte source over a caller-supplied reader.
pub struct ByteSource<R: Read> {
    inner: BufReader<R>,
    pushback: VecDeque<u8>,
    offset: u64,
}

impl<R: Read> ByteSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            pushback: VecDeque::new(),
            offset: 0,
        }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read one byte, or `None` at end of input.
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = match self.pushback.pop_front() {
            Some(byte) => Some(byte),
            None => {
                let buf = self.inner.fill_buf()?;
                let byte = buf.first().copied();
                if byte.is_some() {
                    self.inner.consume(1);
                }
                byte
            }
        };
        if byte.is_some() {
            self.offset += 1;
        }
        Ok(byte)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(&byte) = self.pushback.front() {
            return Ok(Some(byte));
        }
        Ok(self.inner.fill_buf()?.first().copied())
    }

    /// Return bytes to the front of the source, in their original order.
    pub fn unread(&mut self, bytes: &[u8]) {
        for &byte in bytes.iter().rev() {
            self.pushback.push_front(byte);
        }
        self.offset = self.offset.saturating_sub(bytes.len() as u64);
    }

    /// Skip ASCII whitespace; returns the first other byte without
    /// consuming it.
    pub fn skip_whitespace(&mut self) -> io::Result<Option<u8>> {
        while let Some(byte) = self.peek_byte()? {
            if !byte.is_ascii_whitespace() {
                return Ok(Some(byte));
            }
            self.next_byte()?;
        }
        Ok(None)
    }

    /// Read up to `buf.len()` bytes, pushed-back bytes first.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let count = if self.pushback.is_empty() {
            self.inner.read(buf)?
        } else {
            let count = buf.len().min(self.pushback.len());
            for (slot, byte) in buf.iter_mut().zip(self.pushback.drain(..count)) {
                *slot = byte;
            }
            count
        };
        self.offset += count as u64;
        Ok(count)
    }

    /// Fill `buf` completely unless input ends first; returns bytes read.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let count = self.read(&mut buf[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        Ok(filled)
    }

    /// Give back the caller's reader. Buffered bytes not yet consumed are
    /// lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}
