//! Interchange header detection
//!
//! Detection runs once at the start of every interchange. It reads far
//! enough to know the dialect, delimiters and version, then pushes every
//! byte it read back onto the source so the lexer starts at the header tag.
//! The only bytes consumed for good are an EDIFACT `UNA` service string
//! advice, which never reaches the event stream.

use crate::source::ByteSource;
use edi_core::{Delimiters, Error, Result, Standard};
use std::io::Read;
use tracing::debug;

/// Length of an X12 `ISA` segment including its terminator.
pub const ISA_LENGTH: usize = 106;

/// Offsets of the element separator within the fixed-width `ISA` segment.
const ISA_SEPARATOR_OFFSETS: [usize; 16] =
    [3, 6, 17, 20, 31, 34, 50, 53, 69, 76, 81, 83, 89, 99, 101, 103];

const ISA_REPETITION_OFFSET: usize = 82;
const ISA_VERSION: std::ops::Range<usize> = 84..89;
const ISA_COMPONENT_OFFSET: usize = 104;
const ISA_TERMINATOR_OFFSET: usize = 105;

/// First interchange version whose ISA11 is a repetition separator.
const X12_REPETITION_VERSION: &str = "00402";

/// Service string advice: `UNA` followed by six characters.
const UNA_LENGTH: usize = 9;

/// Upper bound on the size of a `UNB` segment read ahead during detection.
const UNB_MAX_LENGTH: usize = 1024;

/// Character set used to decode element text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// UTF-8, with invalid sequences replaced
    Utf8,
    /// ISO-8859-1 (EDIFACT syntax level C)
    Latin1,
}

impl Charset {
    /// Decode raw element bytes.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    fn for_syntax_identifier(identifier: &str) -> Self {
        match identifier {
            "UNOC" => Charset::Latin1,
            _ => Charset::Utf8,
        }
    }
}

/// Everything known about an interchange once its header has been seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub standard: Standard,
    pub delimiters: Delimiters,
    /// `[ISA12]` for X12, `[syntax identifier, syntax version]` for EDIFACT
    pub version: Vec<String>,
    pub charset: Charset,
    /// Tag of the header segment the lexer will read first
    pub header_tag: &'static str,
}

/// Detect the next interchange.
///
/// Returns `Ok(None)` when only whitespace remains.
///
/// # Errors
///
/// Returns a fatal [`Error::Parse`] when the header is truncated, its
/// delimiters are inconsistent, or it does not start with `ISA`, `UNA` or
/// `UNB`.
pub fn detect<R: Read>(source: &mut ByteSource<R>) -> Result<Option<Dialect>> {
    if source.skip_whitespace()?.is_none() {
        return Ok(None);
    }

    let mut tag = [0u8; 3];
    let read = source.read_up_to(&mut tag)?;
    if read < tag.len() {
        return Err(header_error(source, "incomplete interchange header"));
    }

    let dialect = match &tag {
        b"ISA" => detect_x12(source, tag)?,
        b"UNA" => {
            let delimiters = read_una(source)?;
            if source.skip_whitespace()?.is_none() {
                return Err(header_error(source, "UNB segment expected after UNA"));
            }
            let mut unb = [0u8; 3];
            let read = source.read_up_to(&mut unb)?;
            if read < unb.len() || &unb != b"UNB" {
                return Err(header_error(source, "UNB segment expected after UNA"));
            }
            detect_edifact(source, unb, delimiters)?
        }
        b"UNB" => detect_edifact(source, tag, default_edifact_delimiters())?,
        other => {
            let found = String::from_utf8_lossy(other).into_owned();
            return Err(header_error(
                source,
                format!("unrecognized interchange header '{found}'"),
            ));
        }
    };

    debug!(
        "Detected {} interchange, version {:?}",
        dialect.standard, dialect.version
    );
    Ok(Some(dialect))
}

/// EDIFACT delimiters used when no `UNA` is present.
#[must_use]
pub fn default_edifact_delimiters() -> Delimiters {
    Delimiters::new(b'\'', b'+')
        .component(b':')
        .decimal(b'.')
        .release(b'?')
        .repetition(b'*')
}

fn detect_x12<R: Read>(source: &mut ByteSource<R>, tag: [u8; 3]) -> Result<Dialect> {
    let mut header = [0u8; ISA_LENGTH];
    header[..3].copy_from_slice(&tag);
    let read = source.read_up_to(&mut header[3..])?;
    if read < ISA_LENGTH - 3 {
        return Err(header_error(source, "ISA segment is shorter than 106 bytes"));
    }

    let element = header[3];
    if let Some(offset) = ISA_SEPARATOR_OFFSETS
        .iter()
        .copied()
        .find(|&offset| header[offset] != element)
    {
        return Err(header_error(
            source,
            format!("ISA element separator expected at byte {offset}"),
        ));
    }

    let version = String::from_utf8_lossy(&header[ISA_VERSION]).into_owned();
    let mut delimiters = Delimiters::new(header[ISA_TERMINATOR_OFFSET], element)
        .component(header[ISA_COMPONENT_OFFSET])
        .decimal(b'.');
    if version.as_str() >= X12_REPETITION_VERSION {
        delimiters = delimiters.repetition(header[ISA_REPETITION_OFFSET]);
    }

    source.unread(&header);

    Ok(Dialect {
        standard: Standard::X12,
        delimiters,
        version: vec![version],
        charset: Charset::Utf8,
        header_tag: "ISA",
    })
}

fn read_una<R: Read>(source: &mut ByteSource<R>) -> Result<Delimiters> {
    let mut advice = [0u8; UNA_LENGTH - 3];
    let read = source.read_up_to(&mut advice)?;
    if read < advice.len() {
        return Err(header_error(source, "UNA service string advice is incomplete"));
    }

    let [component, element, decimal, release, repetition, terminator] = advice;
    let mut delimiters = Delimiters::new(terminator, element)
        .component(component)
        .decimal(decimal)
        .repetition(repetition);
    if release != b' ' {
        delimiters = delimiters.release(release);
    }
    Ok(delimiters)
}

fn detect_edifact<R: Read>(
    source: &mut ByteSource<R>,
    tag: [u8; 3],
    delimiters: Delimiters,
) -> Result<Dialect> {
    let mut segment = tag.to_vec();
    let mut released = false;
    loop {
        let Some(byte) = source.next_byte()? else {
            return Err(header_error(source, "UNB segment is incomplete"));
        };
        segment.push(byte);
        if released {
            released = false;
        } else if delimiters.release_byte() == Some(byte) {
            released = true;
        } else if byte == delimiters.segment_byte() {
            break;
        }
        if segment.len() > UNB_MAX_LENGTH {
            return Err(header_error(source, "UNB segment terminator not found"));
        }
    }

    let syntax = syntax_identifier(&segment, &delimiters);
    let charset = syntax
        .first()
        .map_or(Charset::Utf8, |id| Charset::for_syntax_identifier(id));

    source.unread(&segment);

    Ok(Dialect {
        standard: Standard::Edifact,
        delimiters,
        version: syntax,
        charset,
        header_tag: "UNB",
    })
}

/// Components of `UNB` S001 (syntax identifier, syntax version), with
/// release characters removed.
fn syntax_identifier(segment: &[u8], delimiters: &Delimiters) -> Vec<String> {
    let mut components = Vec::new();
    let mut current = Vec::new();
    let mut released = false;

    if segment.get(3) != Some(&delimiters.element_byte()) {
        return components;
    }

    for &byte in &segment[4..] {
        if released {
            current.push(byte);
            released = false;
        } else if delimiters.release_byte() == Some(byte) {
            released = true;
        } else if delimiters.component_byte() == Some(byte) {
            components.push(String::from_utf8_lossy(&current).into_owned());
            current.clear();
            if components.len() == 2 {
                return components;
            }
        } else if byte == delimiters.element_byte() || byte == delimiters.segment_byte() {
            break;
        } else {
            current.push(byte);
        }
    }

    components.push(String::from_utf8_lossy(&current).into_owned());
    components
}

fn header_error<R: Read>(source: &ByteSource<R>, message: impl Into<String>) -> Error {
    Error::parse(1, source.offset(), message)
}
