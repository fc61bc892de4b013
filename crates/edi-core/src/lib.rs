#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi-core
//!
//! Shared vocabulary for the streaming EDI reader.
//!
//! This crate holds the types every other crate in the workspace speaks:
//! the event kinds produced by the reader, the positional [`Location`]
//! cursor, the delimiter set detected from an interchange header, and the
//! fixed taxonomy of validation errors reported as stream events.

/// Stream events and their kinds.
pub mod event;
/// Positional cursor reported with every event.
pub mod location;
/// Standards, delimiter roles and delimiter sets.
pub mod syntax;
/// Validation error taxonomy and categories.
pub mod validation;

pub use event::{Event, EventKind};
pub use location::Location;
pub use syntax::{DelimiterRole, Delimiters, Standard};
pub use validation::{ErrorCategory, ValidationError};

use thiserror::Error;

/// Errors returned at the reader's call boundary.
///
/// Validation problems never appear here; they are reported as events.
/// `Parse` and `Io` are fatal: once returned by an advance call the reader
/// is unusable. `IllegalState` and `IndexOutOfBounds` report misuse of the
/// API and leave the stream untouched.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error at segment {segment}, byte {offset}: {message}")]
    Parse {
        segment: i32,
        offset: u64,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No more events in stream")]
    EndOfStream,
}

impl Error {
    /// Build a fatal parse error.
    pub fn parse(segment: i32, offset: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            segment,
            offset,
            message: message.into(),
        }
    }

    /// Build an illegal-state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Build an index-out-of-bounds error.
    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::IndexOutOfBounds(message.into())
    }

    /// Whether this error leaves the reader unusable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Io(_))
    }

    /// Whether this error is a programming-contract violation by the caller.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::IllegalState(_) | Self::IndexOutOfBounds(_))
    }
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;
