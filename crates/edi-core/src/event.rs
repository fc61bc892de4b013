//! Events produced by the stream reader
//!
//! A well-formed interchange yields a properly nested sequence:
//!
//! ```text
//! StartInterchange
//!   StartSegment(ISA) ElementData... EndSegment
//!   StartGroup
//!     StartSegment(GS) ... EndSegment
//!     StartTransaction
//!       StartSegment(ST) ... EndSegment
//!       [StartLoop ... EndLoop]*
//!       StartSegment(SE) ... EndSegment
//!     EndTransaction
//!     StartSegment(GE) ... EndSegment
//!   EndGroup
//!   StartSegment(IEA) ... EndSegment
//! EndInterchange
//! ```
//!
//! Validation problems are reported as one of the four error kinds,
//! placed immediately before the structural event they concern.

use crate::location::Location;
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    StartInterchange,
    EndInterchange,
    StartGroup,
    EndGroup,
    StartTransaction,
    EndTransaction,
    StartLoop,
    EndLoop,
    StartSegment,
    EndSegment,
    StartComposite,
    EndComposite,
    ElementData,
    ElementDataBinary,

    SegmentError,
    ElementDataError,
    ElementOccurrenceError,
    ControlError,
}

impl EventKind {
    /// Whether this kind reports a validation error.
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(
            self,
            EventKind::SegmentError
                | EventKind::ElementDataError
                | EventKind::ElementOccurrenceError
                | EventKind::ControlError
        )
    }

    /// Whether this kind opens a structure that a matching end kind closes.
    #[must_use]
    pub fn is_start(self) -> bool {
        self.matching_end().is_some()
    }

    /// End kind closing the structure opened by this kind.
    #[must_use]
    pub fn matching_end(self) -> Option<EventKind> {
        match self {
            EventKind::StartInterchange => Some(EventKind::EndInterchange),
            EventKind::StartGroup => Some(EventKind::EndGroup),
            EventKind::StartTransaction => Some(EventKind::EndTransaction),
            EventKind::StartLoop => Some(EventKind::EndLoop),
            EventKind::StartSegment => Some(EventKind::EndSegment),
            EventKind::StartComposite => Some(EventKind::EndComposite),
            _ => None,
        }
    }

    /// Whether this kind closes a structure.
    #[must_use]
    pub fn is_end(self) -> bool {
        matches!(
            self,
            EventKind::EndInterchange
                | EventKind::EndGroup
                | EventKind::EndTransaction
                | EventKind::EndLoop
                | EventKind::EndSegment
                | EventKind::EndComposite
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A single materialized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    location: Location,
    text: Option<String>,
    error: Option<ValidationError>,
    binary_length: Option<u64>,
}

impl Event {
    /// Create an event without text.
    #[must_use]
    pub fn new(kind: EventKind, location: Location) -> Self {
        Self {
            kind,
            location,
            text: None,
            error: None,
            binary_length: None,
        }
    }

    /// Create an event carrying text.
    pub fn with_text(kind: EventKind, location: Location, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(kind, location)
        }
    }

    /// Create an error event; its kind follows the error's category.
    pub fn validation(error: ValidationError, location: Location, text: impl Into<String>) -> Self {
        Self {
            error: Some(error),
            text: Some(text.into()),
            ..Self::new(error.event_kind(), location)
        }
    }

    /// Create the event announcing a binary element of `length` bytes.
    #[must_use]
    pub fn binary(location: Location, length: u64) -> Self {
        Self {
            binary_length: Some(length),
            ..Self::new(EventKind::ElementDataBinary, location)
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[must_use]
    pub fn error(&self) -> Option<ValidationError> {
        self.error
    }

    #[must_use]
    pub fn binary_length(&self) -> Option<u64> {
        self.binary_length
    }
}
