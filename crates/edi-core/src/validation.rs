//! Validation error taxonomy
//!
//! Every problem found while validating against a schema is classified as
//! exactly one [`ValidationError`]. Each kind belongs to one
//! [`ErrorCategory`], which decides the event kind used to report it.

use crate::event::EventKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad class of a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Segment placement and occurrence
    SegmentError,
    /// Presence and repetition of elements and components
    ElementOccurrenceError,
    /// Content of a single element value
    ElementDataError,
    /// Interchange control references and counts
    ControlError,
}

impl ErrorCategory {
    /// Event kind used to report errors of this category.
    #[must_use]
    pub fn event_kind(self) -> EventKind {
        match self {
            ErrorCategory::SegmentError => EventKind::SegmentError,
            ErrorCategory::ElementOccurrenceError => EventKind::ElementOccurrenceError,
            ErrorCategory::ElementDataError => EventKind::ElementDataError,
            ErrorCategory::ControlError => EventKind::ControlError,
        }
    }
}

/// Specific validation error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationError {
    UnrecognizedSegmentId,
    UnexpectedSegment,
    MandatorySegmentMissing,
    LoopOccursOverMaximumTimes,
    SegmentExceedsMaximumUse,
    SegmentNotInDefinedTransactionSet,
    SegmentNotInProperSequence,

    RequiredDataElementMissing,
    TooManyDataElements,
    TooManyRepetitions,
    TooManyComponents,

    DataElementTooShort,
    DataElementTooLong,
    InvalidCharacterData,
    InvalidCodeValue,
    InvalidDate,
    InvalidTime,

    ControlReferenceMismatch,
    ControlCountDoesNotMatch,
}

impl ValidationError {
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        use ValidationError::{
            ControlCountDoesNotMatch, ControlReferenceMismatch, DataElementTooLong,
            DataElementTooShort, InvalidCharacterData, InvalidCodeValue, InvalidDate, InvalidTime,
            LoopOccursOverMaximumTimes, MandatorySegmentMissing, RequiredDataElementMissing,
            SegmentExceedsMaximumUse, SegmentNotInDefinedTransactionSet,
            SegmentNotInProperSequence, TooManyComponents, TooManyDataElements,
            TooManyRepetitions, UnexpectedSegment, UnrecognizedSegmentId,
        };

        match self {
            UnrecognizedSegmentId
            | UnexpectedSegment
            | MandatorySegmentMissing
            | LoopOccursOverMaximumTimes
            | SegmentExceedsMaximumUse
            | SegmentNotInDefinedTransactionSet
            | SegmentNotInProperSequence => ErrorCategory::SegmentError,
            RequiredDataElementMissing
            | TooManyDataElements
            | TooManyRepetitions
            | TooManyComponents => ErrorCategory::ElementOccurrenceError,
            DataElementTooShort
            | DataElementTooLong
            | InvalidCharacterData
            | InvalidCodeValue
            | InvalidDate
            | InvalidTime => ErrorCategory::ElementDataError,
            ControlReferenceMismatch | ControlCountDoesNotMatch => ErrorCategory::ControlError,
        }
    }

    /// Stable upper-case code, e.g. `DATA_ELEMENT_TOO_LONG`.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            ValidationError::UnrecognizedSegmentId => "UNRECOGNIZED_SEGMENT_ID",
            ValidationError::UnexpectedSegment => "UNEXPECTED_SEGMENT",
            ValidationError::MandatorySegmentMissing => "MANDATORY_SEGMENT_MISSING",
            ValidationError::LoopOccursOverMaximumTimes => "LOOP_OCCURS_OVER_MAXIMUM_TIMES",
            ValidationError::SegmentExceedsMaximumUse => "SEGMENT_EXCEEDS_MAXIMUM_USE",
            ValidationError::SegmentNotInDefinedTransactionSet => {
                "SEGMENT_NOT_IN_DEFINED_TRANSACTION_SET"
            }
            ValidationError::SegmentNotInProperSequence => "SEGMENT_NOT_IN_PROPER_SEQUENCE",
            ValidationError::RequiredDataElementMissing => "REQUIRED_DATA_ELEMENT_MISSING",
            ValidationError::TooManyDataElements => "TOO_MANY_DATA_ELEMENTS",
            ValidationError::TooManyRepetitions => "TOO_MANY_REPETITIONS",
            ValidationError::TooManyComponents => "TOO_MANY_COMPONENTS",
            ValidationError::DataElementTooShort => "DATA_ELEMENT_TOO_SHORT",
            ValidationError::DataElementTooLong => "DATA_ELEMENT_TOO_LONG",
            ValidationError::InvalidCharacterData => "INVALID_CHARACTER_DATA",
            ValidationError::InvalidCodeValue => "INVALID_CODE_VALUE",
            ValidationError::InvalidDate => "INVALID_DATE",
            ValidationError::InvalidTime => "INVALID_TIME",
            ValidationError::ControlReferenceMismatch => "CONTROL_REFERENCE_MISMATCH",
            ValidationError::ControlCountDoesNotMatch => "CONTROL_COUNT_DOES_NOT_MATCH",
        }
    }

    /// Event kind used to report this error.
    #[must_use]
    pub fn event_kind(self) -> EventKind {
        self.category().event_kind()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
