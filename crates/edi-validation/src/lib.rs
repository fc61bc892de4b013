#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-validation
//!
//! Schema-driven validation for a segment stream.
//!
//! Validation here never fails: problems are returned as
//! [`edi_core::ValidationError`] values for the reader to surface as
//! events, and the caller keeps going.
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_schema::{BaseType, ElementType, Reference, Schema};
//! use edi_validation::{StructureEvent, StructureValidator, ValueRules};
//! use std::sync::Arc;
//!
//! let schema = Schema::builder("demo", "ROOT")
//!     .loop_type("ROOT", vec![Reference::required("BGN"), Reference::required("END")])
//!     .segment("BGN", vec![Reference::required("E1")])
//!     .segment("END", vec![])
//!     .element(ElementType::new("E1", BaseType::String, 1, 5))
//!     .build()
//!     .unwrap();
//!
//! let mut validator = StructureValidator::new(Arc::new(schema), ValueRules::default());
//! let outcome = validator.segment("BGN");
//! assert!(outcome.events.is_empty());
//!
//! let mut elements = outcome.elements.unwrap();
//! assert!(elements.element(1, 1, "OK").is_empty());
//!
//! let missing = validator.finish();
//! assert_eq!(missing.len(), 1);
//! assert!(matches!(&missing[0], StructureEvent::Error(_, tag) if tag == "END"));
//! ```

pub mod engine;
pub mod rules;

pub use engine::{ElementCursor, MissingElement, SegmentOutcome, StructureEvent, StructureValidator};
pub use rules::{
    ValueRules, measured_length, validate_code_list, validate_date, validate_decimal,
    validate_length, validate_numeric, validate_text, validate_time, validate_value,
};
