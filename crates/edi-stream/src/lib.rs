#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # edi-stream
//!
//! Streaming pull reader for X12 and EDIFACT interchanges.
//!
//! The reader detects the dialect and delimiters from each interchange
//! header, tokenizes the input and produces a flat, properly nested
//! sequence of events. Control and transaction schemas may be bound as the
//! stream passes their tier; validation problems are reported as events
//! and never stop the stream.
//!
//! ## Example
//!
//! ```
//! use edi_core::EventKind;
//! use edi_stream::EdiStreamReader;
//!
//! let input = "UNB+UNOA:3+SENDER+RECEIVER+200101:1200+1'\
//!              UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'UNT+3+1'UNZ+1+1'";
//! let mut reader = EdiStreamReader::new(input.as_bytes());
//!
//! let mut tags = Vec::new();
//! while reader.has_next().unwrap() {
//!     if reader.next().unwrap() == EventKind::StartSegment {
//!         tags.push(reader.text().unwrap().to_string());
//!     }
//! }
//! assert_eq!(tags, ["UNB", "UNH", "BGM", "UNT", "UNZ"]);
//! ```

pub mod config;
pub mod dialect;
pub mod lexer;
mod machine;
pub mod reader;
pub mod source;

pub use config::ReaderConfig;
pub use dialect::{Charset, Dialect};
pub use reader::{BinaryData, EdiStreamReader};

pub use edi_core::{DelimiterRole, Error, Event, EventKind, Location, Result, ValidationError};
