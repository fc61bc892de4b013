#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi-schema
//!
//! Schema model, loader and built-in control schemas for EDI.
//!
//! A [`Schema`] is an immutable graph of loop, segment, composite and
//! element types. Transaction schemas are usually loaded from YAML or JSON
//! with [`SchemaLoader`]; the envelope grammars for X12 and EDIFACT are
//! built in and resolved by version through [`ControlSchemaRegistry`].

pub mod control;
pub mod loader;
pub mod model;
pub mod registry;

pub use loader::SchemaLoader;
pub use model::{
    BaseType, CompositeType, EdiType, ElementType, LoopType, Reference, Schema, SchemaBuilder,
    SegmentType, TypeKind, UNBOUNDED,
};
pub use registry::ControlSchemaRegistry;

use thiserror::Error;

/// Errors that can occur when working with schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Unknown type referenced: {0}")]
    UnknownType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
