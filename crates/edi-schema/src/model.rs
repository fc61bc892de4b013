//! Schema model definitions
//!
//! A schema is a graph of named types. Loops and segments reference their
//! children with occurrence bounds; segments reference elements and
//! composites by position; composites reference elements. One loop is the
//! root ("main") of the grammar.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Unbounded occurrence, as used for `max_occurs`.
pub const UNBOUNDED: u32 = u32::MAX;

/// Value class of a simple element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    /// Free text (X12 `AN`, EDIFACT `an`)
    String,
    /// Coded value (X12 `ID`)
    Identifier,
    /// Integer with implied decimal places (X12 `Nn`)
    Numeric,
    /// Explicit decimal (X12 `R`)
    Decimal,
    /// Calendar date, `YYMMDD` or `CCYYMMDD`
    Date,
    /// Clock time, `HHMM[SS[d..]]`
    Time,
    /// Raw bytes whose length is declared by the preceding element
    Binary,
}

/// Kind of a schema type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Loop,
    Segment,
    Composite,
    Element,
}

/// Reference from a parent type to a child type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub type_id: String,
    pub min_occurs: u32,
    pub max_occurs: u32,
}

impl Reference {
    pub fn new(type_id: impl Into<String>, min_occurs: u32, max_occurs: u32) -> Self {
        Self {
            type_id: type_id.into(),
            min_occurs,
            max_occurs,
        }
    }

    /// Exactly one occurrence.
    pub fn required(type_id: impl Into<String>) -> Self {
        Self::new(type_id, 1, 1)
    }

    /// Zero or one occurrence.
    pub fn optional(type_id: impl Into<String>) -> Self {
        Self::new(type_id, 0, 1)
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.min_occurs > 0
    }
}

/// Ordered container of segments and nested loops.
#[derive(Debug, Clone)]
pub struct LoopType {
    pub id: String,
    pub references: Vec<Reference>,
}

/// Segment definition; `id` is the segment tag.
#[derive(Debug, Clone)]
pub struct SegmentType {
    pub id: String,
    pub references: Vec<Reference>,
}

/// Composite element definition.
#[derive(Debug, Clone)]
pub struct CompositeType {
    pub id: String,
    pub references: Vec<Reference>,
}

/// Simple element definition.
#[derive(Debug, Clone)]
pub struct ElementType {
    pub id: String,
    pub base: BaseType,
    /// Implied decimal places for `Numeric`
    pub scale: u32,
    pub min_length: usize,
    pub max_length: usize,
    /// Allowed codes; empty means any value
    pub values: BTreeSet<String>,
}

impl ElementType {
    pub fn new(id: impl Into<String>, base: BaseType, min_length: usize, max_length: usize) -> Self {
        Self {
            id: id.into(),
            base,
            scale: 0,
            min_length,
            max_length,
            values: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }
}

/// Any schema type.
#[derive(Debug, Clone)]
pub enum EdiType {
    Loop(LoopType),
    Segment(SegmentType),
    Composite(CompositeType),
    Element(ElementType),
}

impl EdiType {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            EdiType::Loop(t) => &t.id,
            EdiType::Segment(t) => &t.id,
            EdiType::Composite(t) => &t.id,
            EdiType::Element(t) => &t.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> TypeKind {
        match self {
            EdiType::Loop(_) => TypeKind::Loop,
            EdiType::Segment(_) => TypeKind::Segment,
            EdiType::Composite(_) => TypeKind::Composite,
            EdiType::Element(_) => TypeKind::Element,
        }
    }

    fn references(&self) -> &[Reference] {
        match self {
            EdiType::Loop(t) => &t.references,
            EdiType::Segment(t) => &t.references,
            EdiType::Composite(t) => &t.references,
            EdiType::Element(_) => &[],
        }
    }
}

/// An immutable, validated schema.
///
/// Schemas are shared read-only between readers, typically as
/// `Arc<Schema>`.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    main: LoopType,
    types: HashMap<String, EdiType>,
}

impl Schema {
    /// Start building a schema whose root loop is `main`.
    pub fn builder(name: impl Into<String>, main: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            main: main.into(),
            types: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root loop of the grammar.
    #[must_use]
    pub fn main_loop(&self) -> &LoopType {
        &self.main
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&EdiType> {
        self.types.get(id)
    }

    #[must_use]
    pub fn loop_type(&self, id: &str) -> Option<&LoopType> {
        match self.types.get(id) {
            Some(EdiType::Loop(t)) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn segment(&self, tag: &str) -> Option<&SegmentType> {
        match self.types.get(tag) {
            Some(EdiType::Segment(t)) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn composite(&self, id: &str) -> Option<&CompositeType> {
        match self.types.get(id) {
            Some(EdiType::Composite(t)) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn element(&self, id: &str) -> Option<&ElementType> {
        match self.types.get(id) {
            Some(EdiType::Element(t)) => Some(t),
            _ => None,
        }
    }

    /// Whether `tag` names a segment anywhere in this schema.
    #[must_use]
    pub fn contains_segment(&self, tag: &str) -> bool {
        self.segment(tag).is_some()
    }

    /// Tag of the segment that opens the loop `id`.
    #[must_use]
    pub fn leading_segment(&self, loop_id: &str) -> Option<&str> {
        let first = self.loop_type(loop_id)?.references.first()?;
        match self.types.get(&first.type_id)? {
            EdiType::Segment(segment) => Some(&segment.id),
            EdiType::Loop(_) => self.leading_segment(&first.type_id),
            _ => None,
        }
    }
}

/// Incremental schema construction with reference checking on `build`.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    main: String,
    types: Vec<EdiType>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn loop_type(mut self, id: impl Into<String>, references: Vec<Reference>) -> Self {
        self.types.push(EdiType::Loop(LoopType {
            id: id.into(),
            references,
        }));
        self
    }

    #[must_use]
    pub fn segment(mut self, tag: impl Into<String>, references: Vec<Reference>) -> Self {
        self.types.push(EdiType::Segment(SegmentType {
            id: tag.into(),
            references,
        }));
        self
    }

    #[must_use]
    pub fn composite(mut self, id: impl Into<String>, references: Vec<Reference>) -> Self {
        self.types.push(EdiType::Composite(CompositeType {
            id: id.into(),
            references,
        }));
        self
    }

    #[must_use]
    pub fn element(mut self, element: ElementType) -> Self {
        self.types.push(EdiType::Element(element));
        self
    }

    /// Check every reference and produce the schema.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate ids, unknown references, references
    /// to a type of the wrong kind, loops that do not begin with a segment,
    /// or a main type that is not a loop.
    pub fn build(self) -> Result<Schema> {
        let mut types = HashMap::with_capacity(self.types.len());
        for edi_type in self.types {
            let id = edi_type.id().to_string();
            if types.insert(id.clone(), edi_type).is_some() {
                return Err(Error::InvalidFormat(format!("duplicate type id '{id}'")));
            }
        }

        let main = match types.get(&self.main) {
            Some(EdiType::Loop(main)) => main.clone(),
            Some(_) => {
                return Err(Error::InvalidFormat(format!(
                    "main type '{}' is not a loop",
                    self.main
                )));
            }
            None => return Err(Error::UnknownType(self.main)),
        };

        for edi_type in types.values() {
            check_references(edi_type, &types)?;
        }

        Ok(Schema {
            name: self.name,
            main,
            types,
        })
    }
}

fn check_references(parent: &EdiType, types: &HashMap<String, EdiType>) -> Result<()> {
    for (index, reference) in parent.references().iter().enumerate() {
        let child = types
            .get(&reference.type_id)
            .ok_or_else(|| Error::UnknownType(reference.type_id.clone()))?;

        if reference.max_occurs == 0 || reference.min_occurs > reference.max_occurs {
            return Err(Error::InvalidFormat(format!(
                "'{}' references '{}' with invalid bounds {}..{}",
                parent.id(),
                reference.type_id,
                reference.min_occurs,
                reference.max_occurs
            )));
        }

        let allowed = match parent.kind() {
            TypeKind::Loop if index == 0 => child.kind() == TypeKind::Segment,
            TypeKind::Loop => matches!(child.kind(), TypeKind::Segment | TypeKind::Loop),
            TypeKind::Segment => matches!(child.kind(), TypeKind::Element | TypeKind::Composite),
            TypeKind::Composite => child.kind() == TypeKind::Element,
            TypeKind::Element => false,
        };

        if !allowed {
            return Err(Error::InvalidFormat(format!(
                "'{}' may not reference {:?} '{}' at position {}",
                parent.id(),
                child.kind(),
                reference.type_id,
                index + 1
            )));
        }
    }
    Ok(())
}
