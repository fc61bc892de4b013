//! Structural validation engine
//!
//! [`StructureValidator`] walks a schema's loop grammar one segment tag at a
//! time. It never rejects input: every problem becomes a
//! [`StructureEvent::Error`] and the walk continues, so the caller can keep
//! producing events for the rest of the interchange.
//!
//! Segments are matched greedily, innermost loop first. A tag that matches
//! the leading segment of a loop reference opens that loop; a tag found only
//! in an enclosing loop closes the inner loops on the way out.

use crate::rules::{ValueRules, validate_value};
use edi_core::ValidationError;
use edi_schema::{BaseType, EdiType, Reference, Schema};
use std::sync::Arc;
use tracing::trace;

/// Outcome of feeding one segment tag to the validator, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureEvent {
    /// A loop was entered; carries the loop id.
    StartLoop(String),
    /// A loop was left; carries the loop id.
    EndLoop(String),
    /// A segment-level error; carries the segment tag concerned.
    Error(ValidationError, String),
}

/// Result of [`StructureValidator::segment`].
#[derive(Debug)]
pub struct SegmentOutcome {
    pub events: Vec<StructureEvent>,
    /// Element cursor for the segment, when it was accepted by the grammar.
    pub elements: Option<ElementCursor>,
}

#[derive(Debug)]
struct Frame {
    loop_id: String,
    references: Vec<Reference>,
    counts: Vec<u32>,
    index: usize,
}

impl Frame {
    fn new(loop_id: &str, references: &[Reference]) -> Self {
        Self {
            loop_id: loop_id.to_string(),
            references: references.to_vec(),
            counts: vec![0; references.len()],
            index: 0,
        }
    }
}

/// Walks the loop grammar of one schema.
#[derive(Debug)]
pub struct StructureValidator {
    schema: Arc<Schema>,
    rules: ValueRules,
    stack: Vec<Frame>,
}

impl StructureValidator {
    /// Create a validator positioned before the first segment of the
    /// schema's main loop.
    #[must_use]
    pub fn new(schema: Arc<Schema>, rules: ValueRules) -> Self {
        let main = schema.main_loop();
        let root = Frame::new(&main.id, &main.references);
        Self {
            schema,
            rules,
            stack: vec![root],
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Ids of the loops currently open below the main loop, outermost first.
    #[must_use]
    pub fn open_loops(&self) -> Vec<&str> {
        self.stack.iter().skip(1).map(|f| f.loop_id.as_str()).collect()
    }

    /// Advance the grammar with the next segment tag.
    pub fn segment(&mut self, tag: &str) -> SegmentOutcome {
        let mut events = Vec::new();

        if !self.schema.contains_segment(tag) {
            trace!("Segment {} is not defined by schema {}", tag, self.schema.name());
            events.push(StructureEvent::Error(
                ValidationError::SegmentNotInDefinedTransactionSet,
                tag.to_string(),
            ));
            return SegmentOutcome { events, elements: None };
        }

        let Some((depth, position)) = self.find(tag) else {
            let error = if self.precedes_current(tag) {
                trace!("Segment {} appears after its place in the loop", tag);
                ValidationError::SegmentNotInProperSequence
            } else {
                trace!("Segment {} is not expected here", tag);
                ValidationError::UnexpectedSegment
            };
            events.push(StructureEvent::Error(error, tag.to_string()));
            return SegmentOutcome { events, elements: None };
        };

        while self.stack.len() > depth + 1 {
            self.close_top(&mut events);
        }

        let schema = Arc::clone(&self.schema);
        let Some(frame) = self.stack.last_mut() else {
            return SegmentOutcome { events, elements: None };
        };

        for skipped in frame.index..position {
            if frame.counts[skipped] < frame.references[skipped].min_occurs {
                events.push(missing(&schema, &frame.references[skipped]));
            }
        }

        frame.index = position;
        frame.counts[position] += 1;
        let reference = frame.references[position].clone();
        let over = frame.counts[position] > reference.max_occurs;

        match schema.get(&reference.type_id) {
            Some(EdiType::Loop(loop_type)) => {
                if over {
                    events.push(StructureEvent::Error(
                        ValidationError::LoopOccursOverMaximumTimes,
                        tag.to_string(),
                    ));
                }
                events.push(StructureEvent::StartLoop(loop_type.id.clone()));
                let mut inner = Frame::new(&loop_type.id, &loop_type.references);
                inner.counts[0] = 1;
                self.stack.push(inner);
            }
            _ => {
                if over {
                    events.push(StructureEvent::Error(
                        ValidationError::SegmentExceedsMaximumUse,
                        tag.to_string(),
                    ));
                }
            }
        }

        let elements = Some(ElementCursor::new(Arc::clone(&self.schema), tag, self.rules));
        SegmentOutcome { events, elements }
    }

    /// Close every open loop, reporting required segments that never came.
    ///
    /// The main loop gets missing-segment errors but no loop event.
    pub fn finish(&mut self) -> Vec<StructureEvent> {
        let mut events = Vec::new();
        while self.stack.len() > 1 {
            self.close_top(&mut events);
        }
        if let Some(root) = self.stack.last_mut() {
            report_remaining(&self.schema, root, &mut events);
            let main = self.schema.main_loop();
            *root = Frame::new(&main.id, &main.references);
        }
        events
    }

    /// Element cursor for a segment whose placement is not being validated.
    ///
    /// Used for segments the grammar handles elsewhere but whose element
    /// content is still governed by this schema.
    #[must_use]
    pub fn elements_for(&self, tag: &str) -> Option<ElementCursor> {
        self.schema
            .contains_segment(tag)
            .then(|| ElementCursor::new(Arc::clone(&self.schema), tag, self.rules))
    }

    /// Locate `tag` as the current or a later reference of an open loop,
    /// innermost first. Returns the frame depth and reference position.
    ///
    /// A current reference that has reached its maximum only matches when
    /// nothing else does, so a loop's leading segment starts the next
    /// iteration instead of repeating inside the current one.
    fn find(&self, tag: &str) -> Option<(usize, usize)> {
        self.find_within_limits(tag, false)
            .or_else(|| self.find_within_limits(tag, true))
    }

    fn find_within_limits(&self, tag: &str, allow_exhausted: bool) -> Option<(usize, usize)> {
        for depth in (0..self.stack.len()).rev() {
            let frame = &self.stack[depth];
            let found = (frame.index..frame.references.len()).find(|&position| {
                let reference = &frame.references[position];
                let exhausted = frame.counts[position] >= reference.max_occurs;
                (allow_exhausted || !exhausted) && self.leads_with(reference, tag)
            });
            if let Some(position) = found {
                return Some((depth, position));
            }
        }
        None
    }

    /// Whether `tag` leads a reference an open loop has already moved past.
    fn precedes_current(&self, tag: &str) -> bool {
        self.stack.iter().any(|frame| {
            frame.references[..frame.index]
                .iter()
                .any(|reference| self.leads_with(reference, tag))
        })
    }

    fn leads_with(&self, reference: &Reference, tag: &str) -> bool {
        match self.schema.get(&reference.type_id) {
            Some(EdiType::Segment(segment)) => segment.id == tag,
            Some(EdiType::Loop(loop_type)) => self.schema.leading_segment(&loop_type.id) == Some(tag),
            _ => false,
        }
    }

    fn close_top(&mut self, events: &mut Vec<StructureEvent>) {
        if let Some(mut frame) = self.stack.pop() {
            report_remaining(&self.schema, &mut frame, events);
            events.push(StructureEvent::EndLoop(frame.loop_id));
        }
    }
}

fn report_remaining(schema: &Schema, frame: &mut Frame, events: &mut Vec<StructureEvent>) {
    for position in frame.index..frame.references.len() {
        if frame.counts[position] < frame.references[position].min_occurs {
            events.push(missing(schema, &frame.references[position]));
        }
    }
    frame.index = frame.references.len();
}

fn missing(schema: &Schema, reference: &Reference) -> StructureEvent {
    let tag = match schema.get(&reference.type_id) {
        Some(EdiType::Loop(loop_type)) => schema
            .leading_segment(&loop_type.id)
            .unwrap_or(&reference.type_id)
            .to_string(),
        _ => reference.type_id.clone(),
    };
    StructureEvent::Error(ValidationError::MandatorySegmentMissing, tag)
}

/// An element or component position that was required but never supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingElement {
    /// 1-based element position
    pub element: i32,
    /// 1-based component position, or -1 for the element itself
    pub component: i32,
}

/// Checks the elements of one segment as they arrive.
///
/// Positions are 1-based, as reported by the reader's location.
#[derive(Debug)]
pub struct ElementCursor {
    schema: Arc<Schema>,
    tag: String,
    rules: ValueRules,
    last_element: usize,
    components: Vec<bool>,
    reported_extra: usize,
}

impl ElementCursor {
    fn new(schema: Arc<Schema>, tag: &str, rules: ValueRules) -> Self {
        Self {
            schema,
            tag: tag.to_string(),
            rules,
            last_element: 0,
            components: Vec::new(),
            reported_extra: 0,
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn references(&self) -> &[Reference] {
        self.schema
            .segment(&self.tag)
            .map_or(&[], |segment| segment.references.as_slice())
    }

    fn reference(&self, position: usize) -> Option<&Reference> {
        position
            .checked_sub(1)
            .and_then(|index| self.references().get(index))
    }

    /// Whether the element at `position` is declared as a composite.
    #[must_use]
    pub fn is_composite(&self, position: usize) -> bool {
        self.reference(position)
            .is_some_and(|r| self.schema.composite(&r.type_id).is_some())
    }

    /// Whether the element after `position` is declared as binary data.
    #[must_use]
    pub fn next_is_binary(&self, position: usize) -> bool {
        self.reference(position + 1)
            .and_then(|r| self.schema.element(&r.type_id))
            .is_some_and(|e| e.base == BaseType::Binary)
    }

    /// Check a simple element value.
    pub fn element(&mut self, position: usize, occurrence: u32, value: &str) -> Vec<ValidationError> {
        self.last_element = self.last_element.max(position);

        let Some(reference) = self.reference(position).cloned() else {
            return self.extra_element(position, value);
        };

        if occurrence > reference.max_occurs && !value.is_empty() {
            return vec![ValidationError::TooManyRepetitions];
        }

        if value.is_empty() {
            return if reference.is_required() && occurrence == 1 {
                vec![ValidationError::RequiredDataElementMissing]
            } else {
                Vec::new()
            };
        }

        match self.schema.element(&reference.type_id) {
            Some(element) => validate_value(value, element, self.rules),
            None => self
                .schema
                .composite(&reference.type_id)
                .and_then(|c| c.references.first())
                .and_then(|first| self.schema.element(&first.type_id))
                .map(|element| validate_value(value, element, self.rules))
                .unwrap_or_default(),
        }
    }

    /// Note a binary element at `position`; its bytes are not inspected.
    pub fn binary(&mut self, position: usize) {
        self.last_element = self.last_element.max(position);
    }

    /// Note the start of a composite at `position`.
    ///
    /// Returns errors that concern the composite as a whole.
    pub fn start_composite(&mut self, position: usize, occurrence: u32) -> Vec<ValidationError> {
        self.last_element = self.last_element.max(position);
        self.components.clear();

        match self.reference(position) {
            None => Vec::new(),
            Some(reference) if occurrence > reference.max_occurs => {
                vec![ValidationError::TooManyRepetitions]
            }
            Some(_) => Vec::new(),
        }
    }

    /// Check one component value of the composite at `position`.
    pub fn component(&mut self, position: usize, component: usize, value: &str) -> Vec<ValidationError> {
        if let Some(index) = component.checked_sub(1) {
            if self.components.len() <= index {
                self.components.resize(index + 1, false);
            }
            self.components[index] = !value.is_empty();
        }

        let Some(reference) = self.reference(position).cloned() else {
            return self.extra_element(position, value);
        };

        if value.is_empty() {
            return Vec::new();
        }

        if let Some(composite) = self.schema.composite(&reference.type_id) {
            return match component
                .checked_sub(1)
                .and_then(|index| composite.references.get(index))
                .and_then(|r| self.schema.element(&r.type_id))
            {
                Some(element) => validate_value(value, element, self.rules),
                None => vec![ValidationError::TooManyComponents],
            };
        }

        // Components on a simple element: only the first carries its value.
        match self.schema.element(&reference.type_id) {
            Some(element) if component == 1 => validate_value(value, element, self.rules),
            _ => vec![ValidationError::TooManyComponents],
        }
    }

    /// Finish the composite at `position`, reporting required components
    /// that were empty or never reached.
    #[must_use]
    pub fn end_composite(&self, position: usize, occurrence: u32) -> Vec<MissingElement> {
        let Some(reference) = self.reference(position) else {
            return Vec::new();
        };

        if !self.components.iter().any(|&present| present) {
            let required = reference.is_required() && occurrence == 1;
            return if required {
                vec![MissingElement {
                    element: to_i32(position),
                    component: -1,
                }]
            } else {
                Vec::new()
            };
        }

        let Some(composite) = self.schema.composite(&reference.type_id) else {
            return Vec::new();
        };

        composite
            .references
            .iter()
            .enumerate()
            .filter(|(index, r)| {
                r.is_required() && !self.components.get(*index).copied().unwrap_or(false)
            })
            .map(|(index, _)| MissingElement {
                element: to_i32(position),
                component: to_i32(index + 1),
            })
            .collect()
    }

    /// Report required elements after the last one the segment supplied.
    #[must_use]
    pub fn end_segment(&self) -> Vec<MissingElement> {
        self.references()
            .iter()
            .enumerate()
            .skip(self.last_element)
            .filter(|(_, r)| r.is_required())
            .map(|(index, _)| MissingElement {
                element: to_i32(index + 1),
                component: -1,
            })
            .collect()
    }

    fn extra_element(&mut self, position: usize, value: &str) -> Vec<ValidationError> {
        if value.is_empty() || self.reported_extra == position {
            return Vec::new();
        }
        self.reported_extra = position;
        vec![ValidationError::TooManyDataElements]
    }
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
