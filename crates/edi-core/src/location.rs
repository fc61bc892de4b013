//! Positional cursor for the event stream
#![allow(clippy::must_use_candidate)] // Accessors are clear at call sites without #[must_use].

use serde::{Deserialize, Serialize};

/// Marker for a coordinate that does not apply at the current point.
pub const UNSET: i32 = -1;

/// Position of the current event within the interchange.
///
/// All coordinates are 1-based, or [`UNSET`] (-1) when they do not apply.
/// The segment position counts every segment of the interchange, header
/// included. Element, occurrence and component positions are reset at each
/// segment boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    segment_position: i32,
    segment_tag: Option<String>,
    element_position: i32,
    element_occurrence: i32,
    component_position: i32,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            segment_position: UNSET,
            segment_tag: None,
            element_position: UNSET,
            element_occurrence: UNSET,
            component_position: UNSET,
        }
    }
}

impl Location {
    /// Create a location with every coordinate unset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment_position(&self) -> i32 {
        self.segment_position
    }

    /// Tag of the current segment, if positioned inside one.
    pub fn segment_tag(&self) -> Option<&str> {
        self.segment_tag.as_deref()
    }

    pub fn element_position(&self) -> i32 {
        self.element_position
    }

    pub fn element_occurrence(&self) -> i32 {
        self.element_occurrence
    }

    pub fn component_position(&self) -> i32 {
        self.component_position
    }

    /// Advance to the next segment of the interchange.
    pub fn begin_segment(&mut self, tag: impl Into<String>) {
        self.segment_position = next(self.segment_position);
        self.segment_tag = Some(tag.into());
        self.element_position = UNSET;
        self.element_occurrence = UNSET;
        self.component_position = UNSET;
    }

    /// Advance to the next element of the current segment.
    pub fn begin_element(&mut self) {
        self.element_position = next(self.element_position);
        self.element_occurrence = 1;
        self.component_position = UNSET;
    }

    /// Advance to the next repetition of the current element.
    pub fn begin_repetition(&mut self) {
        if self.element_position == UNSET {
            self.begin_element();
            return;
        }
        self.element_occurrence = next(self.element_occurrence);
        self.component_position = UNSET;
    }

    /// Advance to the next component of the current element.
    pub fn begin_component(&mut self) {
        self.component_position = next(self.component_position);
    }

    /// Leave the component level of the current element.
    pub fn clear_component(&mut self) {
        self.component_position = UNSET;
    }

    /// Leave the element level after a segment ends.
    pub fn end_segment(&mut self) {
        self.element_position = UNSET;
        self.element_occurrence = UNSET;
        self.component_position = UNSET;
    }

    /// Position at an explicit element/component, used when reporting
    /// problems at positions the data never reached.
    pub fn at_element(&self, element_position: i32, component_position: i32) -> Self {
        let mut location = self.clone();
        location.element_position = element_position;
        location.element_occurrence = if element_position == UNSET { UNSET } else { 1 };
        location.component_position = component_position;
        location
    }

    /// Forget everything; used outside an open interchange.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn next(value: i32) -> i32 {
    if value == UNSET { 1 } else { value + 1 }
}
