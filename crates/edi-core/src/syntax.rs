//! Standards and delimiter sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// EDI dialect of an interchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Standard {
    #[serde(rename = "X12")]
    X12,
    #[serde(rename = "EDIFACT")]
    Edifact,
}

impl Standard {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Standard::X12 => "X12",
            Standard::Edifact => "EDIFACT",
        }
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Standard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X12" => Ok(Standard::X12),
            "EDIFACT" => Ok(Standard::Edifact),
            other => Err(format!("unknown EDI standard '{other}'")),
        }
    }
}

/// Role a delimiter character plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelimiterRole {
    Segment,
    DataElement,
    ComponentElement,
    Repetition,
    Release,
    Decimal,
}

/// Delimiters of one interchange.
///
/// Segment terminator and element separator always exist; the other roles
/// are present only where the dialect defines them. A repetition separator
/// may be declared but inactive (EDIFACT's reserved space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    segment: u8,
    element: u8,
    component: Option<u8>,
    repetition: Option<u8>,
    release: Option<u8>,
    decimal: Option<u8>,
}

impl Delimiters {
    /// Create a delimiter set with only the mandatory roles.
    #[must_use]
    pub fn new(segment: u8, element: u8) -> Self {
        Self {
            segment,
            element,
            component: None,
            repetition: None,
            release: None,
            decimal: None,
        }
    }

    #[must_use]
    pub fn component(mut self, component: u8) -> Self {
        self.component = Some(component);
        self
    }

    #[must_use]
    pub fn repetition(mut self, repetition: u8) -> Self {
        self.repetition = Some(repetition);
        self
    }

    #[must_use]
    pub fn release(mut self, release: u8) -> Self {
        self.release = Some(release);
        self
    }

    #[must_use]
    pub fn decimal(mut self, decimal: u8) -> Self {
        self.decimal = Some(decimal);
        self
    }

    #[must_use]
    pub fn segment_byte(&self) -> u8 {
        self.segment
    }

    #[must_use]
    pub fn element_byte(&self) -> u8 {
        self.element
    }

    #[must_use]
    pub fn component_byte(&self) -> Option<u8> {
        self.component
    }

    /// Repetition separator if it is active during tokenization.
    #[must_use]
    pub fn repetition_byte(&self) -> Option<u8> {
        self.repetition.filter(|&b| b != b' ')
    }

    #[must_use]
    pub fn release_byte(&self) -> Option<u8> {
        self.release
    }

    #[must_use]
    pub fn decimal_byte(&self) -> Option<u8> {
        self.decimal
    }

    /// Character declared for `role`, if the dialect defines it.
    #[must_use]
    pub fn get(&self, role: DelimiterRole) -> Option<char> {
        let byte = match role {
            DelimiterRole::Segment => Some(self.segment),
            DelimiterRole::DataElement => Some(self.element),
            DelimiterRole::ComponentElement => self.component,
            DelimiterRole::Repetition => self.repetition,
            DelimiterRole::Release => self.release,
            DelimiterRole::Decimal => self.decimal,
        };
        byte.map(char::from)
    }

    /// All declared roles with their characters.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<DelimiterRole, char> {
        [
            DelimiterRole::Segment,
            DelimiterRole::DataElement,
            DelimiterRole::ComponentElement,
            DelimiterRole::Repetition,
            DelimiterRole::Release,
            DelimiterRole::Decimal,
        ]
        .into_iter()
        .filter_map(|role| self.get(role).map(|c| (role, c)))
        .collect()
    }
}
