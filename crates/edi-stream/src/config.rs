//! Reader configuration options

use edi_core::{Error, Result};
use serde::Deserialize;

/// Configuration for an [`EdiStreamReader`](crate::EdiStreamReader)
///
/// ```yaml
/// validate_control_structure: true
/// validate_control_code_values: false
/// resolve_control_schemas: true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Report structural and control-count errors in the envelope (default: true)
    pub validate_control_structure: bool,
    /// Check envelope code values against their code lists (default: true)
    pub validate_control_code_values: bool,
    /// Resolve a built-in control schema when none is bound at interchange
    /// start (default: false)
    pub resolve_control_schemas: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            validate_control_structure: true,
            validate_control_code_values: true,
            resolve_control_schemas: false,
        }
    }
}

impl ReaderConfig {
    /// Create a new configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable envelope structure validation
    #[must_use]
    pub fn validate_control_structure(mut self, enabled: bool) -> Self {
        self.validate_control_structure = enabled;
        self
    }

    /// Enable or disable envelope code-list checks
    #[must_use]
    pub fn validate_control_code_values(mut self, enabled: bool) -> Self {
        self.validate_control_code_values = enabled;
        self
    }

    /// Enable or disable built-in control schema resolution
    #[must_use]
    pub fn resolve_control_schemas(mut self, enabled: bool) -> Self {
        self.resolve_control_schemas = enabled;
        self
    }

    /// Load configuration from a JSON string
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("JSON parse error: {e}")))
    }

    /// Load configuration from a YAML string
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a valid configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("YAML parse error: {e}")))
    }
}
