//! Control schema resolution by standard and version
//!
//! Keys have the form `"<STANDARD>.<version>"`. A lookup picks the greatest
//! registered key that is less than or equal to the requested one and
//! belongs to the same standard, so `X12.00501` resolves to the `00402`
//! envelope. Resolved schemas are cached for the life of the registry.

use crate::control;
use crate::model::Schema;
use crate::Result;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where a registered control schema comes from.
#[derive(Clone)]
enum Source {
    BuiltIn(fn() -> Result<Schema>),
    Provided(Arc<Schema>),
}

/// Version-indexed registry of control schemas with a read-through cache.
///
/// Safe to share between readers behind an `Arc`.
pub struct ControlSchemaRegistry {
    index: BTreeMap<String, Source>,
    cache: DashMap<String, Arc<Schema>>,
}

impl ControlSchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            index: BTreeMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Create a registry holding the built-in X12 and EDIFACT envelopes
    pub fn with_builtins() -> Self {
        let mut index = BTreeMap::new();
        index.insert("X12.00200".to_string(), Source::BuiltIn(control::x12_00200));
        index.insert("X12.00402".to_string(), Source::BuiltIn(control::x12_00402));
        index.insert("EDIFACT.3".to_string(), Source::BuiltIn(control::edifact_v3));
        index.insert("EDIFACT.4".to_string(), Source::BuiltIn(control::edifact_v4));
        Self {
            index,
            cache: DashMap::new(),
        }
    }

    /// Register a schema under `standard` and the lowest `version` it covers.
    ///
    /// Replaces any entry with the same key and drops cached resolutions.
    pub fn register(&mut self, standard: &str, version: &str, schema: Arc<Schema>) {
        self.index
            .insert(format!("{standard}.{version}"), Source::Provided(schema));
        self.cache.clear();
    }

    /// Resolve the control schema for an interchange.
    ///
    /// `version` is the reader's version list: `[ISA12]` for X12 and
    /// `[syntax identifier, syntax version]` for EDIFACT.
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in definition fails to build.
    pub fn resolve(&self, standard: &str, version: &[String]) -> Result<Option<Arc<Schema>>> {
        let Some(version_key) = Self::version_key(standard, version) else {
            return Ok(None);
        };
        let key = format!("{standard}.{version_key}");

        if let Some(cached) = self.cache.get(&key) {
            debug!("Cache hit for control schema: {}", key);
            return Ok(Some(Arc::clone(&cached)));
        }

        trace!("Cache miss for control schema: {}", key);

        let prefix = format!("{standard}.");
        let Some((found, source)) = self
            .index
            .range(..=key.clone())
            .next_back()
            .filter(|(candidate, _)| candidate.starts_with(&prefix))
        else {
            debug!("No control schema registered for {}", key);
            return Ok(None);
        };

        let schema = match source {
            Source::BuiltIn(build) => Arc::new(build()?),
            Source::Provided(schema) => Arc::clone(schema),
        };

        debug!("Resolved control schema {} as {}", key, found);
        self.cache.insert(key, Arc::clone(&schema));
        Ok(Some(schema))
    }

    fn version_key<'a>(standard: &str, version: &'a [String]) -> Option<&'a str> {
        match standard {
            "EDIFACT" => version.get(1).or_else(|| version.first()),
            _ => version.first(),
        }
        .map(String::as_str)
    }

    /// Number of cached resolutions
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl Default for ControlSchemaRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_floor_lookup_within_standard() {
        let registry = ControlSchemaRegistry::with_builtins();

        let schema = registry.resolve("X12", &v(&["00501"])).unwrap().unwrap();
        assert_eq!(schema.name(), "X12.00402");

        let schema = registry.resolve("X12", &v(&["00401"])).unwrap().unwrap();
        assert_eq!(schema.name(), "X12.00200");

        let schema = registry.resolve("X12", &v(&["00402"])).unwrap().unwrap();
        assert_eq!(schema.name(), "X12.00402");
    }

    #[test]
    fn test_versions_below_first_entry_are_absent() {
        let registry = ControlSchemaRegistry::with_builtins();
        assert!(registry.resolve("X12", &v(&["00000"])).unwrap().is_none());
        assert!(registry.resolve("X12", &v(&["00001"])).unwrap().is_none());
    }

    #[test]
    fn test_floor_does_not_cross_standards() {
        let registry = ControlSchemaRegistry::with_builtins();
        // The floor of "X12.0" is "EDIFACT.4", which belongs to another standard.
        assert!(registry.resolve("X12", &v(&["0"])).unwrap().is_none());
        assert!(registry.resolve("HL7", &v(&["2.5"])).unwrap().is_none());
    }

    #[test]
    fn test_edifact_uses_syntax_version() {
        let registry = ControlSchemaRegistry::with_builtins();

        let schema = registry.resolve("EDIFACT", &v(&["UNOA", "3"])).unwrap().unwrap();
        assert_eq!(schema.name(), "EDIFACT.3");

        let schema = registry.resolve("EDIFACT", &v(&["UNOC", "4"])).unwrap().unwrap();
        assert_eq!(schema.name(), "EDIFACT.4");

        assert!(registry.resolve("EDIFACT", &v(&["UNOA", "2"])).unwrap().is_none());
    }

    #[test]
    fn test_resolutions_are_cached_and_shared() {
        let registry = ControlSchemaRegistry::with_builtins();
        let first = registry.resolve("X12", &v(&["00501"])).unwrap().unwrap();
        let second = registry.resolve("X12", &v(&["00501"])).unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.cached(), 1);
    }

    #[test]
    fn test_registered_schema_overrides_builtin() {
        let mut registry = ControlSchemaRegistry::with_builtins();
        let custom = Arc::new(control::x12_00200().unwrap());
        registry.register("X12", "00500", Arc::clone(&custom));

        let resolved = registry.resolve("X12", &v(&["00501"])).unwrap().unwrap();
        assert!(Arc::ptr_eq(&resolved, &custom));

        let older = registry.resolve("X12", &v(&["00403"])).unwrap().unwrap();
        assert_eq!(older.name(), "X12.00402");
    }

    #[test]
    fn test_empty_version_is_absent() {
        let registry = ControlSchemaRegistry::new();
        assert!(registry.resolve("X12", &[]).unwrap().is_none());
        assert!(registry.resolve("X12", &v(&["00501"])).unwrap().is_none());
    }
}
