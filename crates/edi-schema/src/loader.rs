//! Schema loader for YAML and JSON schema files
//!
//! File layout:
//!
//! ```yaml
//! name: "997"
//! main: TRANSACTION
//! loops:
//!   - id: TRANSACTION
//!     references:
//!       - { ref: AK1, min: 1, max: 1 }
//!       - { ref: L_AK2, min: 0, max: unbounded }
//! segments:
//!   - id: AK1
//!     references:
//!       - { ref: "479", min: 1 }
//! elements:
//!   - { id: "479", base: identifier, min_length: 2, max_length: 2, values: [FA, IN] }
//! ```

use crate::model::{BaseType, ElementType, Reference, Schema, UNBOUNDED};
use crate::{Error, Result};
use dashmap::DashMap;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Serializable schema format for loading from files
#[derive(Debug, Deserialize)]
struct SchemaFile {
    name: String,
    main: String,
    #[serde(default)]
    loops: Vec<StructureFile>,
    #[serde(default)]
    segments: Vec<StructureFile>,
    #[serde(default)]
    composites: Vec<StructureFile>,
    #[serde(default)]
    elements: Vec<ElementFile>,
}

#[derive(Debug, Deserialize)]
struct StructureFile {
    id: String,
    #[serde(default)]
    references: Vec<ReferenceFile>,
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(rename = "ref")]
    type_id: String,
    #[serde(default)]
    min: u32,
    #[serde(default = "default_max", deserialize_with = "deserialize_max")]
    max: u32,
}

#[derive(Debug, Deserialize)]
struct ElementFile {
    id: String,
    base: BaseType,
    #[serde(default)]
    scale: u32,
    #[serde(default = "default_min_length")]
    min_length: usize,
    max_length: usize,
    #[serde(default)]
    values: Vec<String>,
}

fn default_max() -> u32 {
    1
}

fn default_min_length() -> usize {
    1
}

/// Accept either a count or the word `unbounded`.
fn deserialize_max<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Max {
        Count(u32),
        Word(String),
    }

    match Max::deserialize(deserializer)? {
        Max::Count(n) => Ok(n),
        Max::Word(w) if w.eq_ignore_ascii_case("unbounded") => Ok(UNBOUNDED),
        Max::Word(w) => Err(serde::de::Error::custom(format!(
            "invalid max occurrence '{w}'"
        ))),
    }
}

impl From<ReferenceFile> for Reference {
    fn from(file: ReferenceFile) -> Self {
        Reference::new(file.type_id, file.min, file.max)
    }
}

impl From<ElementFile> for ElementType {
    fn from(file: ElementFile) -> Self {
        ElementType::new(file.id, file.base, file.min_length, file.max_length)
            .with_scale(file.scale)
            .with_values(file.values)
    }
}

fn references(structure: StructureFile) -> (String, Vec<Reference>) {
    (
        structure.id,
        structure.references.into_iter().map(Into::into).collect(),
    )
}

/// Loads transaction schemas from files and caches them by name.
pub struct SchemaLoader {
    cache: DashMap<String, Arc<Schema>>,
    schema_paths: Vec<PathBuf>,
}

impl SchemaLoader {
    /// Create a new schema loader with the given search paths
    pub fn new(schema_paths: Vec<PathBuf>) -> Self {
        Self {
            cache: DashMap::new(),
            schema_paths,
        }
    }

    /// Load a schema by name, searching `<name>.yaml`, `<name>.yml` and
    /// `<name>.json` in each search path. Results are cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no file matches, or the error from
    /// reading and parsing the file.
    pub fn load(&self, name: &str) -> Result<Arc<Schema>> {
        if let Some(cached) = self.cache.get(name) {
            debug!("Cache hit for schema: {}", name);
            return Ok(Arc::clone(&cached));
        }

        trace!("Cache miss for schema: {}", name);

        for path in &self.schema_paths {
            for extension in ["yaml", "yml", "json"] {
                let file_path = path.join(format!("{name}.{extension}"));
                if file_path.exists() {
                    let schema = Arc::new(Self::load_from_file(&file_path)?);
                    self.cache.insert(name.to_string(), Arc::clone(&schema));
                    return Ok(schema);
                }
            }
        }

        Err(Error::NotFound(format!(
            "Schema {} not found in search paths: {:?}",
            name, self.schema_paths
        )))
    }

    /// Load a schema from a specific file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid schema.
    pub fn load_from_file(path: &Path) -> Result<Schema> {
        trace!("Loading schema from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::load_from_yaml(&content)
        } else {
            Self::load_from_json(&content)
        }
    }

    /// Load a schema from JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid schema.
    pub fn load_from_json(json: &str) -> Result<Schema> {
        let schema_file: SchemaFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;

        Self::convert_schema_file(schema_file)
    }

    /// Load a schema from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid schema.
    pub fn load_from_yaml(yaml: &str) -> Result<Schema> {
        let schema_file: SchemaFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;

        Self::convert_schema_file(schema_file)
    }

    fn convert_schema_file(schema_file: SchemaFile) -> Result<Schema> {
        let mut builder = Schema::builder(schema_file.name, schema_file.main);

        for structure in schema_file.loops {
            let (id, refs) = references(structure);
            builder = builder.loop_type(id, refs);
        }
        for structure in schema_file.segments {
            let (id, refs) = references(structure);
            builder = builder.segment(id, refs);
        }
        for structure in schema_file.composites {
            let (id, refs) = references(structure);
            builder = builder.composite(id, refs);
        }
        for element in schema_file.elements {
            builder = builder.element(element.into());
        }

        builder.build()
    }

    /// Add a search path for schema files
    pub fn add_path(&mut self, path: PathBuf) {
        self.schema_paths.push(path);
    }

    /// Number of cached schemas
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}
