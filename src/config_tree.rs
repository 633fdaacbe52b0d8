//! gem5 configuration tree.
//!
//! gem5 writes a `config.json` next to `stats.txt` describing every SimObject
//! of the simulated machine. This module loads that document once, renames the
//! standard-library root (`board`) to the canonical `system` label used by the
//! McPAT templates, and answers dotted-path queries such as
//! `system.processor.o3.0.core.isa.0.type`.
//!
//! The tree is read-only after loading.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, info};
use serde_json::Value;

/// Root label the templates address (`config.system.*`)
pub const CANONICAL_ROOT: &str = "system";

/// Root label written by gem5 standard-library configurations
const STDLIB_ROOT: &str = "board";

/// Errors raised while loading or querying the configuration tree.
///
/// All of these are fatal for a translation run: a structural fact about the
/// simulated hardware could not be determined.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Malformed gem5 configuration: {0}")]
    MalformedConfig(String),

    #[error("'{segment}' not found in gem5 configuration (traversed: '{traversed}')")]
    MissingConfigKey { segment: String, traversed: String },

    #[error("Index {index} out of range at '{traversed}' ({len} entries)")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        traversed: String,
    },

    #[error("'{traversed}' is not a sequence and cannot be indexed by {index}")]
    NotIndexable { index: usize, traversed: String },

    #[error("'{path}' resolves to a mapping, not a value")]
    NotAScalar { path: String },

    #[error("Failed to read gem5 configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed gem5 configuration with path-based lookup
#[derive(Debug, Clone)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    /// Build a tree from an already parsed JSON value.
    ///
    /// A top-level `board` key is renamed to `system`. Classic configurations
    /// that already use `system` are accepted unchanged.
    pub fn from_value(mut root: Value) -> Result<Self, ConfigError> {
        let map = root.as_object_mut().ok_or_else(|| {
            ConfigError::MalformedConfig("top level is not a mapping".to_string())
        })?;

        if let Some(board) = map.remove(STDLIB_ROOT) {
            debug!("Renaming configuration root '{}' to '{}'", STDLIB_ROOT, CANONICAL_ROOT);
            map.insert(CANONICAL_ROOT.to_string(), board);
        } else if !map.contains_key(CANONICAL_ROOT) {
            return Err(ConfigError::MalformedConfig(format!(
                "neither '{}' nor '{}' found at top level",
                STDLIB_ROOT, CANONICAL_ROOT
            )));
        }

        Ok(Self { root })
    }

    /// Parse a configuration document from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_reader(reader)
            .map_err(|e| ConfigError::MalformedConfig(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse a configuration document held in memory
    pub fn parse_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::MalformedConfig(e.to_string()))?;
        Self::from_value(value)
    }

    /// Load `config.json` from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading gem5 configuration from: {:?}", path);
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Resolve a path left to right.
    ///
    /// A segment made only of digits indexes into a sequence; any other
    /// segment must name a field of the current mapping.
    pub fn lookup<I, S>(&self, segments: I) -> Result<&Value, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = &self.root;
        let mut traversed = String::new();

        for segment in segments {
            let segment = segment.as_ref();
            current = if is_index(segment) {
                let index = segment.parse::<usize>().unwrap_or(usize::MAX);
                let items = current.as_array().ok_or_else(|| ConfigError::NotIndexable {
                    index,
                    traversed: traversed.clone(),
                })?;
                items.get(index).ok_or_else(|| ConfigError::IndexOutOfRange {
                    index,
                    len: items.len(),
                    traversed: traversed.clone(),
                })?
            } else {
                current
                    .as_object()
                    .and_then(|fields| fields.get(segment))
                    .ok_or_else(|| ConfigError::MissingConfigKey {
                        segment: segment.to_string(),
                        traversed: traversed.clone(),
                    })?
            };

            if !traversed.is_empty() {
                traversed.push('.');
            }
            traversed.push_str(segment);
        }

        Ok(current)
    }

    /// Resolve a dotted path such as `system.processor.o3.0.clock`
    pub fn lookup_str(&self, path: &str) -> Result<&Value, ConfigError> {
        self.lookup(path.split('.'))
    }

    /// Resolve a dotted path and render it for textual substitution
    pub fn render(&self, path: &str) -> Result<String, ConfigError> {
        let value = self.lookup_str(path)?;
        render_scalar(value, path)
    }

    /// Number of entries in the processor-core sequence at `core_list`
    pub fn core_count(&self, core_list: &str) -> Result<usize, ConfigError> {
        match self.lookup_str(core_list)? {
            Value::Array(cores) => Ok(cores.len()),
            _ => Err(ConfigError::MalformedConfig(format!(
                "'{}' is not a sequence of cores",
                core_list
            ))),
        }
    }

    /// Declared ISA type of core `index` (e.g. `X86ISA`)
    pub fn core_isa(&self, core_list: &str, index: usize) -> Result<String, ConfigError> {
        self.render(&format!("{}.{}.core.isa.0.type", core_list, index))
    }
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Render a configuration value as text for an expression.
///
/// Booleans become `1`/`0` and `null` becomes `0` so the result stays
/// arithmetic. Sequences of scalars are comma-joined.
pub fn render_scalar(value: &Value, path: &str) -> Result<String, ConfigError> {
    match value {
        Value::Null => Ok("0".to_string()),
        Value::Bool(flag) => Ok(if *flag { "1" } else { "0" }.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) => Ok(text.clone()),
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|item| match item {
                    Value::Array(_) | Value::Object(_) => Err(ConfigError::NotAScalar {
                        path: path.to_string(),
                    }),
                    scalar => render_scalar(scalar, path),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rendered.join(","))
        }
        Value::Object(_) => Err(ConfigError::NotAScalar {
            path: path.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "name": null,
        "board": {
            "clk_domain": { "clock": [333] },
            "processor": {
                "o3": [
                    { "core": { "isa": [ { "type": "X86ISA" } ], "numROBEntries": 192, "switched_out": false } },
                    { "core": { "isa": [ { "type": "RiscvISA" } ], "numROBEntries": 128, "switched_out": true } }
                ]
            }
        }
    }"#;

    fn tree() -> ConfigTree {
        ConfigTree::parse_str(CONFIG).unwrap()
    }

    #[test]
    fn test_board_root_is_renamed() {
        let tree = tree();
        assert!(tree.lookup_str("system.processor").is_ok());
        assert!(matches!(
            tree.lookup_str("board.processor"),
            Err(ConfigError::MissingConfigKey { .. })
        ));
    }

    #[test]
    fn test_classic_system_root_is_accepted() {
        let tree = ConfigTree::parse_str(r#"{ "system": { "cache_line_size": 64 } }"#).unwrap();
        assert_eq!(tree.render("system.cache_line_size").unwrap(), "64");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            ConfigTree::parse_str("{ not json"),
            Err(ConfigError::MalformedConfig(_))
        ));
        assert!(matches!(
            ConfigTree::parse_str("[1, 2]"),
            Err(ConfigError::MalformedConfig(_))
        ));
        assert!(matches!(
            ConfigTree::parse_str(r#"{ "root": {} }"#),
            Err(ConfigError::MalformedConfig(_))
        ));
    }

    #[test]
    fn test_lookup_mixes_fields_and_indices() {
        let tree = tree();
        assert_eq!(tree.render("system.processor.o3.1.core.numROBEntries").unwrap(), "128");
        assert_eq!(tree.render("system.clk_domain.clock.0").unwrap(), "333");
    }

    #[test]
    fn test_missing_key_names_segment_and_hierarchy() {
        let err = tree().lookup_str("system.processor.o3.0.core.fetchWidth").unwrap_err();
        match err {
            ConfigError::MissingConfigKey { segment, traversed } => {
                assert_eq!(segment, "fetchWidth");
                assert_eq!(traversed, "system.processor.o3.0.core");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_index_out_of_range() {
        let err = tree().lookup_str("system.processor.o3.5.core").unwrap_err();
        assert!(matches!(err, ConfigError::IndexOutOfRange { index: 5, len: 2, .. }));
    }

    #[test]
    fn test_indexing_a_mapping_fails() {
        let err = tree().lookup_str("system.processor.0").unwrap_err();
        assert!(matches!(err, ConfigError::NotIndexable { index: 0, .. }));
    }

    #[test]
    fn test_render_scalars() {
        let tree = tree();
        assert_eq!(tree.render("system.processor.o3.0.core.switched_out").unwrap(), "0");
        assert_eq!(tree.render("system.processor.o3.1.core.switched_out").unwrap(), "1");
        assert_eq!(tree.render("system.clk_domain.clock").unwrap(), "333");
        assert_eq!(tree.render("name").unwrap(), "0");
        assert!(matches!(
            tree.render("system.clk_domain"),
            Err(ConfigError::NotAScalar { .. })
        ));
    }

    #[test]
    fn test_core_topology_queries() {
        let tree = tree();
        assert_eq!(tree.core_count("system.processor.o3").unwrap(), 2);
        assert_eq!(tree.core_isa("system.processor.o3", 0).unwrap(), "X86ISA");
        assert_eq!(tree.core_isa("system.processor.o3", 1).unwrap(), "RiscvISA");
        assert!(tree.core_count("system.clk_domain").is_err());
    }
}
