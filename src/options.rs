//! Translation options.
//!
//! Knobs that describe how the simulated topology maps onto the template.
//! They can come from a YAML file and be overridden on the command line.
//!
//! ```yaml
//! l2: private              # or "shared"
//! core_list: system.processor.o3
//! isa_flag: x86
//! isa_type: X86ISA
//! ```

use std::fs::File;
use std::path::Path;

use clap::ValueEnum;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde::{Deserialize, Serialize};

/// Second-level cache organisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum L2Topology {
    /// One L2 bank per core; the template's L2 subtree is replicated
    #[default]
    Private,
    /// A single L2 shared by all cores
    Shared,
}

/// Options that steer template expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    pub l2: L2Topology,
    /// Dotted config path of the processor-core sequence
    pub core_list: String,
    /// Name of the per-core node that flags the ISA
    pub isa_flag: String,
    /// ISA type string that sets the flag to 1
    pub isa_type: String,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            l2: L2Topology::Private,
            core_list: "system.processor.o3".to_string(),
            isa_flag: "x86".to_string(),
            isa_type: "X86ISA".to_string(),
        }
    }
}

/// Option validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid core list path: {0}")]
    InvalidCoreList(String),
    #[error("Invalid ISA setting: {0}")]
    InvalidIsa(String),
}

impl TranslateOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.core_list.is_empty() {
            return Err(ValidationError::InvalidCoreList(
                "core_list cannot be empty".to_string(),
            ));
        }
        if self.core_list.split('.').any(str::is_empty) {
            return Err(ValidationError::InvalidCoreList(format!(
                "'{}' contains an empty segment",
                self.core_list
            )));
        }
        if self.isa_flag.is_empty() || self.isa_type.is_empty() {
            return Err(ValidationError::InvalidIsa(
                "isa_flag and isa_type cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate options from a YAML file
pub fn load_options(path: &Path) -> Result<TranslateOptions> {
    info!("Loading translation options from: {:?}", path);

    let file = File::open(path)
        .wrap_err_with(|| format!("Failed to open options file '{}'", path.display()))?;
    let options: TranslateOptions = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse options file '{}'", path.display()))?;

    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let options = TranslateOptions::default();
        assert_eq!(options.l2, L2Topology::Private);
        assert_eq!(options.core_list, "system.processor.o3");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "l2: shared\n").unwrap();

        let options = load_options(temp_file.path()).unwrap();
        assert_eq!(options.l2, L2Topology::Shared);
        assert_eq!(options.isa_type, "X86ISA");
    }

    #[test]
    fn test_load_full_file() {
        let yaml = r#"
l2: private
core_list: system.cpu
isa_flag: arm
isa_type: ArmISA
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let options = load_options(temp_file.path()).unwrap();
        assert_eq!(options.core_list, "system.cpu");
        assert_eq!(options.isa_flag, "arm");
    }

    #[test]
    fn test_invalid_core_list_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "core_list: system..o3\n").unwrap();
        assert!(load_options(temp_file.path()).is_err());

        let options = TranslateOptions {
            core_list: String::new(),
            ..TranslateOptions::default()
        };
        assert!(matches!(options.validate(), Err(ValidationError::InvalidCoreList(_))));
    }

    #[test]
    fn test_empty_isa_setting_is_rejected() {
        let options = TranslateOptions {
            isa_type: String::new(),
            ..TranslateOptions::default()
        };
        assert!(matches!(options.validate(), Err(ValidationError::InvalidIsa(_))));

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "isa_flag: \"\"\n").unwrap();
        assert!(load_options(temp_file.path()).is_err());
    }

    #[test]
    fn test_unknown_l2_mode_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "l2: banked\n").unwrap();
        assert!(load_options(temp_file.path()).is_err());
    }
}
