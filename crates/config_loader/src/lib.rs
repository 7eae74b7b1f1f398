//! # Config Loader
//!
//! Definition loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON definition files
//! - Substitute `$[name]` variables
//! - Validate definition legality
//! - Load lookup tables, including map files next to the definition
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let def = ConfigLoader::load_from_path(Path::new("morph.toml")).unwrap();
//! println!("Rules: {}", def.rules.len());
//! ```

mod parser;
mod resolve;
mod tables;
mod validator;

pub use contracts::MorphDefinition;
pub use parser::ConfigFormat;
pub use contracts::keys::split_alternatives;
pub use resolve::substitute;
pub use validator::collect_warnings;

use contracts::{MapRegistry, MorphError};
use std::path::Path;
use tracing::{debug, instrument};

/// Configuration loader
///
/// Provides static methods to load definitions from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load definition from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Undefined variable
    /// - Validation failure
    #[instrument(name = "config_load_from_path", skip(path), fields(path = %path.display()))]
    pub fn load_from_path(path: &Path) -> Result<MorphDefinition, MorphError> {
        let format = ConfigFormat::from_path(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load definition from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Undefined variable
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<MorphDefinition, MorphError> {
        Self::parse_and_validate(content, format)
    }

    /// Build the lookup tables of `def`
    ///
    /// Relative map files resolve against `base_dir`, usually the directory of
    /// the definition file.
    pub fn load_tables(
        def: &MorphDefinition,
        base_dir: Option<&Path>,
    ) -> Result<MapRegistry, MorphError> {
        tables::load_tables(def, base_dir)
    }

    /// Serialize MorphDefinition to TOML string
    pub fn to_toml(def: &MorphDefinition) -> Result<String, MorphError> {
        toml::to_string_pretty(def)
            .map_err(|e| MorphError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize MorphDefinition to JSON string
    pub fn to_json(def: &MorphDefinition) -> Result<String, MorphError> {
        serde_json::to_string_pretty(def)
            .map_err(|e| MorphError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Read definition file content
    fn read_file(path: &Path) -> Result<String, MorphError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse, resolve and validate definition content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<MorphDefinition, MorphError> {
        let mut def = parser::parse(content, format)?;
        resolve::substitute_vars(&mut def)?;
        validator::validate(&def)?;
        debug!(
            rules = def.rules.len(),
            maps = def.maps.len(),
            sinks = def.sinks.len(),
            "Definition loaded"
        );
        Ok(def)
    }
}
