//! Lookup table loading
//!
//! A table is built from its optional file, then its inline entries (which
//! override file entries), then its default.

use std::path::{Path, PathBuf};

use contracts::keys::DEFAULT_MAP_KEY;
use contracts::{LookupTable, MapConfig, MapRegistry, MorphDefinition, MorphError};
use tracing::debug;

/// Build every table of `def`; relative map files resolve against `base_dir`
pub fn load_tables(def: &MorphDefinition, base_dir: Option<&Path>) -> Result<MapRegistry, MorphError> {
    let mut registry = MapRegistry::new();
    for (name, config) in &def.maps {
        let table = load_table(name, config, base_dir)?;
        debug!(map = %name, entries = table.len(), "Lookup table loaded");
        registry.put_map(name.clone(), table);
    }
    Ok(registry)
}

fn load_table(
    name: &str,
    config: &MapConfig,
    base_dir: Option<&Path>,
) -> Result<LookupTable, MorphError> {
    let mut table = LookupTable::new();

    if let Some(file) = &config.file {
        let path = resolve_path(file, base_dir);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            MorphError::config_validation(
                format!("maps.{name}.file"),
                format!("cannot read '{}': {e}", path.display()),
            )
        })?;
        parse_table_file(&content, &config.separator, &mut table).map_err(|message| {
            MorphError::config_validation(format!("maps.{name}.file"), message)
        })?;
    }

    for (key, value) in &config.entries {
        table.insert(key.clone(), value.clone());
    }
    if let Some(default) = &config.default {
        table.insert(DEFAULT_MAP_KEY, default.clone());
    }
    Ok(table)
}

fn resolve_path(file: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(file);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

/// Parse `key<sep>value` lines; blank lines and `#` comments are skipped
fn parse_table_file(content: &str, separator: &str, table: &mut LookupTable) -> Result<(), String> {
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once(separator)
            .ok_or_else(|| format!("line {}: missing separator", line_no + 1))?;
        table.insert(key, value);
    }
    Ok(())
}
