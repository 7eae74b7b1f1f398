//! Named lookup tables
//!
//! Consumed by lookup-style stages through [`crate::StageContext::lookup`].

use std::collections::BTreeMap;

use crate::keys::DEFAULT_MAP_KEY;

/// One named table of key/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    entries: BTreeMap<String, String>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Value for `key`, or the `__default` entry when the key is absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .or_else(|| self.entries.get(DEFAULT_MAP_KEY))
            .map(String::as_str)
    }

    /// Value for `key` without default fallback
    pub fn get_exact(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LookupTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Registry of named lookup tables
#[derive(Debug, Clone, Default)]
pub struct MapRegistry {
    maps: BTreeMap<String, LookupTable>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key` in table `map_name`, honoring the table's default entry
    pub fn get_value(&self, map_name: &str, key: &str) -> Option<&str> {
        self.maps.get(map_name).and_then(|table| table.get(key))
    }

    pub fn get_map(&self, map_name: &str) -> Option<&LookupTable> {
        self.maps.get(map_name)
    }

    /// Add or replace a whole table
    pub fn put_map(&mut self, map_name: impl Into<String>, table: LookupTable) {
        self.maps.insert(map_name.into(), table);
    }

    /// Add a single entry, creating the table on first use
    pub fn put_value(
        &mut self,
        map_name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.maps.entry(map_name.into()).or_default().insert(key, value);
    }

    /// Table names in sorted order
    pub fn map_names(&self) -> Vec<&str> {
        self.maps.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, map_name: &str) -> bool {
        self.maps.contains_key(map_name)
    }
}
