//! PathFlattener - nested entities to flat paths
//!
//! Owns the entity name stack of the record being processed.

use contracts::MorphError;
use contracts::keys::DEFAULT_SEPARATOR;

/// Converts nested entity events into separator-joined paths
#[derive(Debug, Clone)]
pub struct PathFlattener {
    separator: String,
    names: Vec<String>,
    /// Prefix of every literal path: each open entity followed by the separator
    prefix: String,
    /// Prefix length before each push, for truncation on pop
    marks: Vec<usize>,
}

impl Default for PathFlattener {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl PathFlattener {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            names: Vec::new(),
            prefix: String::new(),
            marks: Vec::new(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Clear the entity stack and the path buffer
    pub fn start_record(&mut self) {
        self.names.clear();
        self.marks.clear();
        self.prefix.clear();
    }

    pub fn start_entity(&mut self, name: &str) {
        self.marks.push(self.prefix.len());
        self.prefix.push_str(name);
        self.prefix.push_str(&self.separator);
        self.names.push(name.to_string());
    }

    /// Pop the innermost entity
    pub fn end_entity(&mut self) -> Result<(), MorphError> {
        match (self.names.pop(), self.marks.pop()) {
            (Some(_), Some(mark)) => {
                self.prefix.truncate(mark);
                Ok(())
            }
            _ => Err(MorphError::structural(
                None,
                "end entity without matching start entity",
            )),
        }
    }

    /// Full path of a literal called `name` in the current entity
    pub fn literal(&self, name: &str) -> String {
        let mut path = String::with_capacity(self.prefix.len() + name.len());
        path.push_str(&self.prefix);
        path.push_str(name);
        path
    }

    /// Path of the innermost entity, without trailing separator
    pub fn current_path(&self) -> &str {
        if self.prefix.is_empty() {
            ""
        } else {
            &self.prefix[..self.prefix.len() - self.separator.len()]
        }
    }

    /// Name of the innermost entity
    pub fn current_entity_name(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }
}
