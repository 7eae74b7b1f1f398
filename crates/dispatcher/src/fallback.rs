//! Fallback routing for unmatched paths

use contracts::StageId;
use contracts::keys::{ELSE, ELSE_FLATTENED, ELSE_NESTED};

/// How unmatched literals reach the fallback receivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElseMode {
    /// `_else` / `_elseFlattened`: full path as name, entity ends ignored
    Flat,
    /// `_elseNested`: unmatched entities re-opened around the literal name
    Nested,
}

impl ElseMode {
    /// Mode for a fallback keyword, `None` for ordinary patterns
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            ELSE | ELSE_FLATTENED => Some(ElseMode::Flat),
            ELSE_NESTED => Some(ElseMode::Nested),
            _ => None,
        }
    }
}

/// Fallback receivers registered under one keyword
#[derive(Debug, Clone)]
pub struct Fallback {
    pub key: String,
    pub mode: ElseMode,
    pub stages: Vec<StageId>,
}

/// Open input entity as seen by the nested fallback
#[derive(Debug, Clone)]
pub(crate) struct EntityEntry {
    pub name: String,
    pub path: String,
    /// Already re-opened on the output side
    pub started: bool,
}
