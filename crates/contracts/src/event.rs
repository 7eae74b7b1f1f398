//! Event - the generic record stream
//!
//! Same shape on the input and the output side of the engine.

use serde::{Deserialize, Serialize};

/// One event of a record stream
///
/// Entity starts and ends are balanced within one record; records are never nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    StartRecord { id: String },
    EndRecord,
    StartEntity { name: String },
    EndEntity,
    Literal { name: String, value: String },
}

impl Event {
    pub fn start_record(id: impl Into<String>) -> Self {
        Self::StartRecord { id: id.into() }
    }

    pub fn start_entity(name: impl Into<String>) -> Self {
        Self::StartEntity { name: name.into() }
    }

    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Literal {
            name: name.into(),
            value: value.into(),
        }
    }
}
