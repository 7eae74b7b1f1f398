//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the workspace.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Event Model
//! - A record is a balanced tree of entities and literals, delimited by
//!   `StartRecord` / `EndRecord`
//! - Paths are built from the entity name stack joined with a separator
//! - Stages receive `(name, value, record_count, entity_count)` and emit
//!   through a [`StageContext`]

mod definition;
mod error;
mod event;
pub mod keys;
mod maps;
mod pattern;
mod stage;
mod stats;
mod stream;

pub use definition::*;
pub use error::*;
pub use event::Event;
pub use maps::{LookupTable, MapRegistry};
pub use pattern::{Pattern, PatternKind};
pub use stage::{Emission, Stage, StageContext, StageId, StateScope};
pub use stats::DispatchStats;
pub use stream::StreamReceiver;
