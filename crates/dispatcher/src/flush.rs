//! FlushCoordinator - flush trigger registration
//!
//! A flush trigger is either record end (key `record`) or a path key. Path keys
//! are stored in the pattern registry next to the receive bindings, so a flush
//! fires for every dispatch to one of its keys.

use contracts::keys::RECORD_FLUSH;
use contracts::{MorphError, StageId};

use crate::registry::PatternRegistry;

/// What a registry entry does with the dispatched value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Deliver the value to the stage
    Receive(StageId),
    /// Flush the stage
    Flush(StageId),
}

/// Record-end and path-bound flush listeners
#[derive(Debug, Default)]
pub struct FlushCoordinator {
    record_end: Vec<StageId>,
    path_bound: usize,
}

impl FlushCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `stage` to flush on `key`
    ///
    /// Key alternation must be resolved by the caller; each key is one binding.
    pub fn register(
        &mut self,
        key: &str,
        stage: StageId,
        registry: &mut PatternRegistry<Binding>,
    ) -> Result<(), MorphError> {
        if key.is_empty() {
            return Err(MorphError::invalid_identifier("flush key must not be empty"));
        }

        if key == RECORD_FLUSH {
            self.record_end.push(stage);
        } else {
            registry.register(key, Binding::Flush(stage))?;
            self.path_bound += 1;
        }
        Ok(())
    }

    /// Stages flushed at record end, in registration order
    pub fn record_end(&self) -> &[StageId] {
        &self.record_end
    }

    /// Number of path-bound flush bindings
    pub fn path_bound(&self) -> usize {
        self.path_bound
    }
}
