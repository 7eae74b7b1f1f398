//! Stage trait - pipeline stage contract
//!
//! Stages receive flattened `(name, value)` pairs together with the record and
//! entity counters, and emit output through a [`StageContext`].

use crate::{MapRegistry, StageError};

/// Handle of a stage owned by a dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub usize);

impl StageId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifetime of the state a stage accumulates
///
/// The dispatcher calls [`Stage::reset`] whenever the owning scope changes
/// between two calls to the same stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateScope {
    /// Never reset by the dispatcher
    #[default]
    Unscoped,
    /// Reset when a new record starts
    Record,
    /// Reset when a different entity instance is current
    Entity,
}

/// Output produced by a stage during one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    Literal { name: String, value: String },
    StartEntity(String),
    EndEntity,
}

/// Per-call context handed to a stage
pub struct StageContext<'a> {
    record_count: i32,
    entity_count: i32,
    maps: &'a MapRegistry,
    out: &'a mut Vec<Emission>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        record_count: i32,
        entity_count: i32,
        maps: &'a MapRegistry,
        out: &'a mut Vec<Emission>,
    ) -> Self {
        Self {
            record_count,
            entity_count,
            maps,
            out,
        }
    }

    /// Number of the current record, starting at 1
    pub fn record_count(&self) -> i32 {
        self.record_count
    }

    /// Identity of the innermost open entity instance (0 outside entities)
    pub fn entity_count(&self) -> i32 {
        self.entity_count
    }

    /// Emit a literal; names starting with `@` are fed back into dispatch
    pub fn emit(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.out.push(Emission::Literal {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Open an entity on the output side
    pub fn start_entity(&mut self, name: impl Into<String>) {
        self.out.push(Emission::StartEntity(name.into()));
    }

    /// Close the innermost output entity
    pub fn end_entity(&mut self) {
        self.out.push(Emission::EndEntity);
    }

    /// Resolve a key through a named lookup table
    pub fn lookup(&self, map_name: &str, key: &str) -> Option<&'a str> {
        self.maps.get_value(map_name, key)
    }

    pub fn maps(&self) -> &'a MapRegistry {
        self.maps
    }
}

/// Pipeline stage
///
/// # Implementation Requirements
/// - `receive` must not assume it is the only receiver of a path
/// - Emissions of a failing call are discarded by the dispatcher
/// - `flush` is invoked once per bound scope, with the counters of that scope
pub trait Stage: Send {
    /// Stage name, used in logs and errors
    fn name(&self) -> &str;

    /// Receive one flattened value
    fn receive(
        &mut self,
        name: &str,
        value: &str,
        ctx: &mut StageContext<'_>,
    ) -> Result<(), StageError>;

    /// Finalize buffered output
    fn flush(&mut self, _ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        Ok(())
    }

    /// Lifetime of accumulated state
    fn scope(&self) -> StateScope {
        StateScope::Unscoped
    }

    /// Drop accumulated state
    fn reset(&mut self) {}

    /// Release held resources at end of stream
    fn close(&mut self) -> Result<(), StageError> {
        Ok(())
    }
}
