//! DispatcherBuilder - construction API
//!
//! Collects stages, pattern bindings, flush triggers, pipes and lookup tables
//! before processing starts. Nothing registered here can change afterwards.

use contracts::keys::DEFAULT_SEPARATOR;
use contracts::{
    ErrorPolicy, LookupTable, MapRegistry, MorphError, Stage, StageId, StreamReceiver,
};
use tracing::{debug, instrument, warn};

use crate::dispatcher::{Dispatcher, StageSlot};
use crate::error_handler::{ErrorHandler, FailFast, handler_for};
use crate::fallback::{ElseMode, Fallback};
use crate::flush::{Binding, FlushCoordinator};
use crate::registry::PatternRegistry;

/// Default bound of feedback and pipe chains
pub const DEFAULT_MAX_FEEDBACK_DEPTH: usize = 32;

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    stages: Vec<StageSlot>,
    registry: PatternRegistry<Binding>,
    flush: FlushCoordinator,
    fallback: Option<Fallback>,
    maps: MapRegistry,
    separator: String,
    error_handler: Box<dyn ErrorHandler>,
    max_feedback_depth: usize,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            registry: PatternRegistry::new(),
            flush: FlushCoordinator::new(),
            fallback: None,
            maps: MapRegistry::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
            error_handler: Box::new(FailFast),
            max_feedback_depth: DEFAULT_MAX_FEEDBACK_DEPTH,
        }
    }

    /// Take ownership of a stage
    pub fn add_stage(&mut self, stage: impl Stage + 'static) -> StageId {
        self.add_boxed_stage(Box::new(stage))
    }

    pub fn add_boxed_stage(&mut self, stage: Box<dyn Stage>) -> StageId {
        let id = StageId(self.stages.len());
        debug!(stage = %stage.name(), id = %id, "Stage added");
        self.stages.push(StageSlot::new(stage));
        id
    }

    /// Bind `stage` to receive every dispatch matching `pattern`
    ///
    /// The fallback keywords `_else`, `_elseNested` and `_elseFlattened` bind to
    /// the fallback route instead. Only one keyword may be used; bindings under
    /// a second keyword are ignored with a warning.
    pub fn register(&mut self, pattern: &str, stage: StageId) -> Result<&mut Self, MorphError> {
        self.check_stage(stage)?;

        match ElseMode::from_key(pattern) {
            Some(mode) => {
                if let Some(fallback) = self.fallback.as_mut() {
                    if fallback.key == pattern {
                        fallback.stages.push(stage);
                    } else {
                        warn!(
                            active = %fallback.key,
                            ignored = %pattern,
                            "Only one fallback keyword is allowed, ignoring binding"
                        );
                    }
                } else {
                    self.fallback = Some(Fallback {
                        key: pattern.to_string(),
                        mode,
                        stages: vec![stage],
                    });
                }
            }
            None => self.registry.register(pattern, Binding::Receive(stage))?,
        }
        Ok(self)
    }

    /// Bind `stage` to flush on `key`; `record` flushes at record end
    pub fn register_flush(&mut self, key: &str, stage: StageId) -> Result<&mut Self, MorphError> {
        self.check_stage(stage)?;
        self.flush.register(key, stage, &mut self.registry)?;
        Ok(self)
    }

    /// Route literal output of `from` into `to` instead of back into the engine
    pub fn connect(&mut self, from: StageId, to: StageId) -> Result<&mut Self, MorphError> {
        self.check_stage(from)?;
        self.check_stage(to)?;
        self.stages[from.index()].downstream = Some(to);
        Ok(self)
    }

    pub fn put_map(&mut self, name: impl Into<String>, table: LookupTable) -> &mut Self {
        self.maps.put_map(name, table);
        self
    }

    /// Replace every lookup table
    pub fn maps(&mut self, maps: MapRegistry) -> &mut Self {
        self.maps = maps;
        self
    }

    pub fn maps_mut(&mut self) -> &mut MapRegistry {
        &mut self.maps
    }

    /// Separator joining entity names into paths
    pub fn entity_separator(&mut self, separator: &str) -> Result<&mut Self, MorphError> {
        if separator.is_empty() {
            return Err(MorphError::invalid_identifier(
                "entity separator must not be empty",
            ));
        }
        self.separator = separator.to_string();
        Ok(self)
    }

    pub fn error_policy(&mut self, policy: ErrorPolicy) -> &mut Self {
        self.error_handler = handler_for(policy);
        self
    }

    pub fn error_handler(&mut self, handler: Box<dyn ErrorHandler>) -> &mut Self {
        self.error_handler = handler;
        self
    }

    pub fn max_feedback_depth(&mut self, depth: usize) -> &mut Self {
        self.max_feedback_depth = depth.max(1);
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Build the dispatcher writing to `sink`
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self, sink),
        fields(stages = self.stages.len(), patterns = self.registry.len())
    )]
    pub fn build<S: StreamReceiver>(self, sink: S) -> Dispatcher<S> {
        debug!(
            record_end_flushes = self.flush.record_end().len(),
            path_flushes = self.flush.path_bound(),
            fallback = ?self.fallback.as_ref().map(|f| f.key.as_str()),
            "Dispatcher built"
        );
        Dispatcher::from_parts(
            self.stages,
            self.registry,
            self.flush,
            self.fallback,
            self.maps,
            self.separator,
            self.error_handler,
            self.max_feedback_depth,
            sink,
        )
    }

    fn check_stage(&self, stage: StageId) -> Result<(), MorphError> {
        if stage.index() < self.stages.len() {
            Ok(())
        } else {
            Err(MorphError::UnknownStage { id: stage.index() })
        }
    }
}
