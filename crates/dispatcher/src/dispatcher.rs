//! Dispatcher - record lifecycle and pattern dispatch
//!
//! Input events are flattened into `(path, value)` pairs and delivered to every
//! stage bound to a matching pattern. Stage output flows back through the
//! dispatcher: feedback-marked names are dispatched again, everything else goes
//! to the output sink.

use contracts::keys::{FEEDBACK_CHAR, RECORD_ID, escape_feedback, unescape_feedback};
use contracts::{
    DispatchStats, Emission, MapRegistry, MorphError, Stage, StageContext, StageError, StageId,
    StateScope, StreamReceiver,
};
use tracing::{debug, instrument, trace};

use crate::error_handler::ErrorHandler;
use crate::fallback::{ElseMode, EntityEntry, Fallback};
use crate::flattener::PathFlattener;
use crate::flush::{Binding, FlushCoordinator};
use crate::metrics::DispatchMetrics;
use crate::registry::PatternRegistry;

/// A stage and its wiring
pub(crate) struct StageSlot {
    stage: Box<dyn Stage>,
    pub(crate) downstream: Option<StageId>,
    /// Scope key of the last call, for state reset on scope change
    last_scope: Option<(i32, i32)>,
}

impl StageSlot {
    pub(crate) fn new(stage: Box<dyn Stage>) -> Self {
        Self {
            stage,
            downstream: None,
            last_scope: None,
        }
    }

    fn sync_scope(&mut self, record_count: i32, entity_count: i32) {
        let key = match self.stage.scope() {
            StateScope::Unscoped => return,
            StateScope::Record => (record_count, 0),
            StateScope::Entity => (record_count, entity_count),
        };
        if self.last_scope.is_some_and(|last| last != key) {
            self.stage.reset();
        }
        self.last_scope = Some(key);
    }

    /// Drop state left over from an earlier record; entity changes are
    /// only observed on receive
    fn expire_stale(&mut self, record_count: i32) {
        if self.last_scope.is_some_and(|(record, _)| record != record_count) {
            self.stage.reset();
            self.last_scope = None;
        }
    }
}

/// Where a dispatched pair came from; decides the fallback route
#[derive(Clone, Copy)]
enum Origin<'a> {
    RecordId,
    Feedback,
    Literal { name: &'a str },
    EntityEnd,
}

/// The dispatch engine
///
/// Owns the per-record state (entity stack, counters) exclusively; one
/// instance per worker.
pub struct Dispatcher<S> {
    stages: Vec<StageSlot>,
    registry: PatternRegistry<Binding>,
    flush: FlushCoordinator,
    fallback: Option<Fallback>,
    maps: MapRegistry,
    flattener: PathFlattener,
    error_handler: Box<dyn ErrorHandler>,
    max_feedback_depth: usize,
    sink: S,

    in_record: bool,
    record_id: Option<String>,
    record_count: i32,
    entity_count: i32,
    current_entity_count: i32,
    entity_counts: Vec<i32>,
    nested: Vec<EntityEntry>,

    metrics: DispatchMetrics,
}

impl<S: StreamReceiver> Dispatcher<S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        stages: Vec<StageSlot>,
        registry: PatternRegistry<Binding>,
        flush: FlushCoordinator,
        fallback: Option<Fallback>,
        maps: MapRegistry,
        separator: String,
        error_handler: Box<dyn ErrorHandler>,
        max_feedback_depth: usize,
        sink: S,
    ) -> Self {
        Self {
            stages,
            registry,
            flush,
            fallback,
            maps,
            flattener: PathFlattener::new(separator),
            error_handler,
            max_feedback_depth,
            sink,
            in_record: false,
            record_id: None,
            record_count: 0,
            entity_count: 0,
            current_entity_count: 0,
            entity_counts: Vec::new(),
            nested: Vec::new(),
            metrics: DispatchMetrics::new(),
        }
    }

    /// Number of the current (or last) record
    pub fn record_count(&self) -> i32 {
        self.record_count
    }

    /// Continue numbering after `count`, e.g. when resuming a stream
    pub fn set_record_count(&mut self, count: i32) {
        self.record_count = count.clamp(0, i32::MAX - 1);
    }

    /// Identity of the innermost open entity instance
    pub fn current_entity_count(&self) -> i32 {
        self.current_entity_count
    }

    pub fn current_path(&self) -> &str {
        self.flattener.current_path()
    }

    pub fn entity_depth(&self) -> usize {
        self.flattener.depth()
    }

    pub fn in_record(&self) -> bool {
        self.in_record
    }

    pub fn maps(&self) -> &MapRegistry {
        &self.maps
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stats(&self) -> DispatchStats {
        self.metrics.snapshot()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn structural(&self, message: impl Into<String>) -> MorphError {
        MorphError::structural(self.record_id.as_deref(), message)
    }

    fn require_record(&self, event: &str) -> Result<(), MorphError> {
        if self.in_record {
            Ok(())
        } else {
            Err(self.structural(format!("{event} outside of a record")))
        }
    }

    fn clear_record_state(&mut self) {
        self.in_record = false;
        self.flattener.start_record();
        self.entity_counts.clear();
        self.nested.clear();
        self.entity_count = 0;
        self.current_entity_count = 0;
    }

    fn dispatch(
        &mut self,
        path: &str,
        value: &str,
        origin: Origin<'_>,
        depth: usize,
    ) -> Result<(), MorphError> {
        if depth > self.max_feedback_depth {
            return Err(MorphError::FeedbackDepth {
                path: path.to_string(),
                depth,
            });
        }

        let bindings = self.registry.lookup(path);
        if bindings.is_empty() {
            self.metrics.inc_unmatched();
            trace!(path = %path, "No binding matched");
            return match origin {
                Origin::Literal { name } => self.dispatch_fallback(path, value, Some(name), depth),
                Origin::EntityEnd => self.dispatch_fallback(path, value, None, depth),
                Origin::RecordId | Origin::Feedback => Ok(()),
            };
        }

        self.metrics.inc_matched();
        trace!(path = %path, bindings = bindings.len(), "Dispatching");

        for binding in &bindings {
            if let Binding::Receive(stage) = *binding {
                self.deliver(stage, path, value, depth)?;
            }
        }
        for binding in &bindings {
            if let Binding::Flush(stage) = *binding {
                self.flush_stage(stage, path, depth)?;
            }
        }
        Ok(())
    }

    /// Route an unmatched pair; `literal_name` is `None` for entity ends
    fn dispatch_fallback(
        &mut self,
        path: &str,
        value: &str,
        literal_name: Option<&str>,
        depth: usize,
    ) -> Result<(), MorphError> {
        let Some(fallback) = &self.fallback else {
            return Ok(());
        };
        let mode = fallback.mode;
        let receivers = fallback.stages.clone();

        let name = match (mode, literal_name) {
            (ElseMode::Flat, None) => return Ok(()),
            (ElseMode::Nested, None) => {
                if self.nested.last().is_some_and(|entry| entry.started) {
                    self.sink.end_entity()?;
                    self.metrics.inc_emitted();
                }
                return Ok(());
            }
            (ElseMode::Nested, Some(literal)) if !self.nested.is_empty() => {
                let bound = self
                    .nested
                    .last()
                    .is_some_and(|entry| self.registry.has_match(&entry.path));
                if bound {
                    return Ok(());
                }

                let mut opening = Vec::new();
                for entry in self.nested.iter_mut().rev() {
                    if entry.started {
                        break;
                    }
                    entry.started = true;
                    opening.push(entry.name.clone());
                }
                for entity in opening.iter().rev() {
                    self.sink.start_entity(entity)?;
                    self.metrics.inc_emitted();
                }
                literal
            }
            (_, Some(_)) => path,
        };

        self.metrics.inc_fallback();
        let escaped = escape_feedback(name);
        for stage in receivers {
            self.deliver(stage, &escaped, value, depth)?;
        }
        Ok(())
    }

    fn deliver(
        &mut self,
        id: StageId,
        name: &str,
        value: &str,
        depth: usize,
    ) -> Result<(), MorphError> {
        let (record_count, entity_count) = (self.record_count, self.current_entity_count);
        let mut out = Vec::new();

        let slot = &mut self.stages[id.index()];
        slot.sync_scope(record_count, entity_count);
        let result = {
            let mut ctx = StageContext::new(record_count, entity_count, &self.maps, &mut out);
            slot.stage.receive(name, value, &mut ctx)
        };
        let downstream = slot.downstream;

        match result {
            Ok(()) => self.process_emissions(out, downstream, depth),
            Err(source) => self.stage_failed(id, name, source),
        }
    }

    fn flush_stage(&mut self, id: StageId, path: &str, depth: usize) -> Result<(), MorphError> {
        let (record_count, entity_count) = (self.record_count, self.current_entity_count);
        let mut out = Vec::new();

        let slot = &mut self.stages[id.index()];
        slot.expire_stale(record_count);
        let result = {
            let mut ctx = StageContext::new(record_count, entity_count, &self.maps, &mut out);
            slot.stage.flush(&mut ctx)
        };
        let downstream = slot.downstream;

        match result {
            Ok(()) => self.process_emissions(out, downstream, depth),
            Err(source) => self.stage_failed(id, path, source),
        }
    }

    fn stage_failed(&mut self, id: StageId, path: &str, source: StageError) -> Result<(), MorphError> {
        self.metrics.inc_stage_failures();
        let error = MorphError::Dispatch {
            path: path.to_string(),
            stage: self.stages[id.index()].stage.name().to_string(),
            source,
        };
        self.error_handler.handle(error)
    }

    fn process_emissions(
        &mut self,
        out: Vec<Emission>,
        downstream: Option<StageId>,
        depth: usize,
    ) -> Result<(), MorphError> {
        for emission in out {
            match emission {
                Emission::Literal { name, value } => match downstream {
                    Some(next) => {
                        if depth + 1 > self.max_feedback_depth {
                            return Err(MorphError::FeedbackDepth {
                                path: name,
                                depth: depth + 1,
                            });
                        }
                        self.deliver(next, &name, &value, depth + 1)?;
                    }
                    None => self.receive_emitted(&name, &value, depth)?,
                },
                Emission::StartEntity(name) => {
                    self.sink.start_entity(&name)?;
                    self.metrics.inc_emitted();
                }
                Emission::EndEntity => {
                    self.sink.end_entity()?;
                    self.metrics.inc_emitted();
                }
            }
        }
        Ok(())
    }

    /// Stage output reaching the engine: feedback or sink literal
    fn receive_emitted(&mut self, name: &str, value: &str, depth: usize) -> Result<(), MorphError> {
        if name.starts_with(FEEDBACK_CHAR) {
            self.metrics.inc_feedback();
            return self.dispatch(name, value, Origin::Feedback, depth + 1);
        }
        self.sink.literal(unescape_feedback(name), value)?;
        self.metrics.inc_emitted();
        Ok(())
    }
}

impl<S: StreamReceiver> StreamReceiver for Dispatcher<S> {
    fn start_record(&mut self, id: &str) -> Result<(), MorphError> {
        if self.in_record {
            return Err(self.structural(format!(
                "start record '{id}' while the previous record is still open"
            )));
        }

        self.clear_record_state();
        self.in_record = true;
        self.record_id = Some(id.to_string());
        self.entity_counts.push(0);
        self.record_count = (self.record_count + 1) % i32::MAX;
        debug!(record_id = %id, record_count = self.record_count, "Record started");

        self.sink.start_record(id)?;
        self.dispatch(RECORD_ID, id, Origin::RecordId, 0)
    }

    fn end_record(&mut self) -> Result<(), MorphError> {
        self.require_record("end record")?;

        // a failed flush still closes the record
        let mut first_error = None;
        for stage in self.flush.record_end().to_vec() {
            if let Err(error) = self.flush_stage(stage, contracts::keys::RECORD_FLUSH, 0) {
                first_error = Some(error);
                break;
            }
        }

        let forwarded = self.sink.end_record();
        self.entity_counts.pop();
        let balanced = self.entity_counts.is_empty() && self.flattener.depth() == 0;
        if !balanced && first_error.is_none() {
            first_error = Some(self.structural("entity starts and ends are not balanced"));
        }

        self.clear_record_state();
        self.metrics.inc_records();
        debug!(record_count = self.record_count, "Record ended");

        match (first_error, forwarded) {
            (Some(error), _) | (None, Err(error)) => Err(error),
            (None, Ok(())) => Ok(()),
        }
    }

    fn start_entity(&mut self, name: &str) -> Result<(), MorphError> {
        self.require_record("start entity")?;

        self.entity_count = self.entity_count.wrapping_add(1);
        self.current_entity_count = self.entity_count;
        self.entity_counts.push(self.entity_count);
        self.metrics.inc_entities();

        self.flattener.start_entity(name);
        self.nested.push(EntityEntry {
            name: name.to_string(),
            path: self.flattener.current_path().to_string(),
            started: false,
        });
        Ok(())
    }

    fn end_entity(&mut self) -> Result<(), MorphError> {
        self.require_record("end entity")?;
        if self.flattener.depth() == 0 {
            return Err(self.structural("end entity without matching start entity"));
        }

        let path = self.flattener.current_path().to_string();
        self.dispatch(&path, "", Origin::EntityEnd, 0)?;

        self.flattener.end_entity()?;
        self.nested.pop();
        self.entity_counts.pop();
        self.current_entity_count = self.entity_counts.last().copied().unwrap_or(0);
        Ok(())
    }

    fn literal(&mut self, name: &str, value: &str) -> Result<(), MorphError> {
        self.require_record("literal")?;
        self.metrics.inc_literals();

        let path = self.flattener.literal(name);
        self.dispatch(&path, value, Origin::Literal { name }, 0)
    }

    /// Drop all per-record and per-stage state, then reset the sink
    #[instrument(name = "dispatcher_reset_stream", skip(self))]
    fn reset_stream(&mut self) -> Result<(), MorphError> {
        self.clear_record_state();
        self.record_id = None;
        self.record_count = 0;
        for slot in &mut self.stages {
            slot.stage.reset();
            slot.last_scope = None;
        }
        self.sink.reset_stream()
    }

    /// Close every stage, then the sink; the first failure is returned
    /// after everything has been closed
    #[instrument(name = "dispatcher_close_stream", skip(self), fields(stages = self.stages.len()))]
    fn close_stream(&mut self) -> Result<(), MorphError> {
        let mut first_error = None;
        for index in 0..self.stages.len() {
            if let Err(source) = self.stages[index].stage.close() {
                if let Err(error) = self.stage_failed(StageId(index), "close_stream", source) {
                    first_error.get_or_insert(error);
                }
            }
        }
        debug!(stats = ?self.metrics.snapshot(), "Dispatcher closing");
        let closed = self.sink.close_stream();

        match (first_error, closed) {
            (Some(error), _) | (None, Err(error)) => Err(error),
            (None, Ok(())) => Ok(()),
        }
    }
}
