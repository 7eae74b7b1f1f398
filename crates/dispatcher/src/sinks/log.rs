//! LogSink - logs output events via tracing

use contracts::{MorphError, StreamReceiver};
use tracing::{debug, info, instrument};

/// Sink that logs every output event for debugging
pub struct LogSink {
    name: String,
    depth: usize,
    records: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depth: 0,
            records: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records seen so far
    pub fn records(&self) -> u64 {
        self.records
    }
}

impl StreamReceiver for LogSink {
    fn start_record(&mut self, id: &str) -> Result<(), MorphError> {
        info!(sink = %self.name, record_id = %id, "Record started");
        Ok(())
    }

    fn end_record(&mut self) -> Result<(), MorphError> {
        self.records += 1;
        self.depth = 0;
        info!(sink = %self.name, records = self.records, "Record ended");
        Ok(())
    }

    fn start_entity(&mut self, name: &str) -> Result<(), MorphError> {
        debug!(sink = %self.name, depth = self.depth, entity = %name, "Entity started");
        self.depth += 1;
        Ok(())
    }

    fn end_entity(&mut self) -> Result<(), MorphError> {
        self.depth = self.depth.saturating_sub(1);
        debug!(sink = %self.name, depth = self.depth, "Entity ended");
        Ok(())
    }

    fn literal(&mut self, name: &str, value: &str) -> Result<(), MorphError> {
        info!(sink = %self.name, depth = self.depth, name = %name, value = %value, "Literal");
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self), fields(sink = %self.name))]
    fn close_stream(&mut self) -> Result<(), MorphError> {
        info!(sink = %self.name, records = self.records, "LogSink closed");
        Ok(())
    }
}
