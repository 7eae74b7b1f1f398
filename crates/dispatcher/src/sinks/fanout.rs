//! FanOutSink - forwards every event to several sinks

use contracts::{MorphError, StreamReceiver};

/// Boxed sink as produced by [`crate::create_sink`]
pub type BoxedSink = Box<dyn StreamReceiver + Send>;

/// Forwards each event to every inner sink, in order
///
/// The first failing sink aborts the event; later sinks do not see it.
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<BoxedSink>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<BoxedSink>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: BoxedSink) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(
        &mut self,
        mut f: impl FnMut(&mut BoxedSink) -> Result<(), MorphError>,
    ) -> Result<(), MorphError> {
        for sink in &mut self.sinks {
            f(sink)?;
        }
        Ok(())
    }
}

impl StreamReceiver for FanOutSink {
    fn start_record(&mut self, id: &str) -> Result<(), MorphError> {
        self.each(|sink| sink.start_record(id))
    }

    fn end_record(&mut self) -> Result<(), MorphError> {
        self.each(|sink| sink.end_record())
    }

    fn start_entity(&mut self, name: &str) -> Result<(), MorphError> {
        self.each(|sink| sink.start_entity(name))
    }

    fn end_entity(&mut self) -> Result<(), MorphError> {
        self.each(|sink| sink.end_entity())
    }

    fn literal(&mut self, name: &str, value: &str) -> Result<(), MorphError> {
        self.each(|sink| sink.literal(name, value))
    }

    fn reset_stream(&mut self) -> Result<(), MorphError> {
        self.each(|sink| sink.reset_stream())
    }

    /// Closes every sink, reporting the first failure
    fn close_stream(&mut self) -> Result<(), MorphError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.close_stream() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
