//! EventCollector - keeps output events in memory

use contracts::{Event, MorphError, StreamReceiver};

/// In-memory sink, used by tests and by engine chaining
#[derive(Debug, Default, Clone)]
pub struct EventCollector {
    events: Vec<Event>,
    closed: bool,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take the collected events, leaving the collector empty
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Literals only, as `(name, value)` pairs
    pub fn literals(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Literal { name, value } => Some((name.as_str(), value.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl StreamReceiver for EventCollector {
    fn start_record(&mut self, id: &str) -> Result<(), MorphError> {
        self.events.push(Event::start_record(id));
        Ok(())
    }

    fn end_record(&mut self) -> Result<(), MorphError> {
        self.events.push(Event::EndRecord);
        Ok(())
    }

    fn start_entity(&mut self, name: &str) -> Result<(), MorphError> {
        self.events.push(Event::start_entity(name));
        Ok(())
    }

    fn end_entity(&mut self) -> Result<(), MorphError> {
        self.events.push(Event::EndEntity);
        Ok(())
    }

    fn literal(&mut self, name: &str, value: &str) -> Result<(), MorphError> {
        self.events.push(Event::literal(name, value));
        Ok(())
    }

    fn reset_stream(&mut self) -> Result<(), MorphError> {
        self.events.clear();
        Ok(())
    }

    fn close_stream(&mut self) -> Result<(), MorphError> {
        self.closed = true;
        Ok(())
    }
}
