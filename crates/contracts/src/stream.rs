//! StreamReceiver trait - engine input and output interface
//!
//! Defines the abstract interface for anything consuming a record stream.

use crate::{Event, MorphError};

/// Record stream consumer
///
/// Implemented by output sinks and by the dispatcher itself, so engines can be chained.
pub trait StreamReceiver {
    /// Open a record
    fn start_record(&mut self, id: &str) -> Result<(), MorphError>;

    /// Close the current record
    fn end_record(&mut self) -> Result<(), MorphError>;

    /// Open a nested entity
    fn start_entity(&mut self, name: &str) -> Result<(), MorphError>;

    /// Close the innermost open entity
    fn end_entity(&mut self) -> Result<(), MorphError>;

    /// Leaf name/value pair
    fn literal(&mut self, name: &str, value: &str) -> Result<(), MorphError>;

    /// Drop any per-stream state
    fn reset_stream(&mut self) -> Result<(), MorphError> {
        Ok(())
    }

    /// Release held resources at end of stream
    fn close_stream(&mut self) -> Result<(), MorphError> {
        Ok(())
    }

    /// Route one [`Event`] to the matching method
    fn process(&mut self, event: &Event) -> Result<(), MorphError> {
        match event {
            Event::StartRecord { id } => self.start_record(id),
            Event::EndRecord => self.end_record(),
            Event::StartEntity { name } => self.start_entity(name),
            Event::EndEntity => self.end_entity(),
            Event::Literal { name, value } => self.literal(name, value),
        }
    }
}

impl<T: StreamReceiver + ?Sized> StreamReceiver for Box<T> {
    fn start_record(&mut self, id: &str) -> Result<(), MorphError> {
        (**self).start_record(id)
    }

    fn end_record(&mut self) -> Result<(), MorphError> {
        (**self).end_record()
    }

    fn start_entity(&mut self, name: &str) -> Result<(), MorphError> {
        (**self).start_entity(name)
    }

    fn end_entity(&mut self) -> Result<(), MorphError> {
        (**self).end_entity()
    }

    fn literal(&mut self, name: &str, value: &str) -> Result<(), MorphError> {
        (**self).literal(name, value)
    }

    fn reset_stream(&mut self) -> Result<(), MorphError> {
        (**self).reset_stream()
    }

    fn close_stream(&mut self) -> Result<(), MorphError> {
        (**self).close_stream()
    }
}
