//! Sink implementations
//!
//! Contains LogSink, NdjsonSink, EventCollector and FanOutSink.

mod collector;
mod fanout;
mod file;
mod log;

pub use self::collector::EventCollector;
pub use self::fanout::{BoxedSink, FanOutSink};
pub use self::file::{FileSinkConfig, NdjsonSink};
pub use self::log::LogSink;

use contracts::{MorphError, SinkConfig, SinkType};
use tracing::instrument;

/// Create a sink from configuration
#[instrument(
    name = "dispatcher_create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink(config: &SinkConfig) -> Result<BoxedSink, MorphError> {
    match config.sink_type {
        SinkType::Log => Ok(Box::new(LogSink::new(&config.name))),
        SinkType::File => {
            let sink = NdjsonSink::from_params(&config.name, &config.params)
                .map_err(|e| MorphError::sink_write(&config.name, e.to_string()))?;
            Ok(Box::new(sink))
        }
        SinkType::Stdout => Ok(Box::new(NdjsonSink::stdout(&config.name))),
    }
}

/// Fan out to every configured sink
pub fn create_sinks(configs: &[SinkConfig]) -> Result<FanOutSink, MorphError> {
    let mut fanout = FanOutSink::default();
    for config in configs {
        fanout.push(create_sink(config)?);
    }
    Ok(fanout)
}
