//! # Dispatcher
//!
//! Pattern-driven dispatch engine.
//!
//! Responsibilities:
//! - Flatten nested entity events into paths
//! - Deliver each path/value pair to every stage bound to a matching pattern
//! - Route unmatched pairs to the fallback, feed marked output back into dispatch
//! - Drive record and entity lifecycle, counters and flush triggers

pub mod builder;
pub mod dispatcher;
pub mod error_handler;
pub mod fallback;
pub mod flattener;
pub mod flush;
pub mod metrics;
pub mod registry;
pub mod sinks;

pub use builder::{DEFAULT_MAX_FEEDBACK_DEPTH, DispatcherBuilder};
pub use contracts::{Stage, StreamReceiver};
pub use dispatcher::Dispatcher;
pub use error_handler::{ErrorHandler, FailFast, LogAndContinue, handler_for};
pub use fallback::ElseMode;
pub use flattener::PathFlattener;
pub use flush::{Binding, FlushCoordinator};
pub use metrics::DispatchMetrics;
pub use registry::PatternRegistry;
pub use sinks::{
    BoxedSink, EventCollector, FanOutSink, LogSink, NdjsonSink, create_sink, create_sinks,
};
