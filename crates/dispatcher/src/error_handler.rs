//! Stage failure policies

use contracts::{ErrorPolicy, MorphError};
use tracing::warn;

/// Decides whether a failed stage call aborts the run
///
/// Returning `Ok` continues with the remaining receivers of the same event.
pub trait ErrorHandler: Send {
    fn handle(&mut self, error: MorphError) -> Result<(), MorphError>;
}

/// Re-raise every failure
#[derive(Debug, Default, Clone, Copy)]
pub struct FailFast;

impl ErrorHandler for FailFast {
    fn handle(&mut self, error: MorphError) -> Result<(), MorphError> {
        Err(error)
    }
}

/// Log every failure and continue
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAndContinue {
    failures: u64,
}

impl LogAndContinue {
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl ErrorHandler for LogAndContinue {
    fn handle(&mut self, error: MorphError) -> Result<(), MorphError> {
        self.failures += 1;
        warn!(error = %error, failures = self.failures, "Stage failed, continuing");
        Ok(())
    }
}

/// Handler for a configured policy
pub fn handler_for(policy: ErrorPolicy) -> Box<dyn ErrorHandler> {
    match policy {
        ErrorPolicy::Fail => Box::new(FailFast),
        ErrorPolicy::Log => Box::new(LogAndContinue::default()),
    }
}
