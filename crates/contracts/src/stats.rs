//! Engine statistics snapshot

use serde::Serialize;

/// Snapshot of dispatcher counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Completed records
    pub records: u64,
    /// Entity starts received
    pub entities: u64,
    /// Literals received
    pub literals: u64,
    /// Dispatches with at least one receiver
    pub matched: u64,
    /// Dispatches without receivers
    pub unmatched: u64,
    /// Unmatched dispatches routed to a fallback
    pub fallback: u64,
    /// Emissions re-dispatched through the feedback marker
    pub feedback: u64,
    /// Stage calls that returned an error
    pub stage_failures: u64,
    /// Events forwarded to the sink
    pub emitted: u64,
}

impl DispatchStats {
    /// Share of dispatches that matched at least one pattern
    pub fn match_rate(&self) -> f64 {
        let total = self.matched + self.unmatched;
        if total == 0 {
            0.0
        } else {
            self.matched as f64 / total as f64
        }
    }
}
