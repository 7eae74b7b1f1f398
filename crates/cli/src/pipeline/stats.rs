//! Pipeline statistics.

use std::time::Duration;

use contracts::DispatchStats;
use observability::{DispatchSummary, RunningStats, StatsSummary};
use serde::Serialize;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Events read from the input
    pub events_read: u64,

    /// Input lines skipped as invalid
    pub invalid_lines: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Number of sinks receiving output
    pub active_sinks: usize,

    /// Final engine counters
    pub dispatch: DispatchStats,

    /// Per-record processing time (ms)
    pub record_latency: RunningStats,
}

/// JSON shape of `--stats-json`
#[derive(Serialize)]
struct StatsReport<'a> {
    events_read: u64,
    invalid_lines: u64,
    duration_secs: f64,
    records_per_sec: f64,
    active_sinks: usize,
    dispatch: &'a DispatchStats,
}

impl PipelineStats {
    /// Records per second throughput
    pub fn records_per_sec(&self) -> f64 {
        self.summary().records_per_sec()
    }

    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            stats: self.dispatch.clone(),
            elapsed_secs: self.duration.as_secs_f64(),
            batch_latency_ms: StatsSummary::from(&self.record_latency),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&StatsReport {
            events_read: self.events_read,
            invalid_lines: self.invalid_lines,
            duration_secs: self.duration.as_secs_f64(),
            records_per_sec: self.records_per_sec(),
            active_sinks: self.active_sinks,
            dispatch: &self.dispatch,
        })
    }

    /// Print detailed summary on stderr; stdout may carry record output
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Events read: {}", self.events_read);
        if self.invalid_lines > 0 {
            eprintln!("Invalid lines skipped: {}", self.invalid_lines);
        }
        eprintln!("Active sinks: {}", self.active_sinks);
        eprint!("{}", self.summary());
    }
}
