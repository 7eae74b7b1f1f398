//! Dispatch metrics for observability

use contracts::DispatchStats;

/// Counters of one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    records: u64,
    entities: u64,
    literals: u64,
    matched: u64,
    unmatched: u64,
    fallback: u64,
    feedback: u64,
    stage_failures: u64,
    emitted: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_records(&mut self) {
        self.records += 1;
    }

    pub fn inc_entities(&mut self) {
        self.entities += 1;
    }

    pub fn inc_literals(&mut self) {
        self.literals += 1;
    }

    pub fn inc_matched(&mut self) {
        self.matched += 1;
    }

    pub fn inc_unmatched(&mut self) {
        self.unmatched += 1;
    }

    pub fn inc_fallback(&mut self) {
        self.fallback += 1;
    }

    pub fn inc_feedback(&mut self) {
        self.feedback += 1;
    }

    pub fn inc_stage_failures(&mut self) {
        self.stage_failures += 1;
    }

    pub fn inc_emitted(&mut self) {
        self.emitted += 1;
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            records: self.records,
            entities: self.entities,
            literals: self.literals,
            matched: self.matched,
            unmatched: self.unmatched,
            fallback: self.fallback,
            feedback: self.feedback,
            stage_failures: self.stage_failures,
            emitted: self.emitted,
        }
    }
}
