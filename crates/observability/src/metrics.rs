//! Dispatch 指标模块
//!
//! 将 DispatchStats 发布到 metrics facade，并在内存中汇总批次耗时。

use contracts::DispatchStats;
use metrics::{counter, gauge, histogram};

/// 发布 DispatchStats 增量
///
/// `previous` 为上一次发布时的快照，首次调用传 `DispatchStats::default()`。
/// 计数器只累加差值，重复发布同一快照不会重复计数。
pub fn record_dispatch_stats(previous: &DispatchStats, current: &DispatchStats) {
    let delta = |now: u64, before: u64| now.saturating_sub(before);

    counter!("recmorph_records_total").increment(delta(current.records, previous.records));
    counter!("recmorph_entities_total").increment(delta(current.entities, previous.entities));
    counter!("recmorph_literals_total").increment(delta(current.literals, previous.literals));
    counter!("recmorph_dispatch_total", "result" => "matched")
        .increment(delta(current.matched, previous.matched));
    counter!("recmorph_dispatch_total", "result" => "unmatched")
        .increment(delta(current.unmatched, previous.unmatched));
    counter!("recmorph_fallback_total").increment(delta(current.fallback, previous.fallback));
    counter!("recmorph_feedback_total").increment(delta(current.feedback, previous.feedback));
    counter!("recmorph_stage_failures_total")
        .increment(delta(current.stage_failures, previous.stage_failures));
    counter!("recmorph_emitted_total").increment(delta(current.emitted, previous.emitted));

    gauge!("recmorph_match_rate").set(current.match_rate());
}

/// 记录一批记录的处理耗时
pub fn record_batch_latency_ms(latency_ms: f64) {
    histogram!("recmorph_batch_latency_ms").record(latency_ms);
}

/// 记录输入流错误
pub fn record_stream_error(kind: &str) {
    counter!("recmorph_stream_errors_total", "kind" => kind.to_string()).increment(1);
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub stats: DispatchStats,
    pub elapsed_secs: f64,
    pub batch_latency_ms: StatsSummary,
}

impl DispatchSummary {
    /// 每秒处理记录数
    pub fn records_per_sec(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.stats.records as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = &self.stats;
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(
            f,
            "Records: {} ({:.1}/s)",
            s.records,
            self.records_per_sec()
        )?;
        writeln!(f, "Entities: {}", s.entities)?;
        writeln!(f, "Literals: {}", s.literals)?;
        writeln!(
            f,
            "Matched: {} / unmatched: {} ({:.2}%)",
            s.matched,
            s.unmatched,
            s.match_rate() * 100.0
        )?;
        writeln!(f, "Fallback: {}", s.fallback)?;
        writeln!(f, "Feedback: {}", s.feedback)?;
        writeln!(f, "Stage failures: {}", s.stage_failures)?;
        writeln!(f, "Emitted: {}", s.emitted)?;
        writeln!(f, "Batch latency (ms): {}", self.batch_latency_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
