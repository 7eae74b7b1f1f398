//! Pipeline orchestrator - coordinates definition, engine, input and sinks.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{DispatchStats, Event, MorphDefinition, MorphError, StreamReceiver};
use dispatcher::{Dispatcher, FanOutSink, NdjsonSink, create_sinks};
use observability::metrics::{record_batch_latency_ms, record_dispatch_stats, record_stream_error};
use tracing::{debug, info, warn};

use super::PipelineStats;
use super::source::{self, EventReader};
use crate::error::CliError;

/// Records between two metric publications
const PUBLISH_EVERY: u64 = 1000;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The loaded definition
    pub definition: MorphDefinition,

    /// Directory that relative map files resolve against
    pub base_dir: Option<PathBuf>,

    /// NDJSON input (None = stdin)
    pub input: Option<PathBuf>,

    /// Maximum number of records to process (None = unlimited)
    pub max_records: Option<u64>,

    /// Skip invalid input lines instead of aborting
    pub skip_invalid: bool,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Build the engine and its sinks; stdout NDJSON when no sink is configured
    pub fn assemble(&self) -> Result<Dispatcher<FanOutSink>> {
        let def = &self.config.definition;
        let maps = ConfigLoader::load_tables(def, self.config.base_dir.as_deref())
            .context("Failed to load lookup tables")?;

        let sink = if def.sinks.is_empty() {
            FanOutSink::new(vec![Box::new(NdjsonSink::stdout("stdout"))])
        } else {
            create_sinks(&def.sinks).context("Failed to create sinks")?
        };

        stages::assemble(def, maps, sink).context("Failed to assemble engine")
    }

    /// Run the pipeline to completion
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        let mut engine = self.assemble()?;
        let active_sinks = engine.sink().len();
        info!(
            stages = engine.stage_count(),
            active_sinks,
            "Engine ready"
        );

        let events = source::open(self.config.input.as_deref()).with_context(|| {
            format!(
                "Failed to open input {}",
                self.config
                    .input
                    .as_ref()
                    .map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string())
            )
        })?;

        let processed = self.process(&mut engine, events);
        // close before propagating a processing error
        let closed = engine.close_stream();
        let mut stats = processed.context("Pipeline execution failed")?;
        closed.context("Failed to close stream")?;

        stats.active_sinks = active_sinks;
        stats.duration = start_time.elapsed();

        info!(
            records = stats.dispatch.records,
            duration_secs = stats.duration.as_secs_f64(),
            records_per_sec = format!("{:.1}", stats.records_per_sec()),
            "Pipeline completed"
        );
        Ok(stats)
    }

    /// Feed `events` through `engine`
    pub fn process<S, R>(
        &self,
        engine: &mut Dispatcher<S>,
        events: EventReader<R>,
    ) -> std::result::Result<PipelineStats, CliError>
    where
        S: StreamReceiver,
        R: BufRead,
    {
        let mut stats = PipelineStats::default();
        let mut published = DispatchStats::default();
        let mut record_start: Option<Instant> = None;

        for event in events {
            let event = match event {
                Ok(event) => event,
                Err(CliError::InvalidEvent { line, message }) if self.config.skip_invalid => {
                    warn!(line, error = %message, "Skipping invalid input line");
                    record_stream_error("invalid_event");
                    stats.invalid_lines += 1;
                    continue;
                }
                Err(e) => {
                    record_stream_error("input");
                    return Err(e);
                }
            };
            stats.events_read += 1;

            if matches!(event, Event::StartRecord { .. }) {
                record_start = Some(Instant::now());
            }
            engine.process(&event)?;

            if !matches!(event, Event::EndRecord) {
                continue;
            }
            if let Some(started) = record_start.take() {
                stats
                    .record_latency
                    .push(started.elapsed().as_secs_f64() * 1000.0);
            }

            let records = engine.stats().records;
            if records % PUBLISH_EVERY == 0 {
                let current = engine.stats();
                record_dispatch_stats(&published, &current);
                debug!(records, "Metrics published");
                published = current;
            }
            if self.config.max_records.is_some_and(|max| records >= max) {
                info!(records, "Reached max records limit");
                break;
            }
        }

        if engine.in_record() {
            return Err(MorphError::structural(None, "input ended inside an open record").into());
        }

        stats.dispatch = engine.stats();
        record_dispatch_stats(&published, &stats.dispatch);
        let summary = stats.summary();
        if summary.batch_latency_ms.count > 0 {
            record_batch_latency_ms(summary.batch_latency_ms.mean);
        }
        Ok(stats)
    }
}
