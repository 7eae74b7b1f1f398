//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(definition = %args.definition.display(), "Loading definition");

    if !args.definition.exists() {
        return Err(CliError::definition_not_found(args.definition.display().to_string()).into());
    }

    let mut definition = config_loader::ConfigLoader::load_from_path(&args.definition)
        .with_context(|| format!("Failed to load definition from {}", args.definition.display()))?;

    if let Some(policy) = args.error_policy {
        info!(policy = ?policy, "Overriding error policy from CLI");
        definition.engine.error_policy = policy.into();
    }

    info!(
        rules = definition.rules.len(),
        maps = definition.maps.len(),
        sinks = definition.sinks.len(),
        policy = ?definition.engine.error_policy,
        "Definition loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        definition,
        base_dir: args.definition.parent().map(|p| p.to_path_buf()),
        input: args.input.clone(),
        max_records: (args.max_records > 0).then_some(args.max_records),
        skip_invalid: args.skip_invalid,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    if args.dry_run {
        let engine = pipeline.assemble()?;
        info!(
            stages = engine.stage_count(),
            "Dry run mode - definition is valid, exiting"
        );
        return Ok(());
    }

    let stats = pipeline.run()?;

    if args.stats_json {
        eprintln!(
            "{}",
            stats.to_json().context("Failed to serialize run statistics")?
        );
    } else {
        stats.print_summary();
    }

    Ok(())
}
