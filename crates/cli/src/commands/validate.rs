//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    definition_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<DefinitionSummary>,
}

#[derive(Serialize)]
struct DefinitionSummary {
    version: String,
    rule_count: usize,
    pattern_count: usize,
    map_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(definition = %args.definition.display(), "Validating definition");

    let result = validate_definition(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Definition validation failed")
    }
}

fn validate_definition(args: &ValidateArgs) -> ValidationResult {
    let definition_path = args.definition.display().to_string();

    if !args.definition.exists() {
        return ValidationResult {
            valid: false,
            definition_path,
            error: Some(format!("File not found: {}", args.definition.display())),
            warnings: None,
            summary: None,
        };
    }

    let loaded = config_loader::ConfigLoader::load_from_path(&args.definition).and_then(|def| {
        // map files are part of validity
        config_loader::ConfigLoader::load_tables(&def, args.definition.parent())?;
        Ok(def)
    });

    match loaded {
        Ok(def) => {
            let warnings = config_loader::collect_warnings(&def);
            let pattern_count = def
                .rules
                .iter()
                .map(|r| config_loader::split_alternatives(&r.source).len())
                .sum();

            ValidationResult {
                valid: true,
                definition_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(DefinitionSummary {
                    version: def.version.clone(),
                    rule_count: def.rules.len(),
                    pattern_count,
                    map_count: def.maps.len(),
                    sink_count: def.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            definition_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Definition is valid: {}", result.definition_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Rules: {}", summary.rule_count);
            println!("  Patterns: {}", summary.pattern_count);
            println!("  Maps: {}", summary.map_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Definition is invalid: {}", result.definition_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
