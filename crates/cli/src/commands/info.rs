//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::MorphDefinition;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Definition info for JSON output
#[derive(Serialize)]
struct DefinitionInfo {
    version: String,
    engine: EngineInfo,
    rules: Vec<RuleInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    maps: Vec<MapInfo>,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct EngineInfo {
    entity_separator: String,
    error_policy: String,
    max_feedback_depth: usize,
}

#[derive(Serialize)]
struct RuleInfo {
    label: String,
    stage: String,
    sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flush_with: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct MapInfo {
    name: String,
    entries: usize,
    has_default: bool,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(definition = %args.definition.display(), "Loading definition info");

    if !args.definition.exists() {
        anyhow::bail!("Definition file not found: {}", args.definition.display());
    }

    let def = config_loader::ConfigLoader::load_from_path(&args.definition)
        .with_context(|| format!("Failed to load definition from {}", args.definition.display()))?;

    let maps = if args.maps {
        let registry = config_loader::ConfigLoader::load_tables(&def, args.definition.parent())
            .context("Failed to load lookup tables")?;
        registry
            .map_names()
            .into_iter()
            .filter_map(|name| {
                registry.get_map(name).map(|table| MapInfo {
                    name: name.to_string(),
                    entries: table.len(),
                    has_default: table.get_exact(contracts::keys::DEFAULT_MAP_KEY).is_some(),
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    let info = build_definition_info(&def, args.rules, maps);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize definition info")?;
        println!("{}", json);
    } else {
        print_definition_info(&info);
    }

    Ok(())
}

fn build_definition_info(
    def: &MorphDefinition,
    with_params: bool,
    maps: Vec<MapInfo>,
) -> DefinitionInfo {
    let rules = def
        .rules
        .iter()
        .map(|rule| RuleInfo {
            label: rule.label().to_string(),
            stage: rule.stage.to_string(),
            sources: config_loader::split_alternatives(&rule.source)
                .into_iter()
                .map(str::to_string)
                .collect(),
            name: rule.name.clone(),
            flush_with: rule.flush_with.clone(),
            target: rule.target.clone(),
            params: if with_params {
                rule.params
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    DefinitionInfo {
        version: def.version.clone(),
        engine: EngineInfo {
            entity_separator: def.engine.entity_separator.clone(),
            error_policy: format!("{:?}", def.engine.error_policy),
            max_feedback_depth: def.engine.max_feedback_depth,
        },
        rules,
        maps,
        sinks: def
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
            })
            .collect(),
    }
}

fn print_definition_info(info: &DefinitionInfo) {
    println!("recmorph definition (version {})\n", info.version);

    println!("Engine");
    println!("   ├─ Entity separator: {:?}", info.engine.entity_separator);
    println!("   ├─ Error policy: {}", info.engine.error_policy);
    println!("   └─ Max feedback depth: {}", info.engine.max_feedback_depth);

    println!("\nRules ({})", info.rules.len());
    for (i, rule) in info.rules.iter().enumerate() {
        let is_last = i == info.rules.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} [{}] <- {}",
            prefix,
            rule.label,
            rule.stage,
            rule.sources.join(" | ")
        );
        if let Some(ref name) = rule.name {
            println!("   {}  name: {}", child_prefix, name);
        }
        if let Some(ref flush_with) = rule.flush_with {
            println!("   {}  flush with: {}", child_prefix, flush_with);
        }
        if let Some(ref target) = rule.target {
            println!("   {}  pipes into: {}", child_prefix, target);
        }
        for (key, value) in &rule.params {
            println!("   {}  {} = {:?}", child_prefix, key, value);
        }
    }

    if !info.maps.is_empty() {
        println!("\nMaps ({})", info.maps.len());
        for map in &info.maps {
            println!(
                "   - {}: {} entries{}",
                map.name,
                map.entries,
                if map.has_default { " (with default)" } else { "" }
            );
        }
    }

    if info.sinks.is_empty() {
        println!("\nSinks: none (NDJSON on stdout)");
    } else {
        println!("\nSinks ({})", info.sinks.len());
        for sink in &info.sinks {
            println!("   - {} ({})", sink.name, sink.sink_type);
        }
    }

    println!();
}
