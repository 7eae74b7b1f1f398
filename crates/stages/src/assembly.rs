//! Engine assembly from a definition
//!
//! Every rule becomes one stage. Each alternative of `source` is a receive
//! binding, each alternative of `flush_with` a flush binding, and `target`
//! pipes the literal output of a rule into another rule.

use std::collections::HashMap;

use contracts::keys::split_alternatives;
use contracts::{MapRegistry, MorphDefinition, MorphError, StageId, StreamReceiver};
use dispatcher::{Dispatcher, DispatcherBuilder};
use tracing::{info, instrument};

use crate::build_stage;

/// Build the dispatcher described by `def`, writing to `sink`
#[instrument(
    name = "stages_assemble",
    skip_all,
    fields(rules = def.rules.len(), maps = maps.map_names().len())
)]
pub fn assemble<S: StreamReceiver>(
    def: &MorphDefinition,
    maps: MapRegistry,
    sink: S,
) -> Result<Dispatcher<S>, MorphError> {
    let mut builder = DispatcherBuilder::new();
    builder
        .entity_separator(&def.engine.entity_separator)?
        .error_policy(def.engine.error_policy)
        .max_feedback_depth(def.engine.max_feedback_depth)
        .maps(maps);

    let mut by_id: HashMap<&str, StageId> = HashMap::new();
    let mut ids = Vec::with_capacity(def.rules.len());

    for rule in &def.rules {
        let id = builder.add_boxed_stage(build_stage(rule)?);
        if let Some(rule_id) = rule.id.as_deref() {
            by_id.insert(rule_id, id);
        }
        for key in split_alternatives(&rule.source) {
            builder.register(key, id)?;
        }
        if let Some(flush_with) = &rule.flush_with {
            for key in split_alternatives(flush_with) {
                builder.register_flush(key, id)?;
            }
        }
        ids.push(id);
    }

    for (rule, &from) in def.rules.iter().zip(&ids) {
        let Some(target) = rule.target.as_deref() else {
            continue;
        };
        let to = by_id.get(target).copied().ok_or_else(|| {
            MorphError::config_validation(
                format!("rules[{}].target", rule.label()),
                format!("target rule '{target}' not found"),
            )
        })?;
        builder.connect(from, to)?;
    }

    info!(
        stages = builder.stage_count(),
        policy = ?def.engine.error_policy,
        "Engine assembled"
    );
    Ok(builder.build(sink))
}
