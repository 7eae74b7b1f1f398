//! Stage factory

use contracts::{MorphError, RuleConfig, Stage, StageKind};
use tracing::{debug, instrument};

use crate::{CaseStage, ConcatStage, DataStage, LetterCase, LookupStage};

/// Create the stage of one rule
#[instrument(
    name = "stages_build_stage",
    skip(rule),
    fields(rule = %rule.label(), stage = %rule.stage)
)]
pub fn build_stage(rule: &RuleConfig) -> Result<Box<dyn Stage>, MorphError> {
    let label = rule.label().to_string();
    let output = rule.name.clone();

    let stage: Box<dyn Stage> = match rule.stage {
        StageKind::Data => Box::new(DataStage::new(label, output)),
        StageKind::Lookup => {
            let map = required_param(rule, "map")?;
            let strict = flag_param(rule, "strict")?;
            Box::new(LookupStage::new(label, map, output).strict(strict))
        }
        StageKind::Case => {
            let to = required_param(rule, "to")?
                .parse::<LetterCase>()
                .map_err(|e| MorphError::config_validation(field(rule, "to"), e))?;
            Box::new(CaseStage::new(label, to, output))
        }
        StageKind::Concat => Box::new(
            ConcatStage::new(label, output)
                .delimiter(rule.param("delimiter").unwrap_or_default())
                .prefix(rule.param("prefix").unwrap_or_default())
                .postfix(rule.param("postfix").unwrap_or_default())
                .same_entity(flag_param(rule, "same_entity")?),
        ),
    };

    debug!("Stage created");
    Ok(stage)
}

fn field(rule: &RuleConfig, param: &str) -> String {
    format!("rules[{}].params.{param}", rule.label())
}

fn required_param<'a>(rule: &'a RuleConfig, param: &str) -> Result<&'a str, MorphError> {
    rule.param(param)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            MorphError::config_validation(
                field(rule, param),
                format!("required by '{}' stage", rule.stage),
            )
        })
}

fn flag_param(rule: &RuleConfig, param: &str) -> Result<bool, MorphError> {
    match rule.param(param) {
        None => Ok(false),
        Some(v) => v.parse::<bool>().map_err(|_| {
            MorphError::config_validation(
                field(rule, param),
                format!("expected 'true' or 'false', got '{v}'"),
            )
        }),
    }
}
