//! 配置校验模块
//!
//! 校验规则：
//! - source / flush_with 每个候选项非空且为合法 pattern
//! - rule id 唯一, target 指向已存在的 rule
//! - lookup rule 引用的 map 存在
//! - fallback 关键字至多一种
//! - sink 名称非空且唯一
//! - 字段约束 (validator derive)

use std::collections::HashSet;

use contracts::keys::{RECORD_FLUSH, is_fallback_key, split_alternatives};
use contracts::{MorphDefinition, MorphError, Pattern, StageKind};
use validator::Validate;

/// 校验 MorphDefinition 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(def: &MorphDefinition) -> Result<(), MorphError> {
    validate_rule_ids(def)?;
    validate_rule_keys(def)?;
    validate_fallback(def)?;
    validate_rule_references(def)?;
    validate_sinks(def)?;
    validate_fields(def)?;
    Ok(())
}

/// 非致命问题，用于 `validate` 命令报告
pub fn collect_warnings(def: &MorphDefinition) -> Vec<String> {
    let mut warnings = Vec::new();

    for (idx, rule) in def.rules.iter().enumerate() {
        if rule.stage == StageKind::Concat && rule.flush_with.is_none() {
            warnings.push(format!(
                "rules[{idx}] ({}): concat stage without flush_with never emits",
                rule.label()
            ));
        }
    }

    let used: HashSet<&str> = def
        .rules
        .iter()
        .filter(|r| r.stage == StageKind::Lookup)
        .filter_map(|r| r.param("map"))
        .collect();
    for name in def.maps.keys() {
        if !used.contains(name.as_str()) {
            warnings.push(format!("maps.{name}: not used by any lookup rule"));
        }
    }

    if def.sinks.is_empty() {
        warnings.push("no sinks configured, output goes to stdout".to_string());
    }
    warnings
}

/// 字段约束
fn validate_fields(def: &MorphDefinition) -> Result<(), MorphError> {
    def.validate()
        .map_err(|e| MorphError::config_validation("definition", e.to_string()))
}

/// 校验 rule id 唯一性
fn validate_rule_ids(def: &MorphDefinition) -> Result<(), MorphError> {
    let mut seen = HashSet::new();
    for rule in &def.rules {
        if let Some(id) = &rule.id {
            if id.is_empty() {
                return Err(MorphError::config_validation(
                    format!("rules[source={}].id", rule.source),
                    "rule id cannot be empty",
                ));
            }
            if !seen.insert(id) {
                return Err(MorphError::config_validation(
                    format!("rules[id={id}]"),
                    "duplicate rule id",
                ));
            }
        }
    }
    Ok(())
}

/// 校验 source / flush_with 候选项
fn validate_rule_keys(def: &MorphDefinition) -> Result<(), MorphError> {
    for (idx, rule) in def.rules.iter().enumerate() {
        for key in split_alternatives(&rule.source) {
            check_key(idx, "source", key)?;
        }
        if let Some(flush_with) = &rule.flush_with {
            for key in split_alternatives(flush_with) {
                if key == RECORD_FLUSH {
                    continue;
                }
                check_key(idx, "flush_with", key)?;
            }
        }
    }
    Ok(())
}

fn check_key(idx: usize, attr: &str, key: &str) -> Result<(), MorphError> {
    if key.is_empty() {
        return Err(MorphError::config_validation(
            format!("rules[{idx}].{attr}"),
            "empty alternative",
        ));
    }
    if is_fallback_key(key) {
        return Ok(());
    }
    Pattern::parse(key)
        .map(|_| ())
        .map_err(|e| MorphError::config_validation(format!("rules[{idx}].{attr}"), e.to_string()))
}

/// 校验 fallback 关键字至多一种
fn validate_fallback(def: &MorphDefinition) -> Result<(), MorphError> {
    let keys: HashSet<&str> = def
        .rules
        .iter()
        .flat_map(|r| split_alternatives(&r.source))
        .filter(|k| is_fallback_key(k))
        .collect();

    if keys.len() > 1 {
        let mut keys: Vec<&str> = keys.into_iter().collect();
        keys.sort_unstable();
        return Err(MorphError::config_validation(
            "rules.source",
            format!("only one fallback keyword is allowed, found {}", keys.join(", ")),
        ));
    }
    Ok(())
}

/// 校验 target 与 map 引用
fn validate_rule_references(def: &MorphDefinition) -> Result<(), MorphError> {
    let ids: HashSet<&str> = def.rules.iter().filter_map(|r| r.id.as_deref()).collect();

    for (idx, rule) in def.rules.iter().enumerate() {
        if let Some(target) = &rule.target {
            if !ids.contains(target.as_str()) {
                return Err(MorphError::config_validation(
                    format!("rules[{idx}].target"),
                    format!("target rule '{target}' not found"),
                ));
            }
            if rule.id.as_deref() == Some(target.as_str()) {
                return Err(MorphError::config_validation(
                    format!("rules[{idx}].target"),
                    "rule cannot target itself",
                ));
            }
        }

        if rule.stage == StageKind::Lookup {
            match rule.param("map") {
                Some(map) if def.maps.contains_key(map) => {}
                Some(map) => {
                    return Err(MorphError::config_validation(
                        format!("rules[{idx}].params.map"),
                        format!("map '{map}' not found"),
                    ));
                }
                None => {
                    return Err(MorphError::config_validation(
                        format!("rules[{idx}].params.map"),
                        "lookup rule requires a map",
                    ));
                }
            }
        }
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(def: &MorphDefinition) -> Result<(), MorphError> {
    let mut seen = HashSet::new();
    for (idx, sink) in def.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(MorphError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(MorphError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}
