//! Variable substitution

use std::collections::BTreeMap;

use contracts::{MorphDefinition, MorphError};

/// Replace every `$[name]` placeholder in rule attributes with its variable
///
/// Applies to `source`, `name`, `flush_with`, `target` and parameter values.
pub fn substitute_vars(def: &mut MorphDefinition) -> Result<(), MorphError> {
    let vars = def.vars.clone();
    for (idx, rule) in def.rules.iter_mut().enumerate() {
        let field = |attr: &str| format!("rules[{idx}].{attr}");

        rule.source = substitute(&rule.source, &vars).map_err(|m| {
            MorphError::config_validation(field("source"), m)
        })?;
        for (attr, slot) in [
            ("name", &mut rule.name),
            ("flush_with", &mut rule.flush_with),
            ("target", &mut rule.target),
        ] {
            if let Some(text) = slot.as_mut() {
                *text = substitute(text, &vars)
                    .map_err(|m| MorphError::config_validation(field(attr), m))?;
            }
        }
        for (key, value) in rule.params.iter_mut() {
            *value = substitute(value, &vars)
                .map_err(|m| MorphError::config_validation(field(&format!("params.{key}")), m))?;
        }
    }
    Ok(())
}

/// Substitute `$[name]` placeholders in one string
pub fn substitute(text: &str, vars: &BTreeMap<String, String>) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("$[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find(']')
            .ok_or_else(|| format!("unterminated variable in '{text}'"))?;
        let name = &after[..end];
        let value = vars
            .get(name)
            .ok_or_else(|| format!("undefined variable '{name}'"))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
