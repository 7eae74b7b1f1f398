//! ConcatStage - joins collected values on flush

use contracts::{Stage, StageContext, StageError, StateScope};

/// Collects values and emits `prefix + values.join(delimiter) + postfix` on flush
///
/// State lives for one record, or for one entity instance when `same_entity`
/// is set. Nothing is emitted for an empty collection.
pub struct ConcatStage {
    label: String,
    output: Option<String>,
    delimiter: String,
    prefix: String,
    postfix: String,
    same_entity: bool,
    values: Vec<String>,
    last_name: Option<String>,
}

impl ConcatStage {
    pub fn new(label: impl Into<String>, output: Option<String>) -> Self {
        Self {
            label: label.into(),
            output,
            delimiter: String::new(),
            prefix: String::new(),
            postfix: String::new(),
            same_entity: false,
            values: Vec::new(),
            last_name: None,
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = postfix.into();
        self
    }

    pub fn same_entity(mut self, same_entity: bool) -> Self {
        self.same_entity = same_entity;
        self
    }
}

impl Stage for ConcatStage {
    fn name(&self) -> &str {
        &self.label
    }

    fn receive(
        &mut self,
        name: &str,
        value: &str,
        _ctx: &mut StageContext<'_>,
    ) -> Result<(), StageError> {
        self.values.push(value.to_string());
        self.last_name = Some(name.to_string());
        Ok(())
    }

    fn flush(&mut self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        if self.values.is_empty() {
            return Ok(());
        }

        let name = self
            .output
            .clone()
            .or_else(|| self.last_name.clone())
            .unwrap_or_else(|| self.label.clone());
        let joined = format!(
            "{}{}{}",
            self.prefix,
            self.values.join(&self.delimiter),
            self.postfix
        );
        ctx.emit(name, joined);
        self.reset();
        Ok(())
    }

    fn scope(&self) -> StateScope {
        if self.same_entity {
            StateScope::Entity
        } else {
            StateScope::Record
        }
    }

    fn reset(&mut self) {
        self.values.clear();
        self.last_name = None;
    }
}
