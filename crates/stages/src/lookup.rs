//! LookupStage - value replacement through a named table

use contracts::{Stage, StageContext, StageError};
use tracing::trace;

/// Replaces each value by its entry in a lookup table
///
/// Values without entry (and without table default) are dropped, or rejected
/// when the stage is strict.
pub struct LookupStage {
    label: String,
    map: String,
    output: Option<String>,
    strict: bool,
}

impl LookupStage {
    pub fn new(label: impl Into<String>, map: impl Into<String>, output: Option<String>) -> Self {
        Self {
            label: label.into(),
            map: map.into(),
            output,
            strict: false,
        }
    }

    /// Fail on values without entry instead of dropping them
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl Stage for LookupStage {
    fn name(&self) -> &str {
        &self.label
    }

    fn receive(
        &mut self,
        name: &str,
        value: &str,
        ctx: &mut StageContext<'_>,
    ) -> Result<(), StageError> {
        match ctx.lookup(&self.map, value) {
            Some(mapped) => {
                let out = self.output.as_deref().unwrap_or(name);
                ctx.emit(out, mapped);
                Ok(())
            }
            None if self.strict => Err(StageError::new(format!(
                "no entry for '{value}' in map '{}'",
                self.map
            ))),
            None => {
                trace!(map = %self.map, value = %value, "Lookup miss, value dropped");
                Ok(())
            }
        }
    }
}
