//! DataStage - forwards values

use contracts::{Stage, StageContext, StageError};

/// Forwards every value, renamed when an output name is set
pub struct DataStage {
    label: String,
    output: Option<String>,
}

impl DataStage {
    pub fn new(label: impl Into<String>, output: Option<String>) -> Self {
        Self {
            label: label.into(),
            output,
        }
    }
}

impl Stage for DataStage {
    fn name(&self) -> &str {
        &self.label
    }

    fn receive(
        &mut self,
        name: &str,
        value: &str,
        ctx: &mut StageContext<'_>,
    ) -> Result<(), StageError> {
        let out = self.output.as_deref().unwrap_or(name);
        ctx.emit(out, value);
        Ok(())
    }
}
