//! CaseStage - letter case conversion

use contracts::{Stage, StageContext, StageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterCase {
    Upper,
    Lower,
}

impl std::str::FromStr for LetterCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upper" => Ok(LetterCase::Upper),
            "lower" => Ok(LetterCase::Lower),
            other => Err(format!("unknown case '{other}', expected 'upper' or 'lower'")),
        }
    }
}

pub struct CaseStage {
    label: String,
    to: LetterCase,
    output: Option<String>,
}

impl CaseStage {
    pub fn new(label: impl Into<String>, to: LetterCase, output: Option<String>) -> Self {
        Self {
            label: label.into(),
            to,
            output,
        }
    }
}

impl Stage for CaseStage {
    fn name(&self) -> &str {
        &self.label
    }

    fn receive(
        &mut self,
        name: &str,
        value: &str,
        ctx: &mut StageContext<'_>,
    ) -> Result<(), StageError> {
        let converted = match self.to {
            LetterCase::Upper => value.to_uppercase(),
            LetterCase::Lower => value.to_lowercase(),
        };
        ctx.emit(self.output.as_deref().unwrap_or(name), converted);
        Ok(())
    }
}
