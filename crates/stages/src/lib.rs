//! # Stages
//!
//! Built-in pipeline stages.
//!
//! Each stage implements [`contracts::Stage`]; [`build_stage`] creates one from
//! a rule of the definition and [`assemble`] wires a whole definition into a
//! [`dispatcher::Dispatcher`].

mod assembly;
mod case;
mod concat;
mod data;
mod factory;
mod lookup;

pub use assembly::assemble;
pub use case::{CaseStage, LetterCase};
pub use concat::ConcatStage;
pub use data::DataStage;
pub use factory::build_stage;
pub use lookup::LookupStage;
