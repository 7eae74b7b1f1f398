//! MorphDefinition - declarative transformation definition
//!
//! Root configuration object. Loaded by `config_loader`, assembled into a
//! dispatcher by the CLI.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use validator::Validate;

use crate::keys::DEFAULT_SEPARATOR;

/// Transformation definition (root configuration)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MorphDefinition {
    /// Configuration version
    #[serde(default = "default_version")]
    #[validate(length(min = 1))]
    pub version: String,

    /// Engine settings
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineConfig,

    /// Variables substituted into `$[name]` placeholders
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Named lookup tables
    #[serde(default)]
    pub maps: BTreeMap<String, MapConfig>,

    /// Rules, registered in declaration order
    #[serde(default)]
    #[validate(nested)]
    pub rules: Vec<RuleConfig>,

    /// Output sinks
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Separator joining entity names into paths
    #[serde(default = "default_separator")]
    #[validate(length(min = 1))]
    pub entity_separator: String,

    /// Reaction to failing stages
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Maximum nesting of feedback and pipe chains
    #[serde(default = "default_max_feedback_depth")]
    #[validate(range(min = 1, max = 4096))]
    pub max_feedback_depth: usize,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_max_feedback_depth() -> usize {
    32
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entity_separator: default_separator(),
            error_policy: ErrorPolicy::default(),
            max_feedback_depth: default_max_feedback_depth(),
        }
    }
}

/// Reaction to a stage returning an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Abort the run with the error
    #[default]
    Fail,
    /// Log the error and continue with the remaining receivers
    Log,
}

/// One rule: a stage bound to one or more source patterns
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RuleConfig {
    /// Identifier, referenced by `target` of other rules
    #[serde(default)]
    pub id: Option<String>,

    /// Source pattern, alternatives separated by `|`
    #[validate(length(min = 1))]
    pub source: String,

    /// Stage kind
    #[serde(default)]
    pub stage: StageKind,

    /// Output name (defaults to the received name)
    #[serde(default)]
    pub name: Option<String>,

    /// Flush trigger keys, alternatives separated by `|`; `record` binds to record end
    #[serde(default)]
    pub flush_with: Option<String>,

    /// Id of a rule receiving this rule's literal output directly
    #[serde(default)]
    pub target: Option<String>,

    /// Stage specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl RuleConfig {
    /// Label for logs and errors: id if present, else the source
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.source)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Built-in stage kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Forward the value, optionally renamed
    #[default]
    Data,
    /// Replace the value through a lookup table
    Lookup,
    /// Change letter case
    Case,
    /// Join collected values on flush
    Concat,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageKind::Data => "data",
            StageKind::Lookup => "lookup",
            StageKind::Case => "case",
            StageKind::Concat => "concat",
        };
        f.write_str(name)
    }
}

/// Lookup table definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfig {
    /// Inline entries
    #[serde(default)]
    pub entries: BTreeMap<String, String>,

    /// Value returned for absent keys
    #[serde(default)]
    pub default: Option<String>,

    /// Tab separated `key<TAB>value` file, relative to the definition file
    #[serde(default)]
    pub file: Option<String>,

    /// Column separator of `file`
    #[serde(default = "default_map_separator")]
    pub separator: String,
}

fn default_map_separator() -> String {
    "\t".to_string()
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Sink parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log through tracing
    Log,
    /// NDJSON events written to a file (`path` param)
    File,
    /// NDJSON events written to stdout
    Stdout,
}
