// src/models/action.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::schema::{Schema, render};

/// A registered action: what gets executed, by which runner, with which
/// parameter defaults.
///
/// Actions are authored elsewhere; the tracker only ever reads them (as the
/// snapshot embedded in an [`ActionExecution`](super::ActionExecution)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Whether the action is enabled in the system.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Paths to action content, relative to the repository base.
    #[serde(default)]
    pub artifact_paths: Vec<String>,

    pub entry_point: String,

    /// Runner (execution environment) used to invoke the action.
    pub runner_type: String,

    /// Parameter name -> declared default.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl Action {
    /// New enabled action with no artifacts and no parameters.
    pub fn new(
        id: impl Into<String>,
        entry_point: impl Into<String>,
        runner_type: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            enabled: true,
            artifact_paths: Vec::new(),
            entry_point: entry_point.into(),
            runner_type: runner_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn uri(&self) -> String {
        format!("action:{}", self.id)
    }
}

impl Schema for Action {
    const NAME: &'static str = "Action";

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", json!(self.id)),
            ("name", json!(self.name)),
            ("enabled", json!(self.enabled)),
            ("artifact_paths", json!(self.artifact_paths)),
            ("entry_point", json!(self.entry_point)),
            ("runner_type", json!(self.runner_type)),
            ("parameters", json!(self.parameters)),
            ("uri", json!(self.uri())),
        ]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, f)
    }
}
