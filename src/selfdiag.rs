use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diff::{changed_metadata_keys, pick_state};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfDiagStep {
    pub action_description: String,
    pub changed_desired_keys: Vec<String>,
    pub changed_reported_keys: Vec<String>,
    pub changed_desired_data: Map<String, Value>,
    pub changed_reported_data: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfDiagRecord {
    pub init_state: Value,
    pub init_desc: String,
    pub prev_state: Value,
    #[serde(default)]
    pub steps: Vec<SelfDiagStep>,
}

impl SelfDiagRecord {
    pub fn start(shadow: Value, description: impl Into<String>) -> Self {
        Self {
            init_state: shadow.clone(),
            init_desc: description.into(),
            prev_state: shadow,
            steps: Vec::new(),
        }
    }

    /// Appends the difference between the previous snapshot and `shadow`.
    pub fn step(&mut self, shadow: Value, description: impl Into<String>) -> &SelfDiagStep {
        let desired = changed_metadata_keys(&self.prev_state, &shadow, "desired");
        let reported = changed_metadata_keys(&self.prev_state, &shadow, "reported");
        let step = SelfDiagStep {
            action_description: description.into(),
            changed_desired_data: pick_state(&shadow, "desired", &desired),
            changed_reported_data: pick_state(&shadow, "reported", &reported),
            changed_desired_keys: desired.into_iter().collect(),
            changed_reported_keys: reported.into_iter().collect(),
        };
        self.prev_state = shadow;
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }
}
