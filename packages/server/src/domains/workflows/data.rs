//! Input and read DTOs for the workflow API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domains::workflows::models::{
    FieldMapping, StepConnection, StepKind, StepRun, Workflow, WorkflowRun, WorkflowStep,
};

/// A step as submitted by the client.
///
/// `key` is a client-chosen handle that connections and mappings refer to;
/// the server assigns real step ids on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInput {
    pub key: String,
    pub kind: StepKind,
    pub step_type: String,
    pub name: String,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub position: i32,
}

impl StepInput {
    /// Config with absent normalized to an empty object
    pub fn config_or_empty(&self) -> Value {
        self.config.clone().unwrap_or_else(|| Value::Object(Default::default()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInput {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub condition: Option<Value>,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingInput {
    /// Key of the action step this mapping feeds
    pub step: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowGraphInput {
    #[serde(default)]
    pub steps: Vec<StepInput>,
    #[serde(default)]
    pub connections: Vec<ConnectionInput>,
    #[serde(default)]
    pub mappings: Vec<MappingInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkflowInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub graph: WorkflowGraphInput,
}

/// Full replacement for PUT. Same shape as create; the stored graph is
/// swapped wholesale and the version bumped.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateWorkflowInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub graph: WorkflowGraphInput,
}

/// A workflow with its full graph, as returned by the detail endpoint
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDetail {
    pub workflow: Workflow,
    pub steps: Vec<WorkflowStep>,
    pub connections: Vec<StepConnection>,
    pub mappings: Vec<FieldMapping>,
}

impl WorkflowDetail {
    /// View the stored graph in the input shape so it can be re-validated
    /// (step ids become the keys).
    pub fn as_graph_input(&self) -> WorkflowGraphInput {
        WorkflowGraphInput {
            steps: self
                .steps
                .iter()
                .map(|s| StepInput {
                    key: s.id.to_string(),
                    kind: s.kind,
                    step_type: s.step_type.clone(),
                    name: s.name.clone(),
                    config: Some(s.config.clone()),
                    position: s.position,
                })
                .collect(),
            connections: self
                .connections
                .iter()
                .map(|c| ConnectionInput {
                    from: c.from_step_id.to_string(),
                    to: c.to_step_id.to_string(),
                    condition: c.condition.clone(),
                    position: c.position,
                })
                .collect(),
            mappings: self
                .mappings
                .iter()
                .map(|m| MappingInput {
                    step: m.step_id.to_string(),
                    source: m.source.clone(),
                    target: m.target.clone(),
                    required: m.required,
                })
                .collect(),
        }
    }

    /// The single trigger step of a validated graph
    pub fn trigger_step(&self) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.kind == StepKind::Trigger)
    }
}

/// A run with its per-step records
#[derive(Debug, Clone, Serialize)]
pub struct RunDetail {
    pub run: WorkflowRun,
    pub steps: Vec<StepRun>,
}
