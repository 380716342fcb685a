//! Request/response bodies for the HTTP API, mirroring the field shapes
//! of the original trigger service's REST surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::TaskDefinition;

#[derive(Debug, Deserialize)]
pub struct TaskDefCreate {
    pub name: String,
    pub content: Value,
    pub cron_expr: Option<String>,
    pub loop_config: Option<LoopConfig>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct LoopConfig {
    pub max_rounds: u32,
    pub loop_interval_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TaskDefResponse {
    pub id: Uuid,
    pub name: String,
    pub content: Value,
    pub cron_expr: Option<String>,
    pub is_active: bool,
    pub last_triggered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<TaskDefinition> for TaskDefResponse {
    fn from(def: TaskDefinition) -> Self {
        Self {
            id: def.id,
            name: def.name,
            content: def.content,
            cron_expr: def.cron_expression,
            is_active: def.is_active,
            last_triggered_at: def.last_triggered_at,
            created_at: def.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskTriggerRequest {
    #[serde(default)]
    pub input_params: Value,
    #[serde(default = "default_trigger_type")]
    pub trigger_type: String,
    pub request_id: Option<String>,
}

fn default_trigger_type() -> String {
    "IMMEDIATE".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AdHocTaskRequest {
    pub task_name: String,
    pub task_content: Value,
    #[serde(default)]
    pub input_params: Value,
    pub loop_config: Option<LoopConfig>,
    #[serde(default = "default_true")]
    pub is_temporary: bool,
    #[serde(default = "default_trigger_type")]
    pub schedule_type: String,
    pub schedule_config: Option<Value>,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdHocTaskResponse {
    pub trace_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TaskControlResponse {
    pub success: bool,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct TaskModifyRequest {
    pub input_params: Option<Value>,
    pub schedule_config: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RequestIdLookupResponse {
    pub success: bool,
    pub trace_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
