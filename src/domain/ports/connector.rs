//! Port for a capability connector: the thing an Execution Actor
//! ultimately delegates to once it has matched a task's `capability`
//! string against the registry (§9's "registry from string to function
//! object, constructed at startup").

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::models::ExecutionResult;

/// Outcome categories a connector can report, matching the
/// SUCCESS/FAILURE/ERROR/NEED_INPUT vocabulary in spec.md §4.11.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorStatus {
    Success,
    Failure,
    Error,
    NeedInput,
}

#[derive(Debug, Clone)]
pub struct ConnectorOutcome {
    pub status: ConnectorStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub missing_parameters: Option<Vec<String>>,
    pub question: Option<String>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Run the capability with the given running config (already merged
    /// `api_key`/`inputs`/`agent_id`/`content`/etc. per the execution actor).
    async fn execute(&self, running_config: &Value) -> ConnectorOutcome;
}

impl ConnectorOutcome {
    #[must_use]
    pub fn into_execution_result(self, task_id: uuid::Uuid) -> ExecutionResult {
        let status = match self.status {
            ConnectorStatus::Success => "SUCCESS",
            ConnectorStatus::Failure => "FAILED",
            ConnectorStatus::Error => "ERROR",
            ConnectorStatus::NeedInput => "NEED_INPUT",
        };
        ExecutionResult {
            task_id,
            status: status.to_string(),
            result: self.result,
            error: self.error,
            missing_parameters: self.missing_parameters,
            question: self.question,
        }
    }
}
