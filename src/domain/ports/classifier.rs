//! Port for the pluggable operation classifier an Agent Actor consults
//! before dispatching an incoming task (`_classify_task_operation` in the
//! original). Grounded fallback: NEW_TASK at confidence 0.5 when no
//! domain-specific classifier is wired in.

use async_trait::async_trait;
use serde_json::Value;

/// The category of operation an incoming task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOperation {
    NewTask,
    ExecuteTask,
    ResumeTask,
    CancelTask,
    LoopTask,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub operation: TaskOperation,
    pub confidence: f64,
}

#[async_trait]
pub trait OperationClassifier: Send + Sync {
    async fn classify(&self, content: &Value) -> Classification;
}

/// Default classifier: reads an explicit `operation` hint out of the task
/// content when present, otherwise falls back to NEW_TASK at confidence
/// 0.5, matching the original's fallback branch when no richer classifier
/// (`ITaskOperationCapability`) is configured.
pub struct RuleBasedClassifier;

#[async_trait]
impl OperationClassifier for RuleBasedClassifier {
    async fn classify(&self, content: &Value) -> Classification {
        let hint = content.get("operation").and_then(Value::as_str).map(str::to_uppercase);
        match hint.as_deref() {
            Some("RESUME_TASK" | "RESUME") => Classification { operation: TaskOperation::ResumeTask, confidence: 0.9 },
            Some("CANCEL_TASK" | "CANCEL") => Classification { operation: TaskOperation::CancelTask, confidence: 0.9 },
            Some("LOOP_TASK" | "LOOP") => Classification { operation: TaskOperation::LoopTask, confidence: 0.9 },
            Some("EXECUTE_TASK" | "EXECUTE") => Classification { operation: TaskOperation::ExecuteTask, confidence: 0.9 },
            _ => Classification { operation: TaskOperation::NewTask, confidence: 0.5 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn falls_back_to_new_task_without_a_hint() {
        let classification = RuleBasedClassifier.classify(&json!({})).await;
        assert_eq!(classification.operation, TaskOperation::NewTask);
    }

    #[tokio::test]
    async fn reads_explicit_operation_hints() {
        let cancel = RuleBasedClassifier.classify(&json!({ "operation": "cancel" })).await;
        assert_eq!(cancel.operation, TaskOperation::CancelTask);

        let loop_op = RuleBasedClassifier.classify(&json!({ "operation": "LOOP_TASK" })).await;
        assert_eq!(loop_op.operation, TaskOperation::LoopTask);

        let resume = RuleBasedClassifier.classify(&json!({ "operation": "resume" })).await;
        assert_eq!(resume.operation, TaskOperation::ResumeTask);
    }
}
