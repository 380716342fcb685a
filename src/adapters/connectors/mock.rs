//! A connector that echoes its input back as the result. Registered under
//! the `mock` capability prefix for local development and integration
//! tests that exercise the actor graph without a network dependency.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::ports::{Connector, ConnectorOutcome, ConnectorStatus};

pub struct MockConnector;

#[async_trait]
impl Connector for MockConnector {
    async fn execute(&self, running_config: &Value) -> ConnectorOutcome {
        let inputs = running_config.get("inputs").cloned().unwrap_or(Value::Null);
        let params = running_config.get("content").cloned().unwrap_or(Value::Null);

        if let Some(missing) = params.get("require_missing").and_then(Value::as_array) {
            let missing_parameters: Vec<String> = missing.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
            if !missing_parameters.is_empty() {
                return ConnectorOutcome {
                    status: ConnectorStatus::NeedInput,
                    result: None,
                    error: None,
                    missing_parameters: Some(missing_parameters),
                    question: params.get("question").and_then(Value::as_str).map(str::to_string),
                };
            }
        }

        if params.get("fail").and_then(Value::as_bool).unwrap_or(false) {
            return ConnectorOutcome {
                status: ConnectorStatus::Failure,
                result: None,
                error: Some("mock connector configured to fail".to_string()),
                missing_parameters: None,
                question: None,
            };
        }

        ConnectorOutcome { status: ConnectorStatus::Success, result: Some(inputs), error: None, missing_parameters: None, question: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_inputs_back_by_default() {
        let connector = MockConnector;
        let outcome = connector.execute(&serde_json::json!({ "inputs": {"x": 1}, "content": {} })).await;
        assert_eq!(outcome.status, ConnectorStatus::Success);
        assert_eq!(outcome.result.unwrap(), serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn reports_need_input_when_configured() {
        let connector = MockConnector;
        let outcome = connector
            .execute(&serde_json::json!({ "content": { "require_missing": ["api_key"], "question": "which key?" } }))
            .await;
        assert_eq!(outcome.status, ConnectorStatus::NeedInput);
        assert_eq!(outcome.missing_parameters.unwrap(), vec!["api_key".to_string()]);
    }
}
