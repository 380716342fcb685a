//! HTTP capability connector. Grounded on
//! `original_source/tasks/capabilities/excution/connect/http_connector.py`:
//! `url` is a required config parameter (missing it is a hard failure, not
//! NEED_INPUT), method defaults to GET, and the body defaults to the
//! task's input params when none is set explicitly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::domain::ports::{Connector, ConnectorOutcome, ConnectorStatus};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct HttpConnector {
    client: Client,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpConnector {
    #[must_use]
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn execute(&self, running_config: &Value) -> ConnectorOutcome {
        let inputs = running_config.get("inputs").cloned().unwrap_or(Value::Null);
        let params = running_config.get("content").cloned().unwrap_or(Value::Null);

        let Some(url) = params.get("url").and_then(Value::as_str) else {
            return ConnectorOutcome {
                status: ConnectorStatus::Error,
                result: None,
                error: Some("Missing required config parameters: url".to_string()),
                missing_parameters: None,
                question: None,
            };
        };

        let method = params.get("method").and_then(Value::as_str).unwrap_or("GET").to_uppercase();
        let timeout_secs = params.get("timeout").and_then(Value::as_u64).unwrap_or(DEFAULT_TIMEOUT_SECS);
        let body = params.get("data").cloned().unwrap_or(inputs);

        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url).json(&body),
            "PUT" => self.client.put(url).json(&body),
            "DELETE" => self.client.delete(url),
            other => {
                return ConnectorOutcome {
                    status: ConnectorStatus::Error,
                    result: None,
                    error: Some(format!("Unsupported HTTP method: {other}")),
                    missing_parameters: None,
                    question: None,
                };
            }
        };
        request = request.timeout(Duration::from_secs(timeout_secs));

        if let Some(headers) = params.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key.as_str(), value);
                }
            }
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => match response.json::<Value>().await {
                Ok(body) => ConnectorOutcome { status: ConnectorStatus::Success, result: Some(body), error: None, missing_parameters: None, question: None },
                Err(err) => {
                    warn!(error = %err, "http connector response was not valid JSON");
                    ConnectorOutcome { status: ConnectorStatus::Success, result: Some(Value::Null), error: None, missing_parameters: None, question: None }
                }
            },
            Ok(response) => {
                let status = response.status();
                let details = response.text().await.unwrap_or_default();
                ConnectorOutcome {
                    status: ConnectorStatus::Failure,
                    result: None,
                    error: Some(format!("HTTP request failed with status {status}: {details}")),
                    missing_parameters: None,
                    question: None,
                }
            }
            Err(err) => ConnectorOutcome {
                status: ConnectorStatus::Error,
                result: None,
                error: Some(err.to_string()),
                missing_parameters: None,
                question: None,
            },
        }
    }
}
