//! Maps `HttpError`/`DomainError` onto HTTP status codes at the edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::domain::error::{DatabaseError, DomainError, HttpError};

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Domain(domain_err) => domain_status(domain_err),
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

fn domain_status(err: &DomainError) -> (StatusCode, String) {
    match err {
        DomainError::DefinitionNotFound(id) => (StatusCode::NOT_FOUND, format!("task definition not found: {id}")),
        DomainError::RunNotFound(id) => (StatusCode::NOT_FOUND, format!("scheduled run not found: {id}")),
        DomainError::InstanceNotFound(id) => (StatusCode::NOT_FOUND, format!("task instance not found: {id}")),
        DomainError::Validation(msg) | DomainError::MissingParameter(msg) | DomainError::UnknownCapability(msg) => {
            (StatusCode::BAD_REQUEST, msg.clone())
        }
        DomainError::InvalidTransition { from, to } => {
            (StatusCode::CONFLICT, format!("cannot transition from {from} to {to}"))
        }
        DomainError::Database(DatabaseError::NotFound(id)) => (StatusCode::NOT_FOUND, format!("not found: {id}")),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}
