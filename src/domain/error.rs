//! Consolidated domain error taxonomy.
//!
//! One error enum per concern, each with `is_transient`/`is_permanent`
//! classifiers so callers (dispatcher, aggregator) can decide whether a
//! failure is retryable without matching on variants themselves.

use uuid::Uuid;

/// Result alias used throughout the domain and service layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors raised by business-rule validation and orchestration logic.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("task definition not found: {0}")]
    DefinitionNotFound(Uuid),

    #[error("scheduled run not found: {0}")]
    RunNotFound(Uuid),

    #[error("task instance not found: {0}")]
    InstanceNotFound(Uuid),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("child task failed: {0}")]
    ChildFailed(String),

    #[error("task paused, awaiting input: {0}")]
    NeedInput(String),

    #[error("task cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl DomainError {
    /// Whether a retry with backoff is likely to succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Timeout(_) | Self::ChildFailed(_)
        )
    }

    /// Whether retrying would be pointless (a programming/config error).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnknownCapability(_)
                | Self::MissingParameter(_)
                | Self::InvalidTransition { .. }
                | Self::Fatal(_)
        )
    }
}

/// Errors raised by store/repository adapters.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("row not found: {0}")]
    NotFound(Uuid),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl DatabaseError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::QueryFailed(_) | Self::Connection(_))
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::SerializationError(_) | Self::ConstraintViolation(_) | Self::Migration(_)
        )
    }
}

/// Errors raised by the HTTP API layer, mapped to status codes at the edge.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors raised by configuration loading/validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid scan_interval_secs: {0}. Must be at least 1")]
    InvalidScanInterval(u64),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error("invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("invalid default_registry_ttl_secs: {0}. Must be at least 1")]
    InvalidRegistryTtl(u64),
}
