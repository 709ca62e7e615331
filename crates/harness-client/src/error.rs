// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client error types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Status codes reported by the workflow service.
///
/// These mirror the gRPC codes the engine uses on its wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// The call was cancelled, typically because the client-side deadline fired.
    Cancelled,
    /// The server gave up waiting before the operation could complete.
    DeadlineExceeded,
    /// The workflow, update or schedule does not exist.
    NotFound,
    /// An entity with the same identifier already exists.
    AlreadyExists,
    /// The request was malformed.
    InvalidArgument,
    /// The target is not in a state that allows the operation.
    FailedPrecondition,
    /// The request was rejected by a rate limit.
    ResourceExhausted,
    /// The service is not reachable.
    Unavailable,
    /// Unexpected server-side failure.
    Internal,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// A failure raised by workflow code (an update handler, query handler or the
/// workflow body itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApplicationFailure {
    /// Human readable failure message.
    pub message: String,
    /// Application-defined failure type.
    pub failure_type: String,
    /// Whether retrying can never succeed.
    pub non_retryable: bool,
}

impl ApplicationFailure {
    /// Create a new failure.
    pub fn new(message: impl Into<String>, failure_type: impl Into<String>, non_retryable: bool) -> Self {
        Self {
            message: message.into(),
            failure_type: failure_type.into(),
            non_retryable,
        }
    }

    /// Failure reported when a workflow receives a handler name it does not know.
    pub fn unknown_handler(kind: &str, name: &str) -> Self {
        Self::new(
            format!("{} handler not found: {}", kind, name),
            "UnknownHandler",
            true,
        )
    }
}

/// Errors that can occur when talking to the workflow service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Service returned an error status.
    #[error("service error [{code}]: {message}")]
    Service { code: StatusCode, message: String },

    /// Client-side wait for a result expired.
    #[error("timed out after {0:?} waiting for a result")]
    Timeout(Duration),

    /// An update finished with a failure.
    #[error("update {update_name} ({update_id}) failed: {source}")]
    WorkflowUpdate {
        update_id: String,
        update_name: String,
        #[source]
        source: ApplicationFailure,
    },

    /// A query handler failed.
    #[error("query {query_name} failed: {source}")]
    QueryFailed {
        query_name: String,
        #[source]
        source: ApplicationFailure,
    },

    /// The workflow execution finished with a failure.
    #[error("workflow {workflow_id} failed: {source}")]
    WorkflowFailed {
        workflow_id: String,
        #[source]
        source: ApplicationFailure,
    },

    /// The workflow execution was terminated.
    #[error("workflow {workflow_id} terminated: {reason}")]
    WorkflowTerminated { workflow_id: String, reason: String },

    /// Payload encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Build a service error.
    pub fn service(code: StatusCode, message: impl Into<String>) -> Self {
        ClientError::Service {
            code,
            message: message.into(),
        }
    }

    /// Status code of a service error, if this is one.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ClientError::Service { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for the client-side result timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    /// True when the service reported the entity as missing.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NotFound)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_display() {
        assert_eq!(StatusCode::DeadlineExceeded.to_string(), "DEADLINE_EXCEEDED");
        assert_eq!(StatusCode::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn test_service_error_display() {
        let err = ClientError::service(StatusCode::NotFound, "workflow wf-1 not found");
        let display = err.to_string();
        assert!(display.contains("NOT_FOUND"));
        assert!(display.contains("wf-1"));
        assert_eq!(err.status_code(), Some(StatusCode::NotFound));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_error_keeps_source() {
        let err = ClientError::WorkflowUpdate {
            update_id: "u-1".to_string(),
            update_name: "my_update".to_string(),
            source: ApplicationFailure::new("Dying on purpose", "my_update", true),
        };
        assert!(err.to_string().contains("my_update"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Dying on purpose"));
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_timeout_kind() {
        assert!(ClientError::Timeout(Duration::from_millis(1500)).is_timeout());
        assert!(!ClientError::service(StatusCode::DeadlineExceeded, "x").is_timeout());
    }
}
