// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness error types.

use std::time::Duration;

use harness_client::ClientError;
use thiserror::Error;

/// Result type using HarnessError.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Setup-time errors raised by the harness itself.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Two features claim the same task queue
    #[error("task queue {task_queue} is already claimed by another feature")]
    DuplicateTaskQueue { task_queue: String },

    /// A stub descriptor names a workflow the feature does not define
    #[error("feature {task_queue} does not define workflow type {workflow_type}")]
    UnknownWorkflowType {
        task_queue: String,
        workflow_type: String,
    },

    /// A check parameter has no resolution rule
    #[error("check {check}: cannot resolve parameter {param_index} of type {declared_type}")]
    UnresolvableParameter {
        check: String,
        param_index: usize,
        declared_type: String,
    },

    /// Engine call made while preparing a check failed
    #[error("engine error: {0}")]
    Client(#[from] ClientError),

    /// Configuration error (invalid environment variable)
    #[error("configuration error: {0}")]
    Config(String),
}

/// Why a single check did not pass.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Parameters could not be prepared; the check body never ran.
    #[error("setup failed: {0}")]
    Setup(#[source] HarnessError),

    /// The check body returned an error.
    #[error("{0:#}")]
    Failed(anyhow::Error),

    /// The check body panicked.
    #[error("check panicked: {0}")]
    Panicked(String),

    /// The check body did not finish in time.
    #[error("check did not finish within {0:?}")]
    TimedOut(Duration),

    /// Releasing the check's workflows or schedules failed. `cause` holds the
    /// check's own failure, if it had one.
    #[error("{}", teardown_message(.cause, .errors))]
    Teardown {
        errors: Vec<ClientError>,
        cause: Option<Box<CheckError>>,
    },
}

impl CheckError {
    /// True for failures raised before the check body ran.
    pub fn is_setup(&self) -> bool {
        match self {
            CheckError::Setup(_) => true,
            CheckError::Teardown { cause, .. } => cause.as_deref().is_some_and(CheckError::is_setup),
            _ => false,
        }
    }
}

fn teardown_message(cause: &Option<Box<CheckError>>, errors: &[ClientError]) -> String {
    let errors = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    match cause {
        Some(cause) => format!("{}; teardown failed: {}", cause, errors),
        None => format!("teardown failed: {}", errors),
    }
}

/// A failed check, recorded against its identity.
#[derive(Debug, Error)]
#[error("{check_id}: {cause}")]
pub struct CheckFailure {
    pub check_id: String,
    #[source]
    pub cause: CheckError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_client::StatusCode;

    #[test]
    fn test_unresolvable_parameter_display() {
        let err = HarnessError::UnresolvableParameter {
            check: "FeatureChecker::check".to_string(),
            param_index: 2,
            declared_type: "String".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("FeatureChecker::check"));
        assert!(display.contains("parameter 2"));
        assert!(display.contains("String"));
    }

    #[test]
    fn test_client_error_converts() {
        let err: HarnessError =
            ClientError::service(StatusCode::AlreadyExists, "wf-1 is already running").into();
        assert!(matches!(err, HarnessError::Client(_)));
        assert!(err.to_string().contains("ALREADY_EXISTS"));
    }

    #[test]
    fn test_check_failure_display() {
        let failure = CheckFailure {
            check_id: "FeatureChecker::check".to_string(),
            cause: CheckError::Failed(anyhow::anyhow!("expected 2, got 1")),
        };
        assert_eq!(failure.to_string(), "FeatureChecker::check: expected 2, got 1");
        assert!(!failure.cause.is_setup());

        let setup = CheckError::Setup(HarnessError::Config("bad".to_string()));
        assert!(setup.is_setup());
    }

    #[test]
    fn test_teardown_display_keeps_cause() {
        let alone = CheckError::Teardown {
            errors: vec![ClientError::service(StatusCode::Unavailable, "engine down")],
            cause: None,
        };
        assert_eq!(
            alone.to_string(),
            "teardown failed: service error [UNAVAILABLE]: engine down"
        );
        assert!(!alone.is_setup());

        let after_setup = CheckError::Teardown {
            errors: vec![ClientError::service(StatusCode::Unavailable, "engine down")],
            cause: Some(Box::new(CheckError::Setup(HarnessError::Config("bad".to_string())))),
        };
        assert!(after_setup.is_setup());
        assert!(after_setup.to_string().starts_with("setup failed: configuration error: bad; teardown failed"));
    }
}
