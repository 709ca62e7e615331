// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness configuration.

use std::env;
use std::time::Duration;

use harness_client::{ClientOptions, EngineConfig};

use crate::error::{HarnessError, Result};

/// Harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Namespace for all clients (default: "default")
    pub namespace: String,
    /// Task-queue prefixes to run; empty runs every feature
    pub features: Vec<String>,
    /// Hard bound per check invocation (default: 60s)
    pub check_timeout: Duration,
    /// Client-side deadline per engine call (default: 10s)
    pub rpc_timeout: Duration,
    /// Default bound for result waits (default: 30s)
    pub result_timeout: Duration,
    /// Embedded engine's deadline for calls that need a worker (default: 10s)
    pub server_deadline: Duration,
    /// Embedded engine's schedule trigger rate limit (default: 1s)
    pub trigger_cooldown: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            features: Vec::new(),
            check_timeout: Duration::from_secs(60),
            rpc_timeout: Duration::from_secs(10),
            result_timeout: Duration::from_secs(30),
            server_deadline: Duration::from_secs(10),
            trigger_cooldown: Duration::from_secs(1),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `HARNESS_NAMESPACE` - Namespace (default: "default")
    /// - `HARNESS_FEATURES` - Comma-separated task-queue prefixes (default: all)
    /// - `HARNESS_CHECK_TIMEOUT_MS` - Per-check bound (default: 60000)
    /// - `HARNESS_RPC_TIMEOUT_MS` - Client call deadline (default: 10000)
    /// - `HARNESS_RESULT_TIMEOUT_MS` - Result wait bound (default: 30000)
    /// - `HARNESS_SERVER_DEADLINE_MS` - Engine deadline (default: 10000)
    /// - `HARNESS_TRIGGER_COOLDOWN_MS` - Schedule trigger rate limit (default: 1000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let millis = |name: &str, default: Duration| -> Result<Duration> {
            match lookup(name) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| HarnessError::Config(format!("invalid {}: {}", name, e))),
                None => Ok(default),
            }
        };
        // A zero timeout expires every check and RPC before it starts.
        let positive_millis = |name: &str, default: Duration| -> Result<Duration> {
            let value = millis(name, default)?;
            if value.is_zero() {
                return Err(HarnessError::Config(format!(
                    "invalid {}: must be greater than zero",
                    name
                )));
            }
            Ok(value)
        };

        let namespace = lookup("HARNESS_NAMESPACE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.namespace);

        let features = lookup("HARNESS_FEATURES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            namespace,
            features,
            check_timeout: positive_millis("HARNESS_CHECK_TIMEOUT_MS", defaults.check_timeout)?,
            rpc_timeout: positive_millis("HARNESS_RPC_TIMEOUT_MS", defaults.rpc_timeout)?,
            result_timeout: millis("HARNESS_RESULT_TIMEOUT_MS", defaults.result_timeout)?,
            server_deadline: millis("HARNESS_SERVER_DEADLINE_MS", defaults.server_deadline)?,
            trigger_cooldown: millis("HARNESS_TRIGGER_COOLDOWN_MS", defaults.trigger_cooldown)?,
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_features(mut self, prefixes: Vec<String>) -> Self {
        self.features = prefixes;
        self
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout = timeout;
        self
    }

    pub fn with_server_deadline(mut self, deadline: Duration) -> Self {
        self.server_deadline = deadline;
        self
    }

    pub fn with_trigger_cooldown(mut self, cooldown: Duration) -> Self {
        self.trigger_cooldown = cooldown;
        self
    }

    /// Client options derived from this configuration.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::new()
            .with_namespace(&self.namespace)
            .with_rpc_timeout(self.rpc_timeout)
            .with_result_timeout(self.result_timeout)
    }

    /// Embedded engine configuration derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_server_deadline(self.server_deadline)
            .with_trigger_cooldown(self.trigger_cooldown)
    }
}
