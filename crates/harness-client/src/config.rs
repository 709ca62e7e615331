// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client configuration.

use std::time::Duration;

/// Options shared by every call a [`crate::WorkflowClient`] makes.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Namespace all calls target (default: "default")
    pub namespace: String,
    /// Identity reported to the service (default: "harness")
    pub identity: String,
    /// Client-side deadline for a single service call (default: 10s).
    /// When it fires first the call fails with `CANCELLED`.
    pub rpc_timeout: Duration,
    /// Default bound for result waits when the caller gives none (default: 30s)
    pub result_timeout: Duration,
    /// Wait passed to each long-poll call (default: 1s)
    pub long_poll: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            identity: "harness".to_string(),
            rpc_timeout: Duration::from_secs(10),
            result_timeout: Duration::from_secs(30),
            long_poll: Duration::from_secs(1),
        }
    }
}

impl ClientOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the identity.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Set the client-side call deadline.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Set the default result wait bound.
    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout = timeout;
        self
    }

    /// Set the long-poll wait.
    pub fn with_long_poll(mut self, wait: Duration) -> Self {
        self.long_poll = wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new();
        assert_eq!(options.namespace, "default");
        assert_eq!(options.rpc_timeout, Duration::from_secs(10));
        assert_eq!(options.result_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_chain() {
        let options = ClientOptions::new()
            .with_namespace("features")
            .with_identity("checker")
            .with_rpc_timeout(Duration::from_millis(250))
            .with_long_poll(Duration::from_millis(50));

        assert_eq!(options.namespace, "features");
        assert_eq!(options.identity, "checker");
        assert_eq!(options.rpc_timeout, Duration::from_millis(250));
        assert_eq!(options.long_poll, Duration::from_millis(50));
    }
}
