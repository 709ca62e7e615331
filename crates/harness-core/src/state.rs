// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runtime state shared by the executor, the injector and checks.

use std::sync::Arc;

use harness_client::WorkflowClient;

use crate::feature::Feature;

/// Execution context of one harness run.
///
/// Only the harness driver changes the current feature, and only between
/// feature runs.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub namespace: String,
    client: WorkflowClient,
    current_feature: Option<Arc<Feature>>,
}

impl RuntimeState {
    pub fn new(client: WorkflowClient) -> Self {
        Self {
            namespace: client.namespace().to_string(),
            client,
            current_feature: None,
        }
    }

    /// The shared client.
    pub fn client(&self) -> &WorkflowClient {
        &self.client
    }

    pub fn current_feature(&self) -> Option<&Arc<Feature>> {
        self.current_feature.as_ref()
    }

    pub fn enter_feature(&mut self, feature: Arc<Feature>) {
        self.current_feature = Some(feature);
    }

    pub fn leave_feature(&mut self) {
        self.current_feature = None;
    }

    /// State for running `feature`'s checks: the feature becomes current and
    /// the client also speaks the feature's payload encodings.
    pub fn scoped_to(&self, feature: Arc<Feature>) -> Self {
        let converter = feature.data_converter(self.client.converter());
        Self {
            namespace: self.namespace.clone(),
            client: self.client.with_converter(converter),
            current_feature: Some(feature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_client::{ClientOptions, JSON_ENCODING, JsonConverter, MemoryEngine};

    #[test]
    fn test_scoped_state_tracks_feature() {
        let client = WorkflowClient::new(
            Arc::new(MemoryEngine::default()),
            ClientOptions::new().with_namespace("features"),
        );
        let mut state = RuntimeState::new(client);
        assert_eq!(state.namespace, "features");
        assert!(state.current_feature().is_none());

        let feature = Arc::new(Feature::new("tq").with_converter(Arc::new(JsonConverter)));
        let scoped = state.scoped_to(feature.clone());
        assert_eq!(
            scoped.current_feature().map(|f| f.task_queue()),
            Some("tq")
        );
        assert_eq!(scoped.client().converter().encodings(), vec![JSON_ENCODING, JSON_ENCODING]);
        // The base state is untouched
        assert!(state.current_feature().is_none());

        state.enter_feature(feature);
        assert!(state.current_feature().is_some());
        state.leave_feature();
        assert!(state.current_feature().is_none());
    }
}
