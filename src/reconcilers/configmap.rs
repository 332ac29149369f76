// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Corefile write-back to the CoreDNS `ConfigMap`.
//!
//! The rewrite pass only produces text. Getting that text into the cluster is
//! the job of a [`CorefileWriter`]; the production implementation,
//! [`ConfigMapWriter`], merge-patches a single data key so every other key in
//! the `ConfigMap` is left alone.

use crate::config::ControllerSettings;
use crate::reconcilers::retry::retry_api_call;
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{json, Value};
use tracing::info;

/// Destination for a patched Corefile.
#[async_trait::async_trait]
pub trait CorefileWriter: Send + Sync {
    /// Persist `corefile` as the new Corefile.
    ///
    /// # Errors
    ///
    /// Returns an error if the Corefile could not be stored.
    async fn write_corefile(&self, corefile: &str) -> Result<()>;
}

/// Writes the Corefile into one data key of the CoreDNS `ConfigMap`.
#[derive(Clone)]
pub struct ConfigMapWriter {
    client: Client,
    name: String,
    namespace: String,
    key: String,
    field_manager: String,
}

impl ConfigMapWriter {
    #[must_use]
    pub fn new(client: Client, settings: &ControllerSettings) -> Self {
        Self {
            client,
            name: settings.configmap_name.clone(),
            namespace: settings.configmap_namespace.clone(),
            key: settings.configmap_key.clone(),
            field_manager: settings.field_manager.clone(),
        }
    }
}

#[async_trait::async_trait]
impl CorefileWriter for ConfigMapWriter {
    async fn write_corefile(&self, corefile: &str) -> Result<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        let patch = corefile_patch(&self.key, corefile);
        let params = PatchParams::apply(&self.field_manager);

        retry_api_call(
            || async { api.patch(&self.name, &params, &Patch::Merge(&patch)).await },
            &format!("patch configmap {}/{}", self.namespace, self.name),
        )
        .await
        .with_context(|| {
            format!(
                "Failed to write Corefile to ConfigMap {}/{}",
                self.namespace, self.name
            )
        })?;

        info!(
            configmap = %self.name,
            namespace = %self.namespace,
            key = %self.key,
            "Updated CoreDNS Corefile"
        );
        Ok(())
    }
}

/// JSON merge patch replacing `data[key]` and nothing else.
#[must_use]
pub fn corefile_patch(key: &str, corefile: &str) -> Value {
    json!({
        "data": {
            key: corefile,
        }
    })
}

#[cfg(test)]
#[path = "configmap_tests.rs"]
mod configmap_tests;
