// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the watchers, the scheduled rewrite passes and the
//! status server.
//!
//! Every task receives an `Arc<Context>` holding:
//! - Controller settings
//! - The [`RewriteEngine`] with the rewrite table and pending requests
//! - The [`DebounceScheduler`] that batches requests into passes
//! - The [`CorefileWriter`] that stores patched Corefiles
//!
//! The Kubernetes client is not part of the context; only the watchers and
//! the `ConfigMap` writer talk to the API server.

use crate::config::ControllerSettings;
use crate::reconcilers::configmap::{ConfigMapWriter, CorefileWriter};
use crate::reconcilers::engine::RewriteEngine;
use crate::reconcilers::scheduler::DebounceScheduler;
use kube::Client;
use std::sync::Arc;

/// Shared controller state.
#[derive(Clone)]
pub struct Context {
    pub settings: Arc<ControllerSettings>,
    pub engine: Arc<RewriteEngine>,
    pub scheduler: Arc<DebounceScheduler>,
    pub writer: Arc<dyn CorefileWriter>,
}

impl Context {
    /// Build a context around an arbitrary writer.
    #[must_use]
    pub fn new(settings: ControllerSettings, writer: Arc<dyn CorefileWriter>) -> Self {
        let engine = RewriteEngine::from_settings(&settings);
        let scheduler = DebounceScheduler::new(settings.rewrite_task_delay);
        Self {
            settings: Arc::new(settings),
            engine: Arc::new(engine),
            scheduler: Arc::new(scheduler),
            writer,
        }
    }

    /// Build a context that writes Corefiles back to the CoreDNS `ConfigMap`.
    #[must_use]
    pub fn with_client(client: Client, settings: ControllerSettings) -> Self {
        let writer = Arc::new(ConfigMapWriter::new(client, &settings));
        Self::new(settings, writer)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
