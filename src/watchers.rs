// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch loops feeding the rewrite engine.
//!
//! Two `kube::runtime::watcher` streams run for the lifetime of the process:
//!
//! - **CoreDNS `ConfigMap`** - a single object selected by name in the configured
//!   namespace. Every applied version is a Corefile snapshot.
//! - **Services** - cluster wide. Objects seen during the initial listing are
//!   `Added`, later versions are `Updated`, removals are `Deleted`.
//!
//! Both streams use the runtime's default backoff, so a watch error is logged
//! and the stream reconnects instead of ending.

use crate::context::Context;
use crate::errors::RewriteError;
use crate::metrics;
use crate::reconcilers::schedule_reconcile;
use crate::request_queue::RewriteEvent;
use anyhow::Result;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Watch the CoreDNS `ConfigMap` until the stream ends.
///
/// # Errors
///
/// Never returns an error in practice; a finished stream is reported to the
/// caller as `Ok(())` so it can treat it as an unexpected exit.
pub async fn run_configmap_watcher(client: Client, ctx: Arc<Context>) -> Result<()> {
    let settings = &ctx.settings;
    info!(
        configmap = %settings.configmap_name,
        namespace = %settings.configmap_namespace,
        "Starting CoreDNS ConfigMap watcher"
    );

    let api = Api::<ConfigMap>::namespaced(client, &settings.configmap_namespace);
    let config =
        watcher::Config::default().fields(&format!("metadata.name={}", settings.configmap_name));

    drive(watcher::watcher(api, config).default_backoff(), "configmap", |event| {
        apply_configmap_event(&ctx, event);
    })
    .await;

    Ok(())
}

/// Watch Services in all namespaces until the stream ends.
///
/// # Errors
///
/// Never returns an error in practice; see [`run_configmap_watcher`].
pub async fn run_service_watcher(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!(
        annotation = %ctx.settings.annotation,
        "Starting Service watcher"
    );

    let api = Api::<Service>::all(client);

    drive(
        watcher::watcher(api, watcher::Config::default()).default_backoff(),
        "service",
        |event| apply_service_event(&ctx, event),
    )
    .await;

    Ok(())
}

async fn drive<K, S, F>(stream: S, kind: &str, mut handle: F)
where
    S: Stream<Item = Result<Event<K>, watcher::Error>>,
    F: FnMut(Event<K>),
{
    let mut stream = std::pin::pin!(stream);
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => handle(event),
            Err(e) => {
                warn!(watch = kind, error = %e, "Watch stream error, backing off");
                metrics::record_error("watch");
            }
        }
    }
    error!(watch = kind, "Watch stream ended");
}

// ----------------------------------------------------------------------------
// ConfigMap events
// ----------------------------------------------------------------------------

/// Route one `ConfigMap` watch event to the engine.
pub fn apply_configmap_event(ctx: &Arc<Context>, event: Event<ConfigMap>) {
    match event {
        Event::Apply(configmap) | Event::InitApply(configmap) => {
            handle_configmap(ctx, &configmap);
        }
        Event::Delete(configmap) => {
            error!(
                configmap = %configmap.name_any(),
                namespace = %configmap.namespace().unwrap_or_default(),
                "CoreDNS ConfigMap deleted, keeping last observed Corefile"
            );
        }
        Event::Init => debug!("ConfigMap watch (re)listing"),
        Event::InitDone => debug!("ConfigMap watch listing complete"),
    }
}

/// Feed the Corefile held by `configmap` to the engine.
///
/// Schedules a pass when requests are already waiting, so requests queued
/// before the first snapshot are not left behind.
pub fn handle_configmap(ctx: &Arc<Context>, configmap: &ConfigMap) {
    let key = &ctx.settings.configmap_key;
    let Some(corefile) = configmap.data.as_ref().and_then(|data| data.get(key)) else {
        let err = RewriteError::MissingDataKey {
            name: configmap.name_any(),
            namespace: configmap.namespace().unwrap_or_default(),
            key: key.clone(),
        };
        error!(error = %err, "Ignoring CoreDNS ConfigMap");
        metrics::record_error("missing_data_key");
        return;
    };

    ctx.engine.handle_corefile(corefile);

    if ctx.engine.pending_requests() > 0 && schedule_reconcile(ctx) {
        debug!(
            pending = ctx.engine.pending_requests(),
            "Scheduled rewrite pass for requests queued before snapshot"
        );
    }
}

// ----------------------------------------------------------------------------
// Service events
// ----------------------------------------------------------------------------

/// Route one Service watch event to the engine.
pub fn apply_service_event(ctx: &Arc<Context>, event: Event<Service>) {
    match event {
        Event::InitApply(service) => handle_service(ctx, RewriteEvent::Added, &service),
        Event::Apply(service) => handle_service(ctx, RewriteEvent::Updated, &service),
        Event::Delete(service) => handle_service(ctx, RewriteEvent::Deleted, &service),
        Event::Init => debug!("Service watch (re)listing"),
        Event::InitDone => debug!("Service watch listing complete"),
    }
}

/// Queue a rewrite request for `service` and arm a pass if one was queued.
pub fn handle_service(ctx: &Arc<Context>, event: RewriteEvent, service: &Service) {
    let name = service.name_any();
    let namespace = service.namespace().unwrap_or_default();

    if ctx
        .engine
        .handle_service_annotations(event, &name, &namespace, service.metadata.annotations.as_ref())
    {
        schedule_reconcile(ctx);
    }
}

#[cfg(test)]
#[path = "watchers_tests.rs"]
mod watchers_tests;
