// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rewrite reconciliation engine.
//!
//! The engine owns the [`RewriteTable`], the [`RequestQueue`], the cluster domain
//! suffix and the readiness flag. It is fed from two sides:
//!
//! 1. **Corefile snapshots** - [`RewriteEngine::handle_corefile`] rebuilds the table
//!    from the observed ConfigMap text and marks the engine ready.
//! 2. **Service events** - [`RewriteEngine::handle_service`] queues a request when
//!    the Service carries the rewrite annotation.
//!
//! A reconciliation pass ([`RewriteEngine::reconcile`]) drains the queue, applies
//! each request to the table and renders a patched Corefile only if something
//! actually changed. The pass runs to completion without awaiting.
//!
//! Snapshot intake and a whole pass (read text, drain, apply, render) hold the
//! same engine lock, so a snapshot never lands in the middle of a pass.
//!
//! Domain names and targets that are not valid directive tokens are never
//! admitted to the table, so every rendered rule is read back by the next
//! snapshot.
//!
//! # Deleted Services
//!
//! `Deleted` events are queued and drained like any other request but do not
//! touch the table. A rewrite rule for a deleted Service stays in the Corefile
//! until an operator removes it or another Service claims the same domain.

use crate::config::ControllerSettings;
use crate::corefile::{is_rewrite_token, parse_corefile, render_corefile, RewriteRule};
use crate::metrics;
use crate::request_queue::{RequestQueue, RewriteEvent, RewriteRequest};
use crate::rewrite_table::RewriteTable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

/// Point-in-time view of the engine, served on the `/rewrites` endpoint.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub ready: bool,
    pub cluster_domain: String,
    pub rules: Vec<RewriteRule>,
    pub pending_requests: usize,
    pub last_snapshot_at: Option<DateTime<Utc>>,
    pub last_patch_at: Option<DateTime<Utc>>,
}

/// Rewrite reconciliation state machine.
#[derive(Debug)]
pub struct RewriteEngine {
    annotation_key: String,
    table: RewriteTable,
    queue: RequestQueue,
    cluster_domain: RwLock<String>,
    corefile: RwLock<Option<String>>,
    ready: AtomicBool,
    last_snapshot_at: RwLock<Option<DateTime<Utc>>>,
    last_patch_at: RwLock<Option<DateTime<Utc>>>,
    /// Held for a whole snapshot intake and a whole pass
    pass_lock: Mutex<()>,
}

impl RewriteEngine {
    /// Create an engine that recognizes `annotation_key` on Services and assumes
    /// `cluster_domain` until a Corefile snapshot provides one.
    #[must_use]
    pub fn new(annotation_key: impl Into<String>, cluster_domain: impl Into<String>) -> Self {
        Self {
            annotation_key: annotation_key.into(),
            table: RewriteTable::new(),
            queue: RequestQueue::new(),
            cluster_domain: RwLock::new(cluster_domain.into()),
            corefile: RwLock::new(None),
            ready: AtomicBool::new(false),
            last_snapshot_at: RwLock::new(None),
            last_patch_at: RwLock::new(None),
            pass_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &ControllerSettings) -> Self {
        Self::new(settings.annotation.clone(), settings.cluster_domain.clone())
    }

    // ------------------------------------------------------------------------
    // Inbound notifications
    // ------------------------------------------------------------------------

    /// Take in a newly observed Corefile.
    ///
    /// Replaces the rewrite table with exactly the directives found in `corefile`,
    /// updates the cluster domain if a `kubernetes` line is present, caches the
    /// text for the next pass and marks the engine ready.
    pub fn handle_corefile(&self, corefile: &str) {
        debug!(corefile = %corefile, "Observed CoreDNS Corefile");

        let snapshot = parse_corefile(corefile);
        let _pass = self.pass_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(domain) = snapshot.cluster_domain {
            info!(cluster_domain = %domain, "Cluster domain");
            *self
                .cluster_domain
                .write()
                .unwrap_or_else(PoisonError::into_inner) = domain;
        } else {
            warn!(
                cluster_domain = %self.cluster_domain(),
                "No kubernetes directive in Corefile, keeping previous cluster domain"
            );
        }

        info!(rules = snapshot.rules.len(), "Loaded rewrite rules from Corefile");
        self.table.replace_all(snapshot.rules);

        *self.corefile.write().unwrap_or_else(PoisonError::into_inner) =
            Some(corefile.to_string());
        *self
            .last_snapshot_at
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        self.ready.store(true, Ordering::SeqCst);

        metrics::record_corefile_snapshot(self.table.len());
    }

    /// Queue a rewrite request for a Service event.
    ///
    /// `domain_name` is the value of the rewrite annotation, if the Service has
    /// one. Blank values are ignored. Values that are not a single directive
    /// token (wildcards, spaces, a leading `-` or `.`) are logged and dropped.
    ///
    /// # Returns
    ///
    /// `true` if a request was queued (the caller should schedule a pass).
    pub fn handle_service(
        &self,
        event: RewriteEvent,
        domain_name: Option<&str>,
        service_name: &str,
        service_namespace: &str,
    ) -> bool {
        let Some(domain_name) = domain_name.map(str::trim).filter(|d| !d.is_empty()) else {
            return false;
        };

        if !is_rewrite_token(domain_name) {
            error!(
                domain = %domain_name,
                service = %service_name,
                namespace = %service_namespace,
                annotation = %self.annotation_key,
                "Annotation value is not a valid rewrite domain name, ignoring"
            );
            metrics::record_error("invalid_domain");
            return false;
        }

        let request = RewriteRequest::new(event, domain_name, service_name, service_namespace);
        info!(
            event = %event,
            domain = %request.domain_name,
            service = %service_name,
            namespace = %service_namespace,
            "Queued rewrite request"
        );
        self.queue.push(request);
        metrics::record_rewrite_request(event);
        true
    }

    /// Same as [`Self::handle_service`], reading the domain name from the
    /// Service's annotations under the configured key.
    pub fn handle_service_annotations(
        &self,
        event: RewriteEvent,
        service_name: &str,
        service_namespace: &str,
        annotations: Option<&BTreeMap<String, String>>,
    ) -> bool {
        let domain_name = annotations
            .and_then(|annotations| annotations.get(&self.annotation_key))
            .map(String::as_str);
        self.handle_service(event, domain_name, service_name, service_namespace)
    }

    // ------------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------------

    /// Run one reconciliation pass against `current`.
    ///
    /// Returns the patched Corefile if at least one request changed the table,
    /// `None` otherwise (not ready, nothing queued, or everything already in place).
    pub fn reconcile(&self, current: &str) -> Option<String> {
        let _pass = self.pass_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.reconcile_locked(current)
    }

    /// Run a pass against the most recently observed Corefile.
    ///
    /// The cached text is read under the same lock as the pass, so the rendered
    /// output always pairs the table with the text it was built from.
    pub fn reconcile_latest(&self) -> Option<String> {
        let _pass = self.pass_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Not ready until a Corefile has been cached, so the empty fallback never renders
        let current = self.latest_corefile().unwrap_or_default();
        self.reconcile_locked(&current)
    }

    fn reconcile_locked(&self, current: &str) -> Option<String> {
        if !self.is_ready() {
            warn!("CoreDNS Corefile not observed yet, skipping rewrite pass");
            return None;
        }

        let requests = self.queue.drain();
        if requests.is_empty() {
            debug!("No pending rewrite requests");
            return None;
        }

        info!(requests = requests.len(), "Processing rewrite requests");
        let cluster_domain = self.cluster_domain();
        let mut modified = false;

        for request in &requests {
            match request.event {
                RewriteEvent::Added | RewriteEvent::Updated => {
                    let target = request.to_fqdn(&cluster_domain);
                    if !is_rewrite_token(&target) {
                        error!(
                            domain = %request.domain_name,
                            target = %target,
                            "Service FQDN is not a valid rewrite target, skipping request"
                        );
                        metrics::record_error("invalid_target");
                        continue;
                    }
                    if self.table.upsert_unique(&request.domain_name, &target) {
                        info!(
                            domain = %request.domain_name,
                            target = %target,
                            "Rewrite rule changed"
                        );
                        modified = true;
                    } else {
                        debug!(
                            domain = %request.domain_name,
                            target = %target,
                            "Rewrite rule already in place"
                        );
                    }
                }
                RewriteEvent::Deleted => {
                    debug!(
                        domain = %request.domain_name,
                        service = %request.service_name,
                        namespace = %request.service_namespace,
                        "Service deleted, rewrite rule left in place"
                    );
                }
            }
        }

        if !modified {
            return None;
        }

        let rules = self.table.rules();
        let patched = render_corefile(current, &rules);
        debug!(corefile = %patched, "Rendered CoreDNS Corefile");

        *self
            .last_patch_at
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        metrics::set_rewrite_rules(rules.len());

        Some(patched)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Whether the table already maps the request's domain to its Service FQDN.
    #[must_use]
    pub fn has_rewrite(&self, request: &RewriteRequest) -> bool {
        let target = request.to_fqdn(&self.cluster_domain());
        self.table.contains(&request.domain_name, &target)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cluster_domain(&self) -> String {
        self.cluster_domain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn annotation_key(&self) -> &str {
        &self.annotation_key
    }

    #[must_use]
    pub fn latest_corefile(&self) -> Option<String> {
        self.corefile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn rewrites_len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            ready: self.is_ready(),
            cluster_domain: self.cluster_domain(),
            rules: self.table.rules(),
            pending_requests: self.queue.len(),
            last_snapshot_at: *self
                .last_snapshot_at
                .read()
                .unwrap_or_else(PoisonError::into_inner),
            last_patch_at: *self
                .last_patch_at
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
