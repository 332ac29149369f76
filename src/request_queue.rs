// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pending rewrite requests derived from Service events.
//!
//! Producers (the Service watcher) append; a reconciliation pass takes the whole
//! buffer in one swap. A request appended while a pass is draining lands either
//! in that pass's batch or in the next one, never both.

use crate::errors::RewriteError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Kind of Service change that produced a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RewriteEvent {
    Added,
    Updated,
    Deleted,
}

impl RewriteEvent {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RewriteEvent::Added => "added",
            RewriteEvent::Updated => "updated",
            RewriteEvent::Deleted => "deleted",
        }
    }
}

impl fmt::Display for RewriteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewriteEvent {
    type Err = RewriteError;

    /// Accepts Kubernetes watch types (`ADDED`, `MODIFIED`, `DELETED`) and the
    /// variant names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "added" => Ok(RewriteEvent::Added),
            "updated" | "modified" => Ok(RewriteEvent::Updated),
            "deleted" => Ok(RewriteEvent::Deleted),
            _ => Err(RewriteError::UnsupportedEventKind(s.to_string())),
        }
    }
}

/// A request to point `domain_name` at a Service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteRequest {
    pub event: RewriteEvent,
    pub domain_name: String,
    pub service_name: String,
    pub service_namespace: String,
}

impl RewriteRequest {
    #[must_use]
    pub fn new(
        event: RewriteEvent,
        domain_name: impl Into<String>,
        service_name: impl Into<String>,
        service_namespace: impl Into<String>,
    ) -> Self {
        Self {
            event,
            domain_name: domain_name.into(),
            service_name: service_name.into(),
            service_namespace: service_namespace.into(),
        }
    }

    /// Internal FQDN of the Service: `<name>.<namespace>.svc.<cluster_domain>`.
    ///
    /// # Example
    ///
    /// ```
    /// use keights::request_queue::{RewriteEvent, RewriteRequest};
    ///
    /// let request = RewriteRequest::new(RewriteEvent::Added, "mytest.site.wsx", "test", "default");
    /// assert_eq!(request.to_fqdn("cluster.local"), "test.default.svc.cluster.local");
    /// ```
    #[must_use]
    pub fn to_fqdn(&self, cluster_domain: &str) -> String {
        format!(
            "{}.{}.svc.{}",
            self.service_name, self.service_namespace, cluster_domain
        )
    }
}

/// Append-only buffer drained by swapping with an empty one.
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Mutex<Vec<RewriteRequest>>,
}

impl RequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RewriteRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, request: RewriteRequest) {
        self.lock().push(request);
    }

    /// Take every pending request, in arrival order, leaving the queue empty.
    #[must_use]
    pub fn drain(&self) -> Vec<RewriteRequest> {
        std::mem::take(&mut *self.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "request_queue_tests.rs"]
mod request_queue_tests;
