// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CoreDNS rewrite reconciliation.
//!
//! Keights keeps the `rewrite name` directives of the CoreDNS Corefile in step
//! with the rewrite annotation on Services:
//!
//! 1. **Observe** - The `ConfigMap` watcher feeds each Corefile snapshot to the
//!    [`engine::RewriteEngine`]; the Service watcher queues rewrite requests.
//! 2. **Debounce** - The [`scheduler::DebounceScheduler`] batches a burst of
//!    requests into one pass.
//! 3. **Reconcile** - [`run_reconcile_pass`] drains the queue and renders a
//!    patched Corefile if any rule changed.
//! 4. **Write back** - The [`configmap::CorefileWriter`] stores the patched
//!    Corefile. The resulting `ConfigMap` event becomes the next snapshot.
//!
//! # Example
//!
//! ```rust,no_run
//! use keights::config::ControllerSettings;
//! use keights::context::Context;
//! use keights::reconcilers::schedule_reconcile;
//! use keights::request_queue::RewriteEvent;
//! use kube::Client;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = Client::try_default().await?;
//! let ctx = Arc::new(Context::with_client(client, ControllerSettings::default()));
//!
//! if ctx.engine.handle_service(RewriteEvent::Added, Some("app.example.com"), "app", "default") {
//!     schedule_reconcile(&ctx);
//! }
//! # Ok(())
//! # }
//! ```

pub mod configmap;
pub mod engine;
pub mod retry;
pub mod scheduler;

use crate::context::Context;
use crate::metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Result of a single rewrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// No Corefile observed yet; requests stay queued.
    NotReady,
    /// Nothing queued, or every request was already satisfied.
    Unchanged,
    /// A patched Corefile was written back.
    Patched,
    /// A patched Corefile was rendered but could not be written back.
    WriteFailed,
}

impl PassOutcome {
    /// Metric label for this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::Unchanged => "noop",
            Self::Patched => "success",
            Self::WriteFailed => "error",
        }
    }
}

/// Run one rewrite pass against the latest Corefile and write back the result.
///
/// Write-back failures are logged and counted, never propagated: the next
/// `ConfigMap` snapshot resets the rewrite table to what is actually stored.
pub async fn run_reconcile_pass(ctx: &Context) -> PassOutcome {
    let start = Instant::now();

    let outcome = if !ctx.engine.is_ready() {
        // reconcile() logs the skip and leaves the queue untouched
        let _ = ctx.engine.reconcile_latest();
        PassOutcome::NotReady
    } else if let Some(corefile) = ctx.engine.reconcile_latest() {
        match ctx.writer.write_corefile(&corefile).await {
            Ok(()) => PassOutcome::Patched,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to write back CoreDNS Corefile");
                metrics::record_error("write_back");
                PassOutcome::WriteFailed
            }
        }
    } else {
        PassOutcome::Unchanged
    };

    let elapsed = start.elapsed();
    metrics::record_pass(outcome.as_str(), elapsed);
    match outcome {
        PassOutcome::Patched => info!(duration = ?elapsed, "Rewrite pass patched Corefile"),
        _ => debug!(outcome = outcome.as_str(), duration = ?elapsed, "Rewrite pass finished"),
    }
    outcome
}

/// Arm a debounced rewrite pass.
///
/// Returns `false` if a pass is already armed.
pub fn schedule_reconcile(ctx: &Arc<Context>) -> bool {
    schedule_reconcile_after(ctx, ctx.scheduler.delay())
}

/// Arm a rewrite pass after `delay` instead of the configured debounce delay.
pub fn schedule_reconcile_after(ctx: &Arc<Context>, delay: Duration) -> bool {
    let pass_ctx = Arc::clone(ctx);
    ctx.scheduler
        .schedule_after(delay, move || async move {
            run_reconcile_pass(&pass_ctx).await;
        })
        .is_some()
}
