// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Debounced scheduling of rewrite passes.
//!
//! A burst of Service events should produce one Corefile write, not one per
//! event. The first request of a burst arms a timer; requests arriving while
//! the timer is armed are picked up by the same pass. Once the timer fires the
//! scheduler disarms itself before running the pass, so requests queued while
//! the pass is running arm a new timer.
//!
//! Passes never overlap: each one holds `pass_lock` for its whole duration.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// At-most-one-pending-pass timer.
#[derive(Debug)]
pub struct DebounceScheduler {
    delay: Duration,
    scheduled: Arc<AtomicBool>,
    pass_lock: Arc<Mutex<()>>,
}

impl DebounceScheduler {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            scheduled: Arc::new(AtomicBool::new(false)),
            pass_lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a pass is armed and has not started yet.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Arm a pass to run after the configured delay.
    ///
    /// Returns the spawned task, or `None` if a pass is already armed (the
    /// armed pass will see whatever the caller just queued).
    pub fn schedule<F, Fut>(&self, pass: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.schedule_after(self.delay, pass)
    }

    /// Arm a pass to run after `delay`.
    pub fn schedule_after<F, Fut>(&self, delay: Duration, pass: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            trace!("Rewrite pass already scheduled");
            return None;
        }

        debug!(delay = ?delay, "Scheduling rewrite pass");
        let scheduled = Arc::clone(&self.scheduled);
        let pass_lock = Arc::clone(&self.pass_lock);

        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _guard = pass_lock.lock().await;
            scheduled.store(false, Ordering::SeqCst);
            pass().await;
        }))
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
