// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the rewrite controller.
//!
//! Orchestration code (watchers, write-back, bootstrap) works with `anyhow::Result`;
//! the variants here are the typed failures the library itself can raise.

use thiserror::Error;

/// Errors raised by the rewrite engine and its configuration layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// An event kind outside the closed `Added`/`Updated`/`Deleted` set.
    ///
    /// Only reachable when event kinds are supplied as strings by an external
    /// integration; the watchers in this crate map kube events directly.
    #[error("Unsupported rewrite event kind '{0}'")]
    UnsupportedEventKind(String),

    /// The watched ConfigMap does not carry the configured data key.
    #[error("ConfigMap {namespace}/{name} has no data key '{key}'")]
    MissingDataKey {
        /// ConfigMap name
        name: String,
        /// ConfigMap namespace
        namespace: String,
        /// Expected data key (e.g., `Corefile`)
        key: String,
    },

    /// A duration option could not be parsed.
    #[error("Invalid duration '{0}': expected <n>ms, <n>s, <n>m or <n>h")]
    InvalidDuration(String),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
