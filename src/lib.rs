// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Keights - CoreDNS rewrite controller for Kubernetes
//!
//! Keights lets a Service claim an external domain name. The domain goes in an
//! annotation on the Service; keights adds a matching `rewrite name` directive
//! to the CoreDNS Corefile so that lookups of the domain resolve to the
//! Service's cluster FQDN.
//!
//! ## Overview
//!
//! - The CoreDNS `ConfigMap` is watched; every version is parsed into the set of
//!   rewrite rules it already carries.
//! - Services are watched cluster wide; annotated ones become rewrite requests.
//! - Requests are batched by a debounce timer and applied in one pass. If any
//!   rule changed, the patched Corefile is written back to the `ConfigMap`.
//! - Each target FQDN is reached through at most one domain; a Service that
//!   switches domains replaces its old rule.
//!
//! ## Modules
//!
//! - [`corefile`] - Rewrite directive grammar, Corefile parsing and rendering
//! - [`rewrite_table`] - Domain to target mapping held in memory
//! - [`request_queue`] - Pending rewrite requests from Service events
//! - [`reconcilers`] - Rewrite engine, debounce scheduler and write-back
//! - [`watchers`] - `ConfigMap` and Service watch loops
//! - [`http`] - Metrics and status endpoints
//!
//! ## Example
//!
//! ```rust
//! use keights::reconcilers::engine::RewriteEngine;
//! use keights::request_queue::RewriteEvent;
//!
//! let engine = RewriteEngine::new("keights.coredns.rewrite/domain-name", "cluster.local");
//! let corefile = ".:53 {\n    kubernetes cluster.local\n}";
//!
//! engine.handle_corefile(corefile);
//! engine.handle_service(RewriteEvent::Added, Some("shop.example.com"), "web", "shop");
//!
//! let patched = engine.reconcile(corefile).unwrap();
//! assert_eq!(
//!     patched,
//!     ".:53 {\n    rewrite name shop.example.com web.shop.svc.cluster.local\n    kubernetes cluster.local\n}"
//! );
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod corefile;
pub mod duration;
pub mod errors;
pub mod http;
pub mod metrics;
pub mod reconcilers;
pub mod request_queue;
pub mod rewrite_table;
pub mod watchers;
