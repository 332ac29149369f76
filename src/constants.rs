// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the keights controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// CoreDNS ConfigMap Coordinates
// ============================================================================

/// Default name of the ConfigMap holding the Corefile
pub const DEFAULT_CONFIGMAP_NAME: &str = "coredns";

/// Default namespace of the CoreDNS ConfigMap
pub const DEFAULT_CONFIGMAP_NAMESPACE: &str = "kube-system";

/// Default data key inside the ConfigMap that holds the Corefile text
pub const DEFAULT_CONFIGMAP_KEY: &str = "Corefile";

// ============================================================================
// Rewrite Constants
// ============================================================================

/// Service annotation carrying the requested external domain name
pub const DEFAULT_REWRITE_ANNOTATION: &str = "keights.coredns.rewrite/domain-name";

/// Cluster domain suffix assumed until a Corefile snapshot says otherwise
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

/// Indentation used when rendering rewrite directives into the server block
pub const REWRITE_INDENT: &str = "    ";

// ============================================================================
// Scheduling Constants
// ============================================================================

/// Default quiet delay between the first request of a burst and its pass
pub const DEFAULT_REWRITE_TASK_DELAY: &str = "4s";

/// Default delay before the startup pass
pub const DEFAULT_REWRITE_TASK_INIT_DELAY: &str = "10s";

// ============================================================================
// Kubernetes API Constants
// ============================================================================

/// Field manager recorded on ConfigMap patches
pub const DEFAULT_FIELD_MANAGER: &str = "keights-controller";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
