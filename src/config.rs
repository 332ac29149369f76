// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller settings.
//!
//! Every option can be given as a command-line flag or as a `KEIGHTS_*`
//! environment variable; flags take precedence.

use crate::constants::{
    DEFAULT_CLUSTER_DOMAIN, DEFAULT_CONFIGMAP_KEY, DEFAULT_CONFIGMAP_NAME,
    DEFAULT_CONFIGMAP_NAMESPACE, DEFAULT_FIELD_MANAGER, DEFAULT_REWRITE_ANNOTATION,
    DEFAULT_REWRITE_TASK_DELAY, DEFAULT_REWRITE_TASK_INIT_DELAY, METRICS_SERVER_BIND_ADDRESS,
    METRICS_SERVER_PORT,
};
use crate::duration::parse_duration;
use clap::Parser;
use std::time::Duration;

/// Runtime settings for the keights controller.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "keights",
    version,
    about = "Keeps CoreDNS rewrite rules in sync with Service annotations"
)]
pub struct ControllerSettings {
    /// Name of the ConfigMap holding the Corefile
    #[arg(
        long,
        env = "KEIGHTS_CONFIGMAP_NAME",
        default_value = DEFAULT_CONFIGMAP_NAME
    )]
    pub configmap_name: String,

    /// Namespace of the CoreDNS ConfigMap
    #[arg(
        long,
        env = "KEIGHTS_CONFIGMAP_NAMESPACE",
        default_value = DEFAULT_CONFIGMAP_NAMESPACE
    )]
    pub configmap_namespace: String,

    /// Data key of the Corefile inside the ConfigMap
    #[arg(
        long,
        env = "KEIGHTS_CONFIGMAP_KEY",
        default_value = DEFAULT_CONFIGMAP_KEY
    )]
    pub configmap_key: String,

    /// Service annotation carrying the requested domain name
    #[arg(
        long,
        env = "KEIGHTS_ANNOTATION",
        default_value = DEFAULT_REWRITE_ANNOTATION
    )]
    pub annotation: String,

    /// Cluster domain assumed until the Corefile's kubernetes directive is seen
    #[arg(
        long,
        env = "KEIGHTS_CLUSTER_DOMAIN",
        default_value = DEFAULT_CLUSTER_DOMAIN
    )]
    pub cluster_domain: String,

    /// Delay between the first request of a burst and its rewrite pass
    #[arg(
        long,
        env = "KEIGHTS_REWRITE_TASK_DELAY",
        default_value = DEFAULT_REWRITE_TASK_DELAY,
        value_parser = parse_duration
    )]
    pub rewrite_task_delay: Duration,

    /// Delay before the startup rewrite pass
    #[arg(
        long,
        env = "KEIGHTS_REWRITE_TASK_INIT_DELAY",
        default_value = DEFAULT_REWRITE_TASK_INIT_DELAY,
        value_parser = parse_duration
    )]
    pub rewrite_task_init_delay: Duration,

    /// Bind address of the metrics and status server
    #[arg(
        long,
        env = "KEIGHTS_METRICS_BIND_ADDRESS",
        default_value = METRICS_SERVER_BIND_ADDRESS
    )]
    pub metrics_bind_address: String,

    /// Port of the metrics and status server
    #[arg(
        long,
        env = "KEIGHTS_METRICS_PORT",
        default_value_t = METRICS_SERVER_PORT
    )]
    pub metrics_port: u16,

    /// Field manager recorded on ConfigMap patches
    #[arg(
        long,
        env = "KEIGHTS_FIELD_MANAGER",
        default_value = DEFAULT_FIELD_MANAGER
    )]
    pub field_manager: String,
}

impl ControllerSettings {
    /// `host:port` the metrics server listens on.
    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.metrics_bind_address, self.metrics_port)
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            configmap_name: DEFAULT_CONFIGMAP_NAME.to_string(),
            configmap_namespace: DEFAULT_CONFIGMAP_NAMESPACE.to_string(),
            configmap_key: DEFAULT_CONFIGMAP_KEY.to_string(),
            annotation: DEFAULT_REWRITE_ANNOTATION.to_string(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            rewrite_task_delay: Duration::from_secs(4),
            rewrite_task_init_delay: Duration::from_secs(10),
            metrics_bind_address: METRICS_SERVER_BIND_ADDRESS.to_string(),
            metrics_port: METRICS_SERVER_PORT,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
