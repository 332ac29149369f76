// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Corefile snapshot parsing and patch rendering.
//!
//! A snapshot is everything the controller needs from one observed Corefile:
//! the cluster domain suffix from the `kubernetes` plugin line and the set of
//! `rewrite name` directives currently in effect.

use super::rewrite::{is_rewrite_directive, RewriteRule};
use regex::Regex;
use std::sync::LazyLock;

/// Matches the `kubernetes <suffix> ...` service-discovery directive.
static CLUSTER_DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)^\s*kubernetes\s+([\w.]+)(?:\s|$)")
        .expect("cluster domain pattern is a valid regex")
});

/// Result of parsing one Corefile text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorefileSnapshot {
    /// Cluster domain from the first `kubernetes` directive, if any
    pub cluster_domain: Option<String>,
    /// Every rewrite directive, in file order
    pub rules: Vec<RewriteRule>,
}

/// Parse a full Corefile text into a [`CorefileSnapshot`].
///
/// The first `kubernetes` line wins, with any trailing root dot dropped
/// (`cluster.local.` reads as `cluster.local`). A Corefile without one yields
/// `cluster_domain: None` and callers keep whatever suffix they had before.
///
/// # Example
///
/// ```
/// use keights::corefile::parse_corefile;
///
/// let snapshot = parse_corefile(
///     ".:53 {\n    rewrite name a.example.com a.default.svc.cluster.local\n    kubernetes cluster.local in-addr.arpa {\n    }\n}",
/// );
/// assert_eq!(snapshot.cluster_domain.as_deref(), Some("cluster.local"));
/// assert_eq!(snapshot.rules.len(), 1);
/// ```
#[must_use]
pub fn parse_corefile(corefile: &str) -> CorefileSnapshot {
    let cluster_domain = corefile
        .lines()
        .find_map(|line| CLUSTER_DOMAIN_PATTERN.captures(line))
        .map(|caps| caps[1].trim_end_matches('.').to_string())
        .filter(|domain| !domain.is_empty());

    let rules = corefile.lines().filter_map(RewriteRule::parse).collect();

    CorefileSnapshot {
        cluster_domain,
        rules,
    }
}

/// Render a patched Corefile.
///
/// Every non-directive line of `current` is kept in order. The given rules are
/// rendered as one contiguous block right after the first line (the server
/// block opener). A trailing newline in `current` survives, and text that uses
/// `\r\n` line endings is rendered with `\r\n` throughout.
#[must_use]
pub fn render_corefile<'a, I>(current: &str, rules: I) -> String
where
    I: IntoIterator<Item = &'a RewriteRule>,
{
    let separator = if current.contains("\r\n") { "\r\n" } else { "\n" };

    let mut body = current
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !is_rewrite_directive(line));

    let mut lines: Vec<String> = Vec::new();
    if let Some(opener) = body.next() {
        lines.push(opener.to_string());
    }
    lines.extend(rules.into_iter().map(RewriteRule::render));
    lines.extend(body.map(str::to_string));

    lines.join(separator)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod snapshot_tests;
