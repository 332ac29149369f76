// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory table of active rewrite rules.
//!
//! The table maps a requested domain name to the internal service FQDN it is
//! rewritten to. It is rebuilt wholesale from every observed Corefile snapshot
//! and mutated one entry at a time during a reconciliation pass.
//!
//! All access goes through a single `RwLock`, so readers (status endpoint,
//! metrics) never observe a half-applied replacement or eviction.

use crate::corefile::RewriteRule;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe `domain name -> target FQDN` mapping.
#[derive(Debug, Default)]
pub struct RewriteTable {
    entries: RwLock<BTreeMap<String, String>>,
}

impl RewriteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole table with `rules`. Previous content is discarded.
    ///
    /// If the same domain appears more than once, the last occurrence wins.
    pub fn replace_all<I>(&self, rules: I)
    where
        I: IntoIterator<Item = RewriteRule>,
    {
        let fresh: BTreeMap<String, String> = rules
            .into_iter()
            .map(|rule| (rule.domain_name, rule.target_fqdn))
            .collect();
        *self.write() = fresh;
    }

    /// Target FQDN currently mapped from `domain_name`.
    #[must_use]
    pub fn get(&self, domain_name: &str) -> Option<String> {
        self.read().get(domain_name).cloned()
    }

    /// Whether `domain_name` maps to exactly `target_fqdn`.
    #[must_use]
    pub fn contains(&self, domain_name: &str, target_fqdn: &str) -> bool {
        self.read()
            .get(domain_name)
            .is_some_and(|target| target == target_fqdn)
    }

    /// Point `domain_name` at `target_fqdn`, keeping targets unique.
    ///
    /// Any other entry already pointing at `target_fqdn` is evicted before the
    /// insert. Returns `true` if the table changed.
    pub fn upsert_unique(&self, domain_name: &str, target_fqdn: &str) -> bool {
        let mut entries = self.write();

        if entries
            .get(domain_name)
            .is_some_and(|target| target == target_fqdn)
        {
            return false;
        }

        let evicted = entries
            .iter()
            .find(|(_, target)| *target == target_fqdn)
            .map(|(domain, _)| domain.clone());
        if let Some(domain) = evicted {
            tracing::debug!(
                evicted_domain = %domain,
                target = %target_fqdn,
                "Evicting rewrite rule that points at the same target"
            );
            entries.remove(&domain);
        }

        entries.insert(domain_name.to_string(), target_fqdn.to_string());
        true
    }

    /// Number of rules in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Consistent copy of every rule, ordered by domain name.
    #[must_use]
    pub fn rules(&self) -> Vec<RewriteRule> {
        self.read()
            .iter()
            .map(|(domain, target)| RewriteRule::new(domain.as_str(), target.as_str()))
            .collect()
    }
}

#[cfg(test)]
#[path = "rewrite_table_tests.rs"]
mod rewrite_table_tests;
