// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Grammar for a single CoreDNS `rewrite name` directive.
//!
//! A directive line looks like:
//!
//! ```text
//!     rewrite name [exact] <domain> <target>
//! ```
//!
//! Both tokens consist of word characters, hyphens and dots, must not start with
//! `-` or `.`, and must end in a word character. Anything else on the line makes
//! it a non-directive line that is carried through untouched.

use crate::constants::REWRITE_INDENT;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Pattern for one directive line. Trailing whitespace (including a `\r` left over
/// from CRLF text) is tolerated; everything else must match in full.
///
/// Unicode is off, so `\w` and `\s` are ASCII only.
static REWRITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?-u)^\s*rewrite\s+name\s+(?:exact\s+)?(\w(?:[\w.-]*\w)?)\s+(\w(?:[\w.-]*\w)?)\s*$",
    )
    .expect("rewrite directive pattern is a valid regex")
});

/// A single domain or target token on its own.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)^\w(?:[\w.-]*\w)?$").expect("rewrite token pattern is a valid regex")
});

/// One `domain -> target` rewrite rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRule {
    /// Requested external domain name (lookup key)
    pub domain_name: String,
    /// Internal service FQDN the domain is rewritten to
    pub target_fqdn: String,
}

impl RewriteRule {
    #[must_use]
    pub fn new(domain_name: impl Into<String>, target_fqdn: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            target_fqdn: target_fqdn.into(),
        }
    }

    /// Parse a configuration line as a rewrite directive.
    ///
    /// Returns `None` if the line is not a directive. The optional `exact`
    /// qualifier is accepted but not retained.
    ///
    /// # Example
    ///
    /// ```
    /// use keights::corefile::RewriteRule;
    ///
    /// let rule = RewriteRule::parse("    rewrite name exact a.example.com web.default.svc.cluster.local");
    /// assert_eq!(
    ///     rule,
    ///     Some(RewriteRule::new("a.example.com", "web.default.svc.cluster.local"))
    /// );
    /// assert_eq!(RewriteRule::parse("    errors"), None);
    /// ```
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        REWRITE_PATTERN
            .captures(line)
            .map(|caps| Self::new(&caps[1], &caps[2]))
    }

    /// Render the rule in canonical form: four-space indent, never `exact`.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{REWRITE_INDENT}rewrite name {} {}",
            self.domain_name, self.target_fqdn
        )
    }
}

impl fmt::Display for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.domain_name, self.target_fqdn)
    }
}

/// Check whether `token` can stand as the domain or target of a directive.
///
/// A name that fails this check would render as a line that is not read back
/// as a directive, so it must never enter the rewrite table.
///
/// # Example
///
/// ```
/// use keights::corefile::is_rewrite_token;
///
/// assert!(is_rewrite_token("shop.example.com"));
/// assert!(!is_rewrite_token("*.example.com"));
/// assert!(!is_rewrite_token("foo bar"));
/// ```
#[must_use]
pub fn is_rewrite_token(token: &str) -> bool {
    TOKEN_PATTERN.is_match(token)
}

/// Check whether a configuration line is a rewrite directive.
#[must_use]
pub fn is_rewrite_directive(line: &str) -> bool {
    REWRITE_PATTERN.is_match(line)
}

#[cfg(test)]
#[path = "rewrite_tests.rs"]
mod rewrite_tests;
