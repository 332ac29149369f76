// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Corefile text handling.
//!
//! - [`rewrite`] - grammar for one `rewrite name` directive
//! - [`snapshot`] - whole-file parsing and patch rendering
//!
//! Everything here is pure and stateless; state lives in
//! [`crate::rewrite_table`] and [`crate::reconcilers::engine`].

pub mod rewrite;
pub mod snapshot;

pub use rewrite::{is_rewrite_directive, is_rewrite_token, RewriteRule};
pub use snapshot::{parse_corefile, render_corefile, CorefileSnapshot};
