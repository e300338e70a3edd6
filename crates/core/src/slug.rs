// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slugify names for use in group and queue identifiers.

use crate::clock::Clock;

/// Maximum slug length within a resource id.
pub const MAX_SLUG_LEN: usize = 20;

/// Slugify a string for use as a resource id component.
///
/// Lowercases, replaces any run of non-`[a-z0-9]` characters with a single
/// hyphen, collapses hyphens, and truncates to `max_len` characters (trimming
/// trailing hyphens left over from truncation).
pub fn slugify(input: &str, max_len: usize) -> String {
    let lower = input.to_lowercase();

    let mut slug = String::with_capacity(lower.len());
    let mut last_was_hyphen = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    let mut result = slug.trim_matches('-').to_string();

    if result.len() > max_len {
        result.truncate(max_len);
    }

    // Truncation may leave a trailing hyphen
    let trimmed = result.trim_end_matches('-');
    if trimmed.len() != result.len() {
        result = trimmed.to_string();
    }

    result
}

/// Build a `YYYYMMDD-HHMMSS-{slug}` resource id from a display name.
///
/// An empty slug (name contained no alphanumerics) yields just the timestamp
/// prefix without a trailing hyphen.
pub fn resource_id(name: &str, clock: &dyn Clock) -> String {
    let stamp = clock.now().format("%Y%m%d-%H%M%S");
    let slug = slugify(name, MAX_SLUG_LEN);
    if slug.is_empty() {
        stamp.to_string()
    } else {
        format!("{}-{}", stamp, slug)
    }
}

#[cfg(test)]
#[path = "slug_tests.rs"]
mod tests;
