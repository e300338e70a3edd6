// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use chrono::DateTime;
use proptest::prelude::*;
use yare::parameterized;

#[parameterized(
    simple = { "Fix Auth Bug", "fix-auth-bug" },
    punctuation = { "re-run: CI (flaky!)", "re-run-ci-flaky" },
    unicode = { "café läuft", "caf-l-uft" },
    collapsed_hyphens = { "a  --  b", "a-b" },
    already_clean = { "refactor-parser", "refactor-parser" },
    empty = { "", "" },
    only_symbols = { "!!!", "" },
)]
fn slugify_cases(input: &str, expected: &str) {
    assert_eq!(slugify(input, MAX_SLUG_LEN), expected);
}

#[test]
fn slugify_truncates_and_trims_trailing_hyphen() {
    let slug = slugify("abcdefghij abcdefghi xyz", 20);
    assert_eq!(slug, "abcdefghij-abcdefghi");
    assert!(slug.len() <= 20);
    assert!(!slug.ends_with('-'));
}

#[test]
fn resource_id_has_timestamp_prefix() {
    let start = DateTime::from_timestamp(1_767_225_600, 0).unwrap(); // 2026-01-01T00:00:00Z
    let clock = FakeClock::at(start);
    assert_eq!(resource_id("Deploy Prep", &clock), "20260101-000000-deploy-prep");
}

#[test]
fn resource_id_with_empty_slug_is_bare_timestamp() {
    let start = DateTime::from_timestamp(1_767_225_600, 0).unwrap();
    let clock = FakeClock::at(start);
    assert_eq!(resource_id("???", &clock), "20260101-000000");
}

proptest! {
    #[test]
    fn slug_alphabet_and_length(input in ".{0,80}") {
        let slug = slugify(&input, MAX_SLUG_LEN);
        prop_assert!(slug.len() <= MAX_SLUG_LEN);
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.ends_with('-'));
        prop_assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.contains("--"));
    }
}
