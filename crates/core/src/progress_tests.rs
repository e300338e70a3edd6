// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn session_progress_starts_zeroed() {
    let p = SessionProgress::new(SessionStatus::Pending);
    assert_eq!(p.cost_usd, 0.0);
    assert_eq!(p.message_count, 0);
    assert!(p.started_at.is_none());
    assert!(p.duration_ms.is_none());
}

#[test]
fn totals_serde_skips_absent_estimate() {
    let totals = ProgressTotals::default();
    let json = serde_json::to_value(&totals).unwrap();
    assert!(json.get("estimate_ms").is_none());

    let with_estimate = ProgressTotals {
        estimate_ms: Some(500),
        ..ProgressTotals::default()
    };
    let json = serde_json::to_value(&with_estimate).unwrap();
    assert_eq!(json["estimate_ms"], 500);
}
