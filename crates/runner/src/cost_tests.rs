// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    total_cost = { json!({"type": "result", "total_cost_usd": 0.42}), Some(0.42) },
    cost_alias = { json!({"type": "result", "cost_usd": 1.5}), Some(1.5) },
    prefers_total = { json!({"type": "result", "total_cost_usd": 0.1, "cost_usd": 9.0}), Some(0.1) },
    wrong_type = { json!({"type": "assistant", "total_cost_usd": 0.42}), None },
    no_type = { json!({"total_cost_usd": 0.42}), None },
    negative = { json!({"type": "result", "total_cost_usd": -1.0}), None },
    not_a_number = { json!({"type": "result", "total_cost_usd": "0.42"}), None },
)]
fn stream_json_extractor(record: serde_json::Value, expected: Option<f64>) {
    assert_eq!(StreamJsonCostExtractor.extract(&record), expected);
}

#[test]
fn null_extractor_never_extracts() {
    let record = json!({"type": "result", "total_cost_usd": 0.42});
    assert_eq!(NullCostExtractor.extract(&record), None);
}
