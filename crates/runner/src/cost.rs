// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cost extraction from engine stream-json output.
//!
//! Costs are consumed from engine output as received, never recomputed.
//! The extractor is a seam so deployments can track whichever field their
//! engine version emits; the runners fall back to zero when nothing is
//! extracted.

use serde_json::Value;

/// Extracts a USD cost from one stream-json stdout record.
pub trait CostExtractor: Send + Sync {
    fn extract(&self, record: &Value) -> Option<f64>;
}

/// Reads `total_cost_usd` (or `cost_usd`) from `type: "result"` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamJsonCostExtractor;

impl CostExtractor for StreamJsonCostExtractor {
    fn extract(&self, record: &Value) -> Option<f64> {
        if record.get("type").and_then(Value::as_str) != Some("result") {
            return None;
        }
        let cost = record
            .get("total_cost_usd")
            .or_else(|| record.get("cost_usd"))
            .and_then(Value::as_f64)?;
        if cost.is_finite() && cost >= 0.0 {
            Some(cost)
        } else {
            None
        }
    }
}

/// Extracts nothing; every command lands at zero cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCostExtractor;

impl CostExtractor for NullCostExtractor {
    fn extract(&self, _record: &Value) -> Option<f64> {
        None
    }
}

#[cfg(test)]
#[path = "cost_tests.rs"]
mod tests;
