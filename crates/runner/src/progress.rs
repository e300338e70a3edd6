// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group progress aggregation and budget predicates.

use chrono::{DateTime, Utc};
use muster_core::{
    GroupProgress, ProgressTotals, SessionGroup, SessionProgress, SessionStatus, StatusCounts,
    TokenUsage,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Fraction of the budget consumed, in `[0, ∞)`; zero when no budget.
pub fn budget_usage_percent(cost_usd: f64, max_budget_usd: f64) -> f64 {
    if max_budget_usd <= 0.0 {
        return 0.0;
    }
    cost_usd / max_budget_usd
}

/// Warning fires at `cost ≥ max × threshold`.
pub fn is_budget_warning(cost_usd: f64, max_budget_usd: f64, threshold: f64) -> bool {
    max_budget_usd > 0.0 && cost_usd >= max_budget_usd * threshold
}

/// Exceeded fires at `cost ≥ max`.
pub fn is_budget_exceeded(cost_usd: f64, max_budget_usd: f64) -> bool {
    max_budget_usd > 0.0 && cost_usd >= max_budget_usd
}

#[derive(Default)]
struct AggregatorState {
    sessions: HashMap<String, SessionProgress>,
    started_at: Option<DateTime<Utc>>,
}

/// Tracks per-session progress across one group run.
#[derive(Default)]
pub struct ProgressAggregator {
    state: Mutex<AggregatorState>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the run's start instant; elapsed time counts from here.
    pub fn start(&self, now: DateTime<Utc>) {
        self.state.lock().started_at = Some(now);
    }

    pub fn record_status(&self, session_id: &str, status: SessionStatus) {
        let mut state = self.state.lock();
        state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionProgress::new(status))
            .status = status;
    }

    pub fn record_started(&self, session_id: &str, at: DateTime<Utc>) {
        let mut state = self.state.lock();
        let entry = state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionProgress::new(SessionStatus::Active));
        entry.started_at = Some(at);
    }

    pub fn record_duration(&self, session_id: &str, duration_ms: u64) {
        let mut state = self.state.lock();
        if let Some(entry) = state.sessions.get_mut(session_id) {
            entry.duration_ms = Some(duration_ms);
        }
    }

    /// Add an observed cost delta to a session.
    pub fn record_cost(&self, session_id: &str, delta_usd: f64) {
        let mut state = self.state.lock();
        let entry = state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionProgress::new(SessionStatus::Active));
        entry.cost_usd += delta_usd;
    }

    pub fn record_tokens(&self, session_id: &str, tokens: &TokenUsage) {
        let mut state = self.state.lock();
        let entry = state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionProgress::new(SessionStatus::Active));
        entry.tokens.add(tokens);
    }

    pub fn record_message(&self, session_id: &str) {
        let mut state = self.state.lock();
        let entry = state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionProgress::new(SessionStatus::Active));
        entry.message_count += 1;
    }

    pub fn session(&self, session_id: &str) -> Option<SessionProgress> {
        self.state.lock().sessions.get(session_id).cloned()
    }

    /// Aggregate counts and totals walking the group's session list.
    ///
    /// Sessions the aggregator has not seen fall back to their snapshot
    /// status and cost.
    pub fn compute(&self, group: &SessionGroup, now: DateTime<Utc>) -> GroupProgress {
        let state = self.state.lock();
        let mut counts = StatusCounts::default();
        let mut cost_usd = 0.0;
        let mut tokens = TokenUsage::default();

        for session in &group.sessions {
            let tracked = state.sessions.get(session.id.as_str());
            let status = tracked.map(|p| p.status).unwrap_or(session.status);
            match status {
                SessionStatus::Completed => counts.completed += 1,
                SessionStatus::Active => counts.running += 1,
                SessionStatus::Pending | SessionStatus::Paused => counts.pending += 1,
                SessionStatus::Failed => counts.failed += 1,
            }
            match tracked {
                Some(progress) => {
                    cost_usd += progress.cost_usd;
                    tokens.add(&progress.tokens);
                }
                None => {
                    cost_usd += session.cost_usd.unwrap_or(0.0);
                    if let Some(session_tokens) = &session.tokens {
                        tokens.add(session_tokens);
                    }
                }
            }
        }

        let elapsed_ms = state
            .started_at
            .map(|start| (now - start).num_milliseconds().max(0) as u64)
            .unwrap_or(0);
        let remaining = counts.pending + counts.running;
        let estimate_ms = if counts.completed > 0 {
            Some(elapsed_ms / counts.completed as u64 * remaining as u64)
        } else {
            None
        };

        GroupProgress {
            counts,
            totals: ProgressTotals {
                cost_usd,
                tokens,
                elapsed_ms,
                estimate_ms,
            },
        }
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
