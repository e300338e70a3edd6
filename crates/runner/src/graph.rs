// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session dependency graph.
//!
//! Built once per run from the group's session list; cycle detection runs
//! at construction so the runner aborts before touching any status. During
//! the run the graph answers "which sessions are ready now" against its
//! completed/failed sets as the runner marks outcomes.

use crate::error::RunnerError;
use muster_core::{Session, SessionId, SessionStatus};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct Node {
    deps: Vec<SessionId>,
    dependents: Vec<SessionId>,
}

/// A pending session and the dependencies still holding it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedSession {
    pub session_id: SessionId,
    pub waiting_on: Vec<SessionId>,
}

/// Dependency graph over one group's sessions.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: HashMap<SessionId, Node>,
    /// Session ids in group order, for deterministic scheduling.
    order: Vec<SessionId>,
    status: HashMap<SessionId, SessionStatus>,
    completed: HashSet<SessionId>,
    failed: HashSet<SessionId>,
}

impl DependencyGraph {
    /// Build the graph and reject cycles.
    ///
    /// Sessions already completed or failed in the snapshot seed the
    /// corresponding sets, so a resumed run does not re-schedule them.
    /// Paused sessions come back as pending.
    pub fn build(sessions: &[Session]) -> Result<Self, RunnerError> {
        let mut nodes = HashMap::new();
        let mut order = Vec::new();
        let mut status = HashMap::new();
        let mut completed = HashSet::new();
        let mut failed = HashSet::new();

        for session in sessions {
            nodes.insert(
                session.id.clone(),
                Node {
                    deps: session.depends_on.clone(),
                    dependents: Vec::new(),
                },
            );
            order.push(session.id.clone());
            let effective = match session.status {
                SessionStatus::Completed => {
                    completed.insert(session.id.clone());
                    SessionStatus::Completed
                }
                SessionStatus::Failed => {
                    failed.insert(session.id.clone());
                    SessionStatus::Failed
                }
                // Paused and active snapshots are rescheduled
                SessionStatus::Paused | SessionStatus::Active | SessionStatus::Pending => {
                    SessionStatus::Pending
                }
            };
            status.insert(session.id.clone(), effective);
        }

        // Reverse edges; deps pointing outside the group get no reverse edge
        // and are simply never satisfied.
        for session in sessions {
            for dep in &session.depends_on {
                if let Some(node) = nodes.get_mut(dep) {
                    node.dependents.push(session.id.clone());
                }
            }
        }

        let graph = Self {
            nodes,
            order,
            status,
            completed,
            failed,
        };
        graph.check_cycles()?;
        Ok(graph)
    }

    /// Depth-first cycle check with a recursion-stack set.
    fn check_cycles(&self) -> Result<(), RunnerError> {
        let mut visited: HashSet<&SessionId> = HashSet::new();
        let mut stack: Vec<&SessionId> = Vec::new();
        let mut on_stack: HashSet<&SessionId> = HashSet::new();

        for start in &self.order {
            if visited.contains(start) {
                continue;
            }
            self.visit(start, &mut visited, &mut stack, &mut on_stack)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        id: &'a SessionId,
        visited: &mut HashSet<&'a SessionId>,
        stack: &mut Vec<&'a SessionId>,
        on_stack: &mut HashSet<&'a SessionId>,
    ) -> Result<(), RunnerError> {
        visited.insert(id);
        stack.push(id);
        on_stack.insert(id);

        if let Some(node) = self.nodes.get(id) {
            for dep in &node.deps {
                if !self.nodes.contains_key(dep) {
                    continue;
                }
                if on_stack.contains(dep) {
                    // Back edge: slice the stack into a sample cycle path
                    let start = stack.iter().position(|s| *s == dep).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|s| s.to_string()).collect();
                    path.push(dep.to_string());
                    return Err(RunnerError::CircularDependency { path });
                }
                if !visited.contains(dep) {
                    self.visit(dep, visited, stack, on_stack)?;
                }
            }
        }

        stack.pop();
        on_stack.remove(id);
        Ok(())
    }

    /// Pending sessions whose dependencies allow them to start now.
    ///
    /// A session is ready when no dependency failed and every dependency is
    /// completed; dependencies outside the group are never satisfied. With
    /// `respect_deps` off, every pending session is ready.
    pub fn ready(&self, respect_deps: bool) -> Vec<SessionId> {
        self.order
            .iter()
            .filter(|id| self.status.get(*id) == Some(&SessionStatus::Pending))
            .filter(|id| {
                if !respect_deps {
                    return true;
                }
                let Some(node) = self.nodes.get(*id) else {
                    return false;
                };
                node.deps.iter().all(|d| self.completed.contains(d))
                    && !node.deps.iter().any(|d| self.failed.contains(d))
            })
            .cloned()
            .collect()
    }

    /// Mark a session as started; it leaves the ready set.
    pub fn mark_active(&mut self, id: &SessionId) {
        self.status.insert(id.clone(), SessionStatus::Active);
    }

    /// Return a session to the ready pool (pause path).
    pub fn mark_pending(&mut self, id: &SessionId) {
        self.status.insert(id.clone(), SessionStatus::Pending);
    }

    /// The last mark wins: completing removes any failed record.
    pub fn mark_completed(&mut self, id: &SessionId) {
        self.status.insert(id.clone(), SessionStatus::Completed);
        self.completed.insert(id.clone());
        self.failed.remove(id);
    }

    /// The last mark wins: failing removes any completed record.
    pub fn mark_failed(&mut self, id: &SessionId) {
        self.status.insert(id.clone(), SessionStatus::Failed);
        self.failed.insert(id.clone());
        self.completed.remove(id);
    }

    /// Sessions not yet in either outcome set.
    pub fn remaining_count(&self) -> usize {
        self.order
            .iter()
            .filter(|id| !self.completed.contains(*id) && !self.failed.contains(*id))
            .count()
    }

    /// Pending sessions with at least one not-yet-completed dependency.
    pub fn blocked(&self) -> Vec<BlockedSession> {
        self.order
            .iter()
            .filter(|id| self.status.get(*id) == Some(&SessionStatus::Pending))
            .filter_map(|id| {
                let node = self.nodes.get(id)?;
                let waiting_on: Vec<SessionId> = node
                    .deps
                    .iter()
                    .filter(|d| !self.completed.contains(*d))
                    .cloned()
                    .collect();
                if waiting_on.is_empty() {
                    None
                } else {
                    Some(BlockedSession {
                        session_id: id.clone(),
                        waiting_on,
                    })
                }
            })
            .collect()
    }

    /// Dependents of `id` whose dependencies are now all decided
    /// (completed or failed).
    pub fn resolved_dependents(&self, id: &SessionId) -> Vec<SessionId> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        node.dependents
            .iter()
            .filter(|dep_id| {
                self.nodes.get(*dep_id).is_some_and(|n| {
                    n.deps
                        .iter()
                        .all(|d| self.completed.contains(d) || self.failed.contains(d))
                })
            })
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.nodes.contains_key(id)
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
