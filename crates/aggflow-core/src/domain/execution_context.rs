//! Per-run store of node results
//!
//! One execution context exists per `execute()` call. The write path is
//! append-only and keys are never overwritten: within a level no two nodes
//! share a key, and levels are joined before the next one dispatches, so the
//! map needs no locking beyond what the concurrent map provides.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::domain::flow::{NodeId, NodeKind};
use crate::error::FlowError;
use crate::types::DataPacket;

/// Per-node execution state machine: pending → running → completed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRunStatus {
    /// Scheduled but not yet dispatched
    Pending,
    /// Currently executing
    Running,
    /// Finished successfully; a result is recorded
    Completed,
    /// Finished with an error
    Failed,
}

/// The result a node produced, recorded exactly once per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Kind of the producing node
    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// The produced value
    pub output: DataPacket,

    /// Id of the producing node
    pub node_id: NodeId,

    /// Kind-specific extras (cache manifest, preserved metadata, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    /// When the node finished
    pub completed_at: DateTime<Utc>,

    /// Wall-clock execution time in milliseconds
    pub elapsed_ms: u64,
}

/// Per-node status summary of a finished or aborted run
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    /// Node id
    pub node_id: NodeId,
    /// Final status
    pub status: NodeRunStatus,
    /// Error message, for failed nodes
    pub error: Option<String>,
    /// Execution time, for completed nodes
    pub elapsed_ms: Option<u64>,
}

/// Append-only, per-run store of node outputs
///
/// Keys are unique and entries are never mutated after insertion; reads are
/// immutable snapshots.
#[derive(Debug, Default, Clone)]
pub struct ExecutionContext {
    results: DashMap<NodeId, NodeOutput>,
    statuses: DashMap<NodeId, NodeRunStatus>,
    errors: DashMap<NodeId, String>,
}

impl ExecutionContext {
    /// Create an empty execution context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node's result
    ///
    /// Write-once: recording a second result for the same node is a bug in
    /// the scheduler and is rejected.
    pub fn insert(&self, output: NodeOutput) -> Result<(), FlowError> {
        match self.results.entry(output.node_id.clone()) {
            Entry::Occupied(_) => Err(FlowError::node_execution(
                output.node_id.to_string(),
                "result already recorded for this node",
            )),
            Entry::Vacant(entry) => {
                entry.insert(output);
                Ok(())
            }
        }
    }

    /// Read a node's result, if it has one
    pub fn get(&self, id: &NodeId) -> Option<NodeOutput> {
        self.results.get(id).map(|r| r.value().clone())
    }

    /// Whether a node has recorded a result
    pub fn contains(&self, id: &NodeId) -> bool {
        self.results.contains_key(id)
    }

    /// Number of recorded results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no results have been recorded
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Mark a node as scheduled
    pub fn mark_pending(&self, id: &NodeId) {
        self.statuses.insert(id.clone(), NodeRunStatus::Pending);
    }

    /// Mark a node as dispatched
    pub fn mark_running(&self, id: &NodeId) {
        self.statuses.insert(id.clone(), NodeRunStatus::Running);
    }

    /// Mark a node as completed
    pub fn mark_completed(&self, id: &NodeId) {
        self.statuses.insert(id.clone(), NodeRunStatus::Completed);
    }

    /// Mark a node as failed with an error message
    pub fn mark_failed(&self, id: &NodeId, error: impl Into<String>) {
        self.statuses.insert(id.clone(), NodeRunStatus::Failed);
        self.errors.insert(id.clone(), error.into());
    }

    /// Current status of a node; `Pending` when never scheduled
    pub fn status(&self, id: &NodeId) -> NodeRunStatus {
        self.statuses
            .get(id)
            .map(|s| *s.value())
            .unwrap_or(NodeRunStatus::Pending)
    }

    /// Per-node status summary, ordered by node id
    pub fn report(&self) -> Vec<NodeReport> {
        let mut reports: Vec<NodeReport> = self
            .statuses
            .iter()
            .map(|entry| {
                let node_id = entry.key().clone();
                NodeReport {
                    status: *entry.value(),
                    error: self.errors.get(&node_id).map(|e| e.value().clone()),
                    elapsed_ms: self.results.get(&node_id).map(|r| r.value().elapsed_ms),
                    node_id,
                }
            })
            .collect();
        reports.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        reports
    }

    /// Consume the context and return the recorded results keyed by node id
    pub fn into_results(self) -> std::collections::HashMap<NodeId, NodeOutput> {
        self.results.into_iter().collect()
    }
}
