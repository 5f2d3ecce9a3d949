//! Validated, immutable graph view over a flow
//!
//! Edges are partitioned into two channels: colored edges carry execution
//! order and variable-binding dependencies, regular edges are structural and
//! ignored by the scheduler. Keeping the two adjacency structures separate is
//! load-bearing: in-degrees and leveling must only ever consult the colored
//! channel.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::domain::flow::{Edge, Flow, NodeId, NodeKind};
use crate::error::FlowError;

/// A node after graph validation, with its kind resolved
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Node id
    pub id: NodeId,
    /// Resolved node kind
    pub kind: NodeKind,
    /// Type-specific payload, still unparsed
    pub data: serde_json::Value,
}

/// Immutable view of the nodes and edges for one execution
#[derive(Debug, Clone)]
pub struct FlowGraph {
    nodes: HashMap<NodeId, GraphNode>,
    node_order: Vec<NodeId>,
    colored_by_source: HashMap<NodeId, Vec<Edge>>,
    colored_by_target: HashMap<NodeId, Vec<Edge>>,
    regular_by_source: HashMap<NodeId, Vec<Edge>>,
    entry_nodes: HashSet<NodeId>,
    output_nodes: HashSet<NodeId>,
}

impl FlowGraph {
    /// Build and validate a graph view from a flow
    ///
    /// Fails with [`FlowError::InvalidGraph`] on duplicate node ids or edges
    /// referencing unknown nodes, and with [`FlowError::UnsupportedNodeType`]
    /// on type tags outside the closed node-kind set. Both checks run before
    /// any node can execute.
    pub fn new(flow: &Flow) -> Result<Self, FlowError> {
        let mut nodes = HashMap::with_capacity(flow.nodes.len());
        let mut node_order = Vec::with_capacity(flow.nodes.len());

        for node in &flow.nodes {
            let kind = NodeKind::parse(&node.node_type)
                .ok_or_else(|| FlowError::UnsupportedNodeType(node.node_type.clone()))?;

            let graph_node = GraphNode {
                id: node.id.clone(),
                kind,
                data: node.data.clone(),
            };
            if nodes.insert(node.id.clone(), graph_node).is_some() {
                return Err(FlowError::InvalidGraph(format!(
                    "duplicate node id: {}",
                    node.id
                )));
            }
            node_order.push(node.id.clone());
        }

        for edge in &flow.edges {
            if !nodes.contains_key(&edge.source) {
                return Err(FlowError::InvalidGraph(format!(
                    "edge {} references unknown source node: {}",
                    edge.id, edge.source
                )));
            }
            if !nodes.contains_key(&edge.target) {
                return Err(FlowError::InvalidGraph(format!(
                    "edge {} references unknown target node: {}",
                    edge.id, edge.target
                )));
            }
        }

        // Separate colored and regular edges
        let mut colored_by_source: HashMap<NodeId, Vec<Edge>> = HashMap::new();
        let mut colored_by_target: HashMap<NodeId, Vec<Edge>> = HashMap::new();
        let mut regular_by_source: HashMap<NodeId, Vec<Edge>> = HashMap::new();

        for edge in &flow.edges {
            if edge.is_colored() {
                colored_by_source
                    .entry(edge.source.clone())
                    .or_default()
                    .push(edge.clone());
                colored_by_target
                    .entry(edge.target.clone())
                    .or_default()
                    .push(edge.clone());
            } else {
                regular_by_source
                    .entry(edge.source.clone())
                    .or_default()
                    .push(edge.clone());
            }
        }

        // Entry and output nodes consider edges of either channel. These
        // sets are informational; scheduling uses colored in-degree only.
        let has_incoming: HashSet<&NodeId> = flow.edges.iter().map(|e| &e.target).collect();
        let has_outgoing: HashSet<&NodeId> = flow.edges.iter().map(|e| &e.source).collect();

        let entry_nodes = node_order
            .iter()
            .filter(|id| !has_incoming.contains(id))
            .cloned()
            .collect();
        let output_nodes = node_order
            .iter()
            .filter(|id| !has_outgoing.contains(id))
            .cloned()
            .collect();

        debug!(
            nodes = node_order.len(),
            colored_edges = colored_by_target.values().map(Vec::len).sum::<usize>(),
            "validated flow graph"
        );

        Ok(Self {
            nodes,
            node_order,
            colored_by_source,
            colored_by_target,
            regular_by_source,
            entry_nodes,
            output_nodes,
        })
    }

    /// Look up a node by id
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Node ids in authoring order
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_order
    }

    /// Nodes with no incoming edge of either channel
    pub fn entry_nodes(&self) -> &HashSet<NodeId> {
        &self.entry_nodes
    }

    /// Nodes with no outgoing edge of either channel
    pub fn output_nodes(&self) -> &HashSet<NodeId> {
        &self.output_nodes
    }

    /// Colored edges leaving a node
    pub fn colored_edges_from(&self, id: &NodeId) -> &[Edge] {
        self.colored_by_source
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Colored edges entering a node
    pub fn colored_edges_into(&self, id: &NodeId) -> &[Edge] {
        self.colored_by_target
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Regular edges leaving a node
    pub fn regular_edges_from(&self, id: &NodeId) -> &[Edge] {
        self.regular_by_source
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any colored edge feeds the given input name of a node
    pub fn has_colored_input(&self, id: &NodeId, handle: &str) -> bool {
        self.colored_edges_into(id)
            .iter()
            .any(|e| e.target_handle == handle)
    }

    /// Distinct input names fed by colored edges, in edge order
    pub fn colored_input_handles(&self, id: &NodeId) -> Vec<String> {
        let mut handles = Vec::new();
        for edge in self.colored_edges_into(id) {
            if !handles.contains(&edge.target_handle) {
                handles.push(edge.target_handle.clone());
            }
        }
        handles
    }

    /// Nodes wired into the colored dependency graph, in authoring order
    ///
    /// Only these nodes are scheduled; a node with no colored edge on either
    /// side is never executed.
    pub fn dependency_nodes(&self) -> Vec<NodeId> {
        let mut touched = HashSet::new();
        for (source, edges) in &self.colored_by_source {
            touched.insert(source.clone());
            for edge in edges {
                touched.insert(edge.target.clone());
            }
        }

        self.node_order
            .iter()
            .filter(|id| touched.contains(*id))
            .cloned()
            .collect()
    }

    /// Group the dependency nodes into parallel-executable levels
    ///
    /// Kahn's algorithm, level-batched over colored edges: level *i* holds
    /// every node whose colored in-degree reaches zero once levels `0..i`
    /// are removed. Fails with [`FlowError::CycleDetected`] when no
    /// zero-in-degree frontier exists while nodes remain.
    pub fn determine_execution_order(&self) -> Result<Vec<Vec<NodeId>>, FlowError> {
        let scheduled = self.dependency_nodes();

        let mut in_degree: HashMap<NodeId, usize> =
            scheduled.iter().map(|id| (id.clone(), 0)).collect();
        for edges in self.colored_by_source.values() {
            for edge in edges {
                if let Some(degree) = in_degree.get_mut(&edge.target) {
                    *degree += 1;
                }
            }
        }

        let mut levels = Vec::new();
        while !in_degree.is_empty() {
            let level: Vec<NodeId> = scheduled
                .iter()
                .filter(|id| in_degree.get(*id) == Some(&0))
                .cloned()
                .collect();

            if level.is_empty() {
                return Err(FlowError::CycleDetected);
            }

            for id in &level {
                in_degree.remove(id);
                for edge in self.colored_edges_from(id) {
                    if let Some(degree) = in_degree.get_mut(&edge.target) {
                        *degree -= 1;
                    }
                }
            }

            levels.push(level);
        }

        Ok(levels)
    }
}
