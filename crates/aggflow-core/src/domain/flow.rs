use serde::{Deserialize, Serialize};

/// Value object: Node ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(raw: &str) -> Self {
        NodeId(raw.to_string())
    }
}

/// The closed set of node kinds the engine knows how to execute
///
/// Unknown type tags are rejected when the graph is validated, before any
/// level runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Static text fields authored in the editor
    TextFields,
    /// Uploaded file references, passed through unchanged
    UploadFileFields,
    /// Splits one text into an ordered list of items
    Split,
    /// Joins a list of items into one text
    Join,
    /// Queries language-model / retrieval providers with a template
    Prompt,
}

impl NodeKind {
    /// Resolve a declared type tag to a node kind
    ///
    /// Accepts the aliases the authoring surface emits for the same kind.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "textfields" | "textFieldsNode" => Some(NodeKind::TextFields),
            "uploadfilefields" => Some(NodeKind::UploadFileFields),
            "split" => Some(NodeKind::Split),
            "join" => Some(NodeKind::Join),
            "prompt" | "promptNode" => Some(NodeKind::Prompt),
            _ => None,
        }
    }

    /// Canonical type tag for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::TextFields => "textfields",
            NodeKind::UploadFileFields => "uploadfilefields",
            NodeKind::Split => "split",
            NodeKind::Join => "join",
            NodeKind::Prompt => "prompt",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node as authored in the editor
///
/// Immutable for the duration of one execution. The `data` payload is
/// type-specific and parsed by the dispatcher (see
/// [`crate::domain::node_data`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id
    pub id: NodeId,

    /// Declared type tag
    #[serde(rename = "type")]
    pub node_type: String,

    /// Type-specific payload
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Edge payload carrying the dependency flag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeData {
    /// Whether this edge carries an execution-order dependency
    #[serde(default)]
    pub colored: bool,
}

/// A directed edge between two nodes
///
/// `target_handle` is the input name the target node expects;
/// `source_handle` is advisory. Only colored edges establish execution-order
/// dependencies; regular edges exist for non-scheduling concerns and are
/// ignored by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Edge id
    #[serde(default)]
    pub id: String,

    /// Source node id
    pub source: NodeId,

    /// Target node id
    pub target: NodeId,

    /// Advisory output name on the source node
    #[serde(rename = "sourceHandle", default)]
    pub source_handle: String,

    /// Input name on the target node
    #[serde(rename = "targetHandle", default)]
    pub target_handle: String,

    /// Edge payload
    #[serde(default)]
    pub data: EdgeData,
}

impl Edge {
    /// Whether this edge carries an execution-order dependency
    #[inline]
    pub fn is_colored(&self) -> bool {
        self.data.colored
    }
}

/// A flow as received from the authoring surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// All nodes in the flow
    pub nodes: Vec<Node>,

    /// All edges in the flow
    pub edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_kind_parse_aliases() {
        assert_eq!(NodeKind::parse("textfields"), Some(NodeKind::TextFields));
        assert_eq!(
            NodeKind::parse("textFieldsNode"),
            Some(NodeKind::TextFields)
        );
        assert_eq!(NodeKind::parse("prompt"), Some(NodeKind::Prompt));
        assert_eq!(NodeKind::parse("promptNode"), Some(NodeKind::Prompt));
        assert_eq!(NodeKind::parse("split"), Some(NodeKind::Split));
        assert_eq!(NodeKind::parse("join"), Some(NodeKind::Join));
        assert_eq!(
            NodeKind::parse("uploadfilefields"),
            Some(NodeKind::UploadFileFields)
        );
        assert_eq!(NodeKind::parse("vis"), None);
    }

    #[test]
    fn test_edge_colored_flag_from_wire_format() {
        let edge: Edge = serde_json::from_value(json!({
            "id": "e1",
            "source": "a",
            "target": "b",
            "sourceHandle": "out",
            "targetHandle": "name",
            "data": { "colored": true }
        }))
        .unwrap();

        assert!(edge.is_colored());
        assert_eq!(edge.target_handle, "name");
    }

    #[test]
    fn test_edge_defaults_to_regular() {
        let edge: Edge = serde_json::from_value(json!({
            "source": "a",
            "target": "b"
        }))
        .unwrap();

        assert!(!edge.is_colored());
        assert!(edge.target_handle.is_empty());
    }

    #[test]
    fn test_flow_deserializes_from_editor_json() {
        let flow: Flow = serde_json::from_value(json!({
            "nodes": [
                { "id": "t1", "type": "textfields", "data": { "fields": { "f1": "hello" } } },
                { "id": "p1", "type": "prompt", "data": { "prompt": "Say {f}" } }
            ],
            "edges": [
                { "id": "e1", "source": "t1", "target": "p1",
                  "sourceHandle": "out", "targetHandle": "f",
                  "data": { "colored": true } }
            ]
        }))
        .unwrap();

        assert_eq!(flow.nodes.len(), 2);
        assert_eq!(flow.edges.len(), 1);
        assert_eq!(flow.nodes[0].id, NodeId::from("t1"));
    }
}
