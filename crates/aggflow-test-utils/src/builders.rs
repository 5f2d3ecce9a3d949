//! Flow assembly helpers
//!
//! Builds the wire-format flows the engine receives from the authoring
//! surface, without hand-writing JSON in every test.

use serde_json::json;

use aggflow_core::{Edge, EdgeData, Flow, Node, NodeId};

/// Builder for test flows
#[derive(Default)]
pub struct FlowBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl FlowBuilder {
    /// Start an empty flow
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with an explicit type tag and data payload
    pub fn node(mut self, id: &str, node_type: &str, data: serde_json::Value) -> Self {
        self.nodes.push(Node {
            id: NodeId::from(id),
            node_type: node_type.to_string(),
            data,
        });
        self
    }

    /// Add a `textfields` node with the given fields
    pub fn text_fields(self, id: &str, fields: &[(&str, &str)]) -> Self {
        let fields: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect();
        self.node(id, "textfields", json!({ "fields": fields }))
    }

    /// Add a `textfields` node with some fields hidden
    pub fn text_fields_with_hidden(
        self,
        id: &str,
        fields: &[(&str, &str)],
        hidden: &[&str],
    ) -> Self {
        let field_map: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect();
        let visibility: serde_json::Map<String, serde_json::Value> = hidden
            .iter()
            .map(|name| (name.to_string(), json!(false)))
            .collect();
        self.node(
            id,
            "textfields",
            json!({ "fields": field_map, "fields_visibility": visibility }),
        )
    }

    /// Add an `uploadfilefields` node with the given file paths
    pub fn upload_file_fields(self, id: &str, fields: &[(&str, &str)]) -> Self {
        let fields: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect();
        self.node(id, "uploadfilefields", json!({ "fields": fields }))
    }

    /// Add a `split` node; pass `None` to omit the format
    pub fn split(self, id: &str, format: Option<&str>) -> Self {
        let data = match format {
            Some(format) => json!({ "splitFormat": format }),
            None => json!({}),
        };
        self.node(id, "split", data)
    }

    /// Add a `join` node; pass `None` to omit the format
    pub fn join(self, id: &str, format: Option<&str>) -> Self {
        let data = match format {
            Some(format) => json!({ "format": format }),
            None => json!({}),
        };
        self.node(id, "join", data)
    }

    /// Add a `prompt` node querying the given language-model providers
    pub fn prompt(self, id: &str, template: &str, llms: &[&str]) -> Self {
        let llms: Vec<serde_json::Value> =
            llms.iter().map(|name| json!({ "name": name })).collect();
        self.node(id, "prompt", json!({ "prompt": template, "llms": llms }))
    }

    /// Add a `prompt` node querying providers and retrieval stores
    pub fn prompt_with_rags(
        self,
        id: &str,
        template: &str,
        llms: &[&str],
        rags: &[&str],
    ) -> Self {
        let llms: Vec<serde_json::Value> =
            llms.iter().map(|name| json!({ "name": name })).collect();
        let rags: Vec<serde_json::Value> =
            rags.iter().map(|name| json!({ "name": name })).collect();
        self.node(
            id,
            "prompt",
            json!({ "prompt": template, "llms": llms, "rags": rags }),
        )
    }

    /// Wire a colored (dependency-carrying) edge
    pub fn colored_edge(self, source: &str, target: &str, handle: &str) -> Self {
        self.edge_with(source, target, handle, true)
    }

    /// Wire a regular (structural) edge
    pub fn regular_edge(self, source: &str, target: &str, handle: &str) -> Self {
        self.edge_with(source, target, handle, false)
    }

    fn edge_with(mut self, source: &str, target: &str, handle: &str, colored: bool) -> Self {
        let id = format!("e{}", self.edges.len() + 1);
        self.edges.push(Edge {
            id,
            source: NodeId::from(source),
            target: NodeId::from(target),
            source_handle: "out".to_string(),
            target_handle: handle.to_string(),
            data: EdgeData { colored },
        });
        self
    }

    /// Finish the flow
    pub fn build(self) -> Flow {
        Flow {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assembles_wire_shapes() {
        let flow = FlowBuilder::new()
            .text_fields("t", &[("f1", "hello")])
            .prompt("p", "Say {f}", &["gpt-4"])
            .colored_edge("t", "p", "f")
            .regular_edge("t", "p", "side")
            .build();

        assert_eq!(flow.nodes.len(), 2);
        assert_eq!(flow.edges.len(), 2);
        assert!(flow.edges[0].is_colored());
        assert!(!flow.edges[1].is_colored());
        assert_eq!(flow.edges[0].id, "e1");
        assert_eq!(flow.nodes[0].data["fields"]["f1"], "hello");
    }
}
