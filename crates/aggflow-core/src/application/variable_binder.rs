//! Edge-fed input resolution
//!
//! For a target node, the binder resolves each required input name to the
//! values produced by the colored edges feeding that input, reading source
//! results from the execution context.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::collaborators::KnowledgeBaseRef;
use crate::domain::execution_context::ExecutionContext;
use crate::domain::flow::{Edge, NodeId};
use crate::domain::graph::FlowGraph;
use crate::domain::template::has_deferred_placeholder;
use crate::types::{value_to_string, BoundValue, TaggedText};

/// Reserved input name carrying knowledge-base file paths
///
/// Always evaluated when wired, even if the prompt template never mentions
/// it.
pub const RAG_KNOWLEDGE_BASE: &str = "rag_knowledge_base";

/// Resolves node inputs from colored edges and the execution context
pub struct VariableBinder<'a> {
    graph: &'a FlowGraph,
    context: &'a ExecutionContext,
}

impl<'a> VariableBinder<'a> {
    /// Create a binder over a graph and the current execution context
    pub fn new(graph: &'a FlowGraph, context: &'a ExecutionContext) -> Self {
        Self { graph, context }
    }

    /// Resolve the given input names for a node
    ///
    /// The reserved `rag_knowledge_base` input is added whenever a colored
    /// edge feeds it, regardless of the caller's list. Inputs that resolve
    /// to zero values are absent from the map; consumers must treat absence
    /// as "no data", not as an error.
    pub fn bind(&self, node_id: &NodeId, names: &[&str]) -> HashMap<String, Vec<BoundValue>> {
        let mut wanted: Vec<&str> = names.to_vec();
        if !wanted.contains(&RAG_KNOWLEDGE_BASE)
            && self.graph.has_colored_input(node_id, RAG_KNOWLEDGE_BASE)
        {
            wanted.push(RAG_KNOWLEDGE_BASE);
        }

        let mut bag = HashMap::new();
        for name in wanted {
            let values: Vec<BoundValue> = self
                .graph
                .colored_edges_into(node_id)
                .iter()
                .filter(|edge| edge.target_handle == name)
                .flat_map(|edge| self.resolve_edge(edge, name))
                .collect();

            if !values.is_empty() {
                bag.insert(name.to_string(), values);
            }
        }

        debug!(node = %node_id, inputs = bag.len(), "bound node inputs");
        bag
    }

    /// Resolve every colored input of a node, keyed by input name in edge
    /// order
    pub fn bind_all(&self, node_id: &NodeId) -> Vec<(String, Vec<BoundValue>)> {
        self.graph
            .colored_input_handles(node_id)
            .into_iter()
            .filter_map(|handle| {
                let bag = self.bind(node_id, &[handle.as_str()]);
                bag.into_iter().next()
            })
            .collect()
    }

    fn resolve_edge(&self, edge: &Edge, name: &str) -> Vec<BoundValue> {
        let Some(result) = self.context.get(&edge.source) else {
            // The scheduler never dispatches a node before its colored
            // predecessors settle, so a missing result means the source was
            // not part of this run.
            warn!(source = %edge.source, target = %edge.target, "no result for edge source");
            return Vec::new();
        };

        match result.output.as_value() {
            serde_json::Value::Object(map) => {
                if let Ok(tagged) =
                    serde_json::from_value::<TaggedText>(serde_json::Value::Object(map.clone()))
                {
                    return vec![BoundValue::Tagged(tagged)];
                }

                if name == RAG_KNOWLEDGE_BASE {
                    // Knowledge-base fields are paths, taken as-is
                    map.values()
                        .map(|v| BoundValue::Plain(value_to_string(v)))
                        .collect()
                } else {
                    // Fields still holding deferred placeholders are
                    // provider-side variables, not ready values
                    map.values()
                        .map(value_to_string)
                        .filter(|v| !has_deferred_placeholder(v))
                        .map(BoundValue::Plain)
                        .collect()
                }
            }
            serde_json::Value::Array(items) => items.iter().map(item_to_bound).collect(),
            serde_json::Value::String(s) => vec![BoundValue::Plain(s.clone())],
            serde_json::Value::Null => Vec::new(),
            other => vec![BoundValue::Plain(other.to_string())],
        }
    }
}

fn item_to_bound(item: &serde_json::Value) -> BoundValue {
    if item.is_object() {
        if let Ok(tagged) = serde_json::from_value::<TaggedText>(item.clone()) {
            return BoundValue::Tagged(tagged);
        }
    }
    BoundValue::Plain(value_to_string(item))
}

/// Extract a knowledge-base reference from `rag_knowledge_base` path values
///
/// A path's first `/`-delimited segment is the project folder, the second is
/// the folder identifier, and the part after the last `-` in the third
/// segment is the per-document unique id. Malformed paths are skipped with a
/// warning rather than failing the node; `None` is returned only when no
/// path was usable.
pub fn knowledge_base_ref(values: &[BoundValue]) -> Option<KnowledgeBaseRef> {
    let mut project_folder = None;
    let mut folder_id = None;
    let mut doc_uids = Vec::new();

    for value in values {
        let path = value.text();
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() < 3 || parts[0].is_empty() || parts[1].is_empty() {
            warn!(path, "skipping malformed knowledge-base path");
            continue;
        }

        let uid = match parts[2].rsplit_once('-') {
            Some((_, uid)) if !uid.is_empty() => uid,
            _ => {
                warn!(path, "knowledge-base path has no document uid");
                continue;
            }
        };

        if project_folder.is_none() {
            project_folder = Some(parts[0].to_string());
            folder_id = Some(parts[1].to_string());
        }
        doc_uids.push(uid.to_string());
    }

    match (project_folder, folder_id) {
        (Some(project_folder), Some(folder_id)) => Some(KnowledgeBaseRef {
            project_folder,
            folder_id,
            doc_uids,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution_context::NodeOutput;
    use crate::domain::flow::{EdgeData, Flow, Node, NodeKind};
    use crate::types::DataPacket;
    use chrono::Utc;
    use serde_json::json;

    fn node(id: &str, node_type: &str) -> Node {
        Node {
            id: NodeId::from(id),
            node_type: node_type.to_string(),
            data: json!({}),
        }
    }

    fn colored_edge(id: &str, source: &str, target: &str, handle: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: NodeId::from(source),
            target: NodeId::from(target),
            source_handle: "out".to_string(),
            target_handle: handle.to_string(),
            data: EdgeData { colored: true },
        }
    }

    fn record(context: &ExecutionContext, id: &str, kind: NodeKind, value: serde_json::Value) {
        context
            .insert(NodeOutput {
                kind,
                output: DataPacket::new(value),
                node_id: NodeId::from(id),
                metadata: None,
                completed_at: Utc::now(),
                elapsed_ms: 0,
            })
            .unwrap();
    }

    #[test]
    fn test_bind_field_map_filters_deferred_placeholders() {
        let flow = Flow {
            nodes: vec![node("t", "textfields"), node("p", "prompt")],
            edges: vec![colored_edge("e1", "t", "p", "topic")],
        };
        let graph = FlowGraph::new(&flow).unwrap();
        let context = ExecutionContext::new();
        record(
            &context,
            "t",
            NodeKind::TextFields,
            json!({"f1": "ready", "f2": "still {@meta}", "f3": "still {=var}"}),
        );

        let binder = VariableBinder::new(&graph, &context);
        let bag = binder.bind(&NodeId::from("p"), &["topic"]);

        assert_eq!(
            bag.get("topic"),
            Some(&vec![BoundValue::Plain("ready".to_string())])
        );
    }

    #[test]
    fn test_bind_absent_input_is_missing_not_empty() {
        let flow = Flow {
            nodes: vec![node("t", "textfields"), node("p", "prompt")],
            edges: vec![colored_edge("e1", "t", "p", "topic")],
        };
        let graph = FlowGraph::new(&flow).unwrap();
        let context = ExecutionContext::new();

        let binder = VariableBinder::new(&graph, &context);
        let bag = binder.bind(&NodeId::from("p"), &["topic", "other"]);

        assert!(!bag.contains_key("topic"));
        assert!(!bag.contains_key("other"));
    }

    #[test]
    fn test_bind_collects_all_edges_for_one_input() {
        let flow = Flow {
            nodes: vec![
                node("t1", "textfields"),
                node("t2", "textfields"),
                node("p", "prompt"),
            ],
            edges: vec![
                colored_edge("e1", "t1", "p", "topic"),
                colored_edge("e2", "t2", "p", "topic"),
            ],
        };
        let graph = FlowGraph::new(&flow).unwrap();
        let context = ExecutionContext::new();
        record(&context, "t1", NodeKind::TextFields, json!({"f1": "a"}));
        record(&context, "t2", NodeKind::TextFields, json!({"f1": "b"}));

        let binder = VariableBinder::new(&graph, &context);
        let bag = binder.bind(&NodeId::from("p"), &["topic"]);

        assert_eq!(bag.get("topic").map(Vec::len), Some(2));
    }

    #[test]
    fn test_bind_array_of_tagged_items() {
        let flow = Flow {
            nodes: vec![node("s", "split"), node("j", "join")],
            edges: vec![colored_edge("e1", "s", "j", "items")],
        };
        let graph = FlowGraph::new(&flow).unwrap();
        let context = ExecutionContext::new();
        record(
            &context,
            "s",
            NodeKind::Split,
            json!([
                {"text": "a", "metadata": {}, "uid": "u1"},
                {"text": "b", "metadata": {}, "uid": "u2"}
            ]),
        );

        let binder = VariableBinder::new(&graph, &context);
        let bag = binder.bind(&NodeId::from("j"), &["items"]);
        let values = bag.get("items").unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].text(), "a");
        assert!(matches!(values[0], BoundValue::Tagged(_)));
    }

    #[test]
    fn test_bind_scalar_output_wraps_in_singleton() {
        let flow = Flow {
            nodes: vec![node("t", "textfields"), node("j", "join")],
            edges: vec![colored_edge("e1", "t", "j", "x")],
        };
        let graph = FlowGraph::new(&flow).unwrap();
        let context = ExecutionContext::new();
        record(&context, "t", NodeKind::TextFields, json!("scalar"));

        let binder = VariableBinder::new(&graph, &context);
        let bag = binder.bind(&NodeId::from("j"), &["x"]);

        assert_eq!(
            bag.get("x"),
            Some(&vec![BoundValue::Plain("scalar".to_string())])
        );
    }

    #[test]
    fn test_bind_adds_rag_input_when_wired() {
        let flow = Flow {
            nodes: vec![node("kb", "uploadfilefields"), node("p", "prompt")],
            edges: vec![colored_edge("e1", "kb", "p", RAG_KNOWLEDGE_BASE)],
        };
        let graph = FlowGraph::new(&flow).unwrap();
        let context = ExecutionContext::new();
        record(
            &context,
            "kb",
            NodeKind::UploadFileFields,
            // Deferred-looking values are not filtered on the rag input
            json!({"f1": "proj/iter 1/doc-abc", "f2": "{=x}"}),
        );

        let binder = VariableBinder::new(&graph, &context);
        let bag = binder.bind(&NodeId::from("p"), &[]);

        assert_eq!(bag.get(RAG_KNOWLEDGE_BASE).map(Vec::len), Some(2));
    }

    #[test]
    fn test_bind_all_groups_by_handle_in_edge_order() {
        let flow = Flow {
            nodes: vec![
                node("t1", "textfields"),
                node("t2", "textfields"),
                node("j", "join"),
            ],
            edges: vec![
                colored_edge("e1", "t1", "j", "first"),
                colored_edge("e2", "t2", "j", "second"),
            ],
        };
        let graph = FlowGraph::new(&flow).unwrap();
        let context = ExecutionContext::new();
        record(&context, "t1", NodeKind::TextFields, json!({"f1": "a"}));
        record(&context, "t2", NodeKind::TextFields, json!({"f1": "b"}));

        let binder = VariableBinder::new(&graph, &context);
        let inputs = binder.bind_all(&NodeId::from("j"));

        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].0, "first");
        assert_eq!(inputs[1].0, "second");
    }

    #[test]
    fn test_knowledge_base_ref_parses_paths() {
        let values = vec![
            BoundValue::Plain("proj one/iteration 2/doc-abc123".to_string()),
            BoundValue::Plain("proj one/iteration 2/report-def456".to_string()),
        ];

        let kb = knowledge_base_ref(&values).unwrap();
        assert_eq!(kb.project_folder, "proj one");
        assert_eq!(kb.folder_id, "iteration 2");
        assert_eq!(kb.doc_uids, vec!["abc123", "def456"]);
    }

    #[test]
    fn test_knowledge_base_ref_skips_malformed_paths() {
        let values = vec![
            BoundValue::Plain("not-a-path".to_string()),
            BoundValue::Plain("proj/iter/nouid".to_string()),
            BoundValue::Plain("proj/iter/doc-ok".to_string()),
        ];

        let kb = knowledge_base_ref(&values).unwrap();
        assert_eq!(kb.doc_uids, vec!["ok"]);
    }

    #[test]
    fn test_knowledge_base_ref_none_when_nothing_usable() {
        let values = vec![BoundValue::Plain("garbage".to_string())];
        assert!(knowledge_base_ref(&values).is_none());
    }
}
