//! Per-kind node execution
//!
//! The dispatcher maps a node's kind to its execution routine and
//! materializes the node's output. Source nodes compute synchronously;
//! prompt nodes suspend on the query-service collaborator, the only
//! operation that may block for non-trivial time.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::collaborators::{
    ApiKeyResolver, ProgressCallback, ProviderQuery, QueryService, ResponseStore, RetrievalQuery,
};
use crate::domain::execution_context::{ExecutionContext, NodeOutput};
use crate::domain::flow::{NodeId, NodeKind};
use crate::domain::graph::{FlowGraph, GraphNode};
use crate::domain::node_data::{parse_node_data, FieldsData, JoinData, PromptData, SplitData};
use crate::domain::template::{extract_variables, unbound_variables};
use crate::domain::transforms::{join_texts, split_text, JoinFormat, SplitFormat};
use crate::error::FlowError;
use crate::types::{BoundValue, DataPacket, TaggedText};
use crate::application::variable_binder::{
    knowledge_base_ref, VariableBinder, RAG_KNOWLEDGE_BASE,
};

/// The single logical input of a split node
pub const SPLIT_INPUT_HANDLE: &str = "__input";

/// Maps node kinds to their execution routines
pub struct NodeDispatcher {
    query_service: Arc<dyn QueryService>,
    response_store: Arc<dyn ResponseStore>,
    key_resolver: Arc<dyn ApiKeyResolver>,
    progress: Option<ProgressCallback>,
}

impl NodeDispatcher {
    /// Create a dispatcher over the given collaborators
    pub fn new(
        query_service: Arc<dyn QueryService>,
        response_store: Arc<dyn ResponseStore>,
        key_resolver: Arc<dyn ApiKeyResolver>,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            query_service,
            response_store,
            key_resolver,
            progress,
        }
    }

    /// Execute one node and materialize its output
    pub async fn execute_node(
        &self,
        graph: &FlowGraph,
        context: &ExecutionContext,
        node_id: &NodeId,
    ) -> Result<NodeOutput, FlowError> {
        let node = graph.node(node_id).ok_or_else(|| {
            FlowError::InvalidGraph(format!("node not found: {}", node_id))
        })?;

        debug!(node = %node_id, kind = %node.kind, "executing node");
        let started = Instant::now();

        let (output, metadata) = match node.kind {
            NodeKind::TextFields => self.execute_text_fields(node)?,
            NodeKind::UploadFileFields => self.execute_upload_file_fields(node)?,
            NodeKind::Split => self.execute_split(graph, context, node).await?,
            NodeKind::Join => self.execute_join(graph, context, node)?,
            NodeKind::Prompt => self.execute_prompt(graph, context, node).await?,
        };

        Ok(NodeOutput {
            kind: node.kind,
            output,
            node_id: node_id.clone(),
            metadata,
            completed_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Text fields output their visible fields as a name → string map
    fn execute_text_fields(
        &self,
        node: &GraphNode,
    ) -> Result<(DataPacket, Option<serde_json::Value>), FlowError> {
        let data: FieldsData = parse_node_data(&node.id, &node.data)?;
        let output = DataPacket::from(&data.visible_fields())?;
        Ok((output, None))
    }

    /// Upload-file fields pass their field map through unchanged
    fn execute_upload_file_fields(
        &self,
        node: &GraphNode,
    ) -> Result<(DataPacket, Option<serde_json::Value>), FlowError> {
        let data: FieldsData = parse_node_data(&node.id, &node.data)?;
        let output = DataPacket::from(&data.raw_fields())?;
        Ok((output, None))
    }

    async fn execute_split(
        &self,
        graph: &FlowGraph,
        context: &ExecutionContext,
        node: &GraphNode,
    ) -> Result<(DataPacket, Option<serde_json::Value>), FlowError> {
        let data: SplitData = parse_node_data(&node.id, &node.data)?;
        let raw_format = data.split_format.ok_or_else(|| FlowError::MissingConfig {
            node_id: node.id.to_string(),
            message: "splitFormat".to_string(),
        })?;
        let format = SplitFormat::parse(&raw_format)
            .ok_or(FlowError::UnsupportedFormat(raw_format))?;

        let binder = VariableBinder::new(graph, context);
        let bag = binder.bind(&node.id, &[SPLIT_INPUT_HANDLE]);
        let input = bag
            .get(SPLIT_INPUT_HANDLE)
            .and_then(|values| values.first())
            .ok_or_else(|| {
                FlowError::node_execution(node.id.to_string(), "no input text for split node")
            })?;

        let inherited = input.metadata().cloned().unwrap_or_default();
        let items: Vec<TaggedText> = split_text(input.text(), format)
            .into_iter()
            .map(|text| TaggedText::new(text, inherited.clone()))
            .collect();

        let output = DataPacket::from(&items)?;
        self.store_result(&node.id, output.clone()).await;

        let metadata = serde_json::json!({
            "original_metadata": serde_json::Value::Object(inherited),
        });
        Ok((output, Some(metadata)))
    }

    fn execute_join(
        &self,
        graph: &FlowGraph,
        context: &ExecutionContext,
        node: &GraphNode,
    ) -> Result<(DataPacket, Option<serde_json::Value>), FlowError> {
        let data: JoinData = parse_node_data(&node.id, &node.data)?;
        // An absent format defaults to the numbered list; an unrecognized
        // one drops to the transform's first-item fallback.
        let format = match &data.format {
            None => Some(JoinFormat::NumList),
            Some(raw) => JoinFormat::parse(raw),
        };

        let binder = VariableBinder::new(graph, context);
        let mut texts = Vec::new();
        let mut preserved = serde_json::Map::new();
        for (_, values) in binder.bind_all(&node.id) {
            for value in values {
                if let BoundValue::Tagged(tagged) = &value {
                    if !tagged.metadata.is_empty() {
                        preserved.insert(
                            format!("input_{}", texts.len()),
                            serde_json::json!({ "metadata": tagged.metadata }),
                        );
                    }
                }
                texts.push(value.text().to_string());
            }
        }

        let joined = join_texts(&texts, format);
        let combined = TaggedText::new(joined, preserved.clone());

        let metadata = serde_json::json!({
            "joinFormat": format.map(|f| JoinFormat::as_str(&f)).unwrap_or("first-item"),
            "originalMetadata": serde_json::Value::Object(preserved),
        });
        Ok((DataPacket::from(&combined)?, Some(metadata)))
    }

    async fn execute_prompt(
        &self,
        graph: &FlowGraph,
        context: &ExecutionContext,
        node: &GraphNode,
    ) -> Result<(DataPacket, Option<serde_json::Value>), FlowError> {
        let data: PromptData = parse_node_data(&node.id, &node.data)?;
        let template = data.prompt.ok_or_else(|| FlowError::MissingConfig {
            node_id: node.id.to_string(),
            message: "prompt".to_string(),
        })?;

        if data.llms.is_empty() && data.rags.is_empty() {
            return Err(FlowError::MissingConfig {
                node_id: node.id.to_string(),
                message: "select at least one LLM or RAG provider".to_string(),
            });
        }

        // Validate bindings before any provider call is issued
        let missing = unbound_variables(&template, graph, &node.id);
        if !missing.is_empty() {
            return Err(FlowError::UnboundVariable {
                node_id: node.id.to_string(),
                missing,
            });
        }

        let names = extract_variables(&template);
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let binder = VariableBinder::new(graph, context);
        let mut variables = binder.bind(&node.id, &name_refs);

        let api_keys = match data.api_keys {
            Some(keys) => keys,
            None => self
                .key_resolver
                .resolve()
                .await
                .map_err(|e| FlowError::node_execution(node.id.to_string(), e.to_string()))?,
        };

        let mut responses = Vec::new();
        let mut cache = serde_json::Map::new();

        if !data.llms.is_empty() {
            let outcome = self
                .query_service
                .query_providers(ProviderQuery {
                    node_id: node.id.clone(),
                    providers: data.llms.clone(),
                    num_generations: data.num_generations,
                    template: template.clone(),
                    variables: variables.clone(),
                    api_keys: api_keys.clone(),
                    progress: self.progress.clone(),
                })
                .await
                .map_err(|e| FlowError::node_execution(node.id.to_string(), e.to_string()))?;

            responses.extend(outcome.responses);
            cache.extend(outcome.cache);
        }

        if !data.rags.is_empty() {
            let kb_values = variables.remove(RAG_KNOWLEDGE_BASE).ok_or_else(|| {
                FlowError::node_execution(
                    node.id.to_string(),
                    "retrieval requested but no knowledge base is wired",
                )
            })?;
            let knowledge_base = knowledge_base_ref(&kb_values).ok_or_else(|| {
                FlowError::node_execution(
                    node.id.to_string(),
                    "no usable knowledge-base path among the wired values",
                )
            })?;

            let outcome = self
                .query_service
                .query_knowledge_base(RetrievalQuery {
                    node_id: node.id.clone(),
                    stores: data.rags.clone(),
                    template: template.clone(),
                    knowledge_base,
                    variables: variables.clone(),
                    progress: self.progress.clone(),
                })
                .await
                .map_err(|e| FlowError::node_execution(node.id.to_string(), e.to_string()))?;

            responses.extend(outcome.responses);
            cache.extend(outcome.cache);
        }

        let output = DataPacket::from(&responses)?;
        let stored = DataPacket::new(serde_json::json!({
            "responses": output.as_value().clone(),
            "cache": serde_json::Value::Object(cache.clone()),
        }));
        self.store_result(&node.id, stored).await;

        let metadata = serde_json::json!({ "cache": serde_json::Value::Object(cache) });
        Ok((output, Some(metadata)))
    }

    /// Fire-and-forget write to the response store
    async fn store_result(&self, node_id: &NodeId, value: DataPacket) {
        let key = format!("{}.json", node_id);
        if let Err(e) = self.response_store.store(&key, value).await {
            warn!(node = %node_id, error = %e, "response store write failed");
        }
    }
}
