//! Level-parallel flow execution
//!
//! The service validates a flow, levels its colored dependency graph, and
//! runs each level's nodes concurrently. A level must settle completely
//! before the next one dispatches, so a node never runs before every colored
//! predecessor's result is in the execution context.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::domain::collaborators::{
    ApiKeyResolver, ProgressCallback, QueryService, ResponseStore,
};
use crate::domain::execution_context::ExecutionContext;
use crate::domain::flow::{Flow, NodeId, NodeKind};
use crate::domain::graph::FlowGraph;
use crate::domain::node_data::{parse_node_data, PromptData, SplitData};
use crate::domain::template::unbound_variables;
use crate::domain::transforms::SplitFormat;
use crate::application::node_dispatcher::NodeDispatcher;
use crate::error::FlowError;

/// The providers and knowledge stores a flow will need when executed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredResources {
    /// Language-model provider names referenced by prompt nodes
    pub provider_models: BTreeSet<String>,
    /// Retrieval store names referenced by prompt nodes
    pub knowledge_stores: BTreeSet<String>,
}

/// Service for executing flows against their collaborators
pub struct FlowExecutionService {
    query_service: Arc<dyn QueryService>,
    response_store: Arc<dyn ResponseStore>,
    key_resolver: Arc<dyn ApiKeyResolver>,
    progress: Option<ProgressCallback>,
}

impl FlowExecutionService {
    /// Create a new flow execution service
    pub fn new(
        query_service: Arc<dyn QueryService>,
        response_store: Arc<dyn ResponseStore>,
        key_resolver: Arc<dyn ApiKeyResolver>,
    ) -> Self {
        Self {
            query_service,
            response_store,
            key_resolver,
            progress: None,
        }
    }

    /// Attach a progress callback forwarded to provider queries
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Compute the parallel execution order without running anything
    ///
    /// Levels are ordered lists of node ids; nodes within a level have no
    /// colored-edge dependency among them. Validation failures (dangling
    /// edges, unknown node types, cycles) surface here exactly as they
    /// would from [`FlowExecutionService::execute`].
    pub fn determine_execution_order(&self, flow: &Flow) -> Result<Vec<Vec<NodeId>>, FlowError> {
        FlowGraph::new(flow)?.determine_execution_order()
    }

    /// The provider models and knowledge stores a flow references
    pub fn required_resources(&self, flow: &Flow) -> Result<RequiredResources, FlowError> {
        let graph = FlowGraph::new(flow)?;
        let mut resources = RequiredResources::default();

        for id in graph.node_ids() {
            let Some(node) = graph.node(id) else { continue };
            if node.kind != NodeKind::Prompt || node.data.is_null() {
                continue;
            }
            let data: PromptData = serde_json::from_value(node.data.clone()).map_err(|e| {
                FlowError::node_execution(id.to_string(), format!("invalid node data: {}", e))
            })?;

            resources
                .provider_models
                .extend(data.llms.iter().map(|spec| spec.name.clone()));
            resources
                .knowledge_stores
                .extend(data.rags.iter().map(|spec| spec.name.clone()));
        }

        Ok(resources)
    }

    /// Execute a flow and return the populated execution context
    ///
    /// Levels run strictly sequentially; within a level every node is
    /// spawned concurrently and the level is joined before the first failure
    /// is surfaced, so siblings of a failing node drain rather than being
    /// canceled. After a failed level no further level dispatches and the
    /// whole call reports failure; results already recorded by completed
    /// siblings stay in the (discarded) context.
    pub async fn execute(&self, flow: &Flow) -> Result<ExecutionContext, FlowError> {
        let graph = Arc::new(FlowGraph::new(flow)?);
        let levels = graph.determine_execution_order()?;
        validate_scheduled_nodes(&graph)?;

        info!(
            nodes = graph.node_ids().len(),
            scheduled = levels.iter().map(Vec::len).sum::<usize>(),
            levels = levels.len(),
            "starting flow execution"
        );

        let context = Arc::new(ExecutionContext::new());
        for level in &levels {
            for node_id in level {
                context.mark_pending(node_id);
            }
        }

        let dispatcher = Arc::new(NodeDispatcher::new(
            self.query_service.clone(),
            self.response_store.clone(),
            self.key_resolver.clone(),
            self.progress.clone(),
        ));

        for (index, level) in levels.iter().enumerate() {
            debug!(level = index, nodes = ?level, "dispatching level");

            let mut handles = Vec::with_capacity(level.len());
            for node_id in level {
                context.mark_running(node_id);

                let dispatcher = dispatcher.clone();
                let graph = graph.clone();
                let context = context.clone();
                let node_id = node_id.clone();

                handles.push(tokio::spawn(async move {
                    match dispatcher.execute_node(&graph, &context, &node_id).await {
                        Ok(output) => {
                            context.insert(output)?;
                            context.mark_completed(&node_id);
                            Ok(())
                        }
                        Err(e) => {
                            context.mark_failed(&node_id, e.to_string());
                            Err(e)
                        }
                    }
                }));
            }

            // Join the whole level so in-flight siblings drain, then surface
            // the first failure in level order.
            let results = join_all(handles).await;
            let mut first_error = None;
            for (node_id, joined) in level.iter().zip(results) {
                let result = match joined {
                    Ok(result) => result,
                    Err(join_error) => {
                        let e = FlowError::node_execution(
                            node_id.to_string(),
                            format!("node task panicked: {}", join_error),
                        );
                        context.mark_failed(node_id, e.to_string());
                        Err(e)
                    }
                };
                if let Err(e) = result {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }

            if let Some(e) = first_error {
                error!(level = index, error = %e, "level failed, aborting flow");
                return Err(e);
            }
        }

        info!(results = context.len(), "flow execution completed");
        Ok(Arc::try_unwrap(context).unwrap_or_else(|shared| (*shared).clone()))
    }
}

/// Preflight configuration checks over the nodes that will actually run
///
/// Missing configuration and unbound template variables abort the run before
/// any node executes; nodes outside the colored dependency graph are never
/// dispatched and therefore not checked.
fn validate_scheduled_nodes(graph: &FlowGraph) -> Result<(), FlowError> {
    for id in graph.dependency_nodes() {
        let Some(node) = graph.node(&id) else { continue };
        match node.kind {
            NodeKind::Split => {
                let data: SplitData = parse_node_data(&id, &node.data)?;
                let raw = data.split_format.ok_or_else(|| FlowError::MissingConfig {
                    node_id: id.to_string(),
                    message: "splitFormat".to_string(),
                })?;
                SplitFormat::parse(&raw).ok_or(FlowError::UnsupportedFormat(raw))?;
            }
            NodeKind::Prompt => {
                let data: PromptData = parse_node_data(&id, &node.data)?;
                let template = data.prompt.ok_or_else(|| FlowError::MissingConfig {
                    node_id: id.to_string(),
                    message: "prompt".to_string(),
                })?;
                if data.llms.is_empty() && data.rags.is_empty() {
                    return Err(FlowError::MissingConfig {
                        node_id: id.to_string(),
                        message: "select at least one LLM or RAG provider".to_string(),
                    });
                }
                let missing = unbound_variables(&template, graph, &id);
                if !missing.is_empty() {
                    return Err(FlowError::UnboundVariable {
                        node_id: id.to_string(),
                        missing,
                    });
                }
            }
            NodeKind::TextFields | NodeKind::UploadFileFields | NodeKind::Join => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collaborators::memory::{InMemoryResponseStore, StaticKeyResolver};
    use crate::domain::collaborators::{ProviderQuery, QueryOutcome, RetrievalQuery};
    use async_trait::async_trait;
    use serde_json::json;

    struct NullQueryService;

    #[async_trait]
    impl QueryService for NullQueryService {
        async fn query_providers(
            &self,
            _query: ProviderQuery,
        ) -> Result<QueryOutcome, FlowError> {
            Ok(QueryOutcome::default())
        }

        async fn query_knowledge_base(
            &self,
            _query: RetrievalQuery,
        ) -> Result<QueryOutcome, FlowError> {
            Ok(QueryOutcome::default())
        }
    }

    fn service() -> FlowExecutionService {
        FlowExecutionService::new(
            Arc::new(NullQueryService),
            Arc::new(InMemoryResponseStore::new()),
            Arc::new(StaticKeyResolver::new()),
        )
    }

    fn flow_from_json(value: serde_json::Value) -> Flow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_required_resources_collects_prompt_providers() {
        let flow = flow_from_json(json!({
            "nodes": [
                { "id": "t", "type": "textfields", "data": { "fields": { "f1": "x" } } },
                { "id": "p1", "type": "prompt",
                  "data": { "prompt": "a", "llms": [{ "name": "gpt-4" }, { "name": "claude" }] } },
                { "id": "p2", "type": "prompt",
                  "data": { "prompt": "b", "llms": [{ "name": "gpt-4" }],
                            "rags": [{ "name": "docs-index" }] } }
            ],
            "edges": []
        }));

        let resources = service().required_resources(&flow).unwrap();
        assert_eq!(
            resources.provider_models,
            BTreeSet::from(["gpt-4".to_string(), "claude".to_string()])
        );
        assert_eq!(
            resources.knowledge_stores,
            BTreeSet::from(["docs-index".to_string()])
        );
    }

    #[test]
    fn test_determine_execution_order_validates_first() {
        let flow = flow_from_json(json!({
            "nodes": [{ "id": "a", "type": "widget" }],
            "edges": []
        }));

        assert!(matches!(
            service().determine_execution_order(&flow),
            Err(FlowError::UnsupportedNodeType(_))
        ));
    }
}
