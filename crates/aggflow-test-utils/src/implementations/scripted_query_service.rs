use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use aggflow_core::{
    DataPacket, FlowError, ProviderQuery, QueryOutcome, QueryService, RetrievalQuery,
};

/// A provider query as seen by the scripted service
#[derive(Debug, Clone)]
pub struct RecordedProviderQuery {
    /// Querying node id
    pub node_id: String,
    /// Provider names in the query
    pub providers: Vec<String>,
    /// Requested generation count
    pub num_generations: u32,
    /// The unfilled template
    pub template: String,
    /// Bound variable texts by input name
    pub variables: HashMap<String, Vec<String>>,
    /// API keys by provider name
    pub api_keys: HashMap<String, String>,
}

/// A retrieval query as seen by the scripted service
#[derive(Debug, Clone)]
pub struct RecordedRetrievalQuery {
    /// Querying node id
    pub node_id: String,
    /// Retrieval store names in the query
    pub stores: Vec<String>,
    /// The unfilled template
    pub template: String,
    /// Project folder of the knowledge base
    pub project_folder: String,
    /// Folder identifier of the knowledge base
    pub folder_id: String,
    /// Per-document unique ids
    pub doc_uids: Vec<String>,
}

/// Query service returning scripted outcomes and recording every call
///
/// Without scripting, every provider query answers with a single
/// `"scripted response"` and an empty cache manifest.
#[derive(Default)]
pub struct ScriptedQueryService {
    outcomes: Mutex<HashMap<String, QueryOutcome>>,
    failing_nodes: Mutex<HashSet<String>>,
    provider_queries: Mutex<Vec<RecordedProviderQuery>>,
    retrieval_queries: Mutex<Vec<RecordedRetrievalQuery>>,
}

impl ScriptedQueryService {
    /// Service answering every query with the default response
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome returned for one node's queries
    pub fn with_outcome(self, node_id: &str, outcome: QueryOutcome) -> Self {
        self.outcomes.lock().insert(node_id.to_string(), outcome);
        self
    }

    /// Script a single text response for one node's queries
    pub fn with_response(self, node_id: &str, response: &str) -> Self {
        let outcome = QueryOutcome {
            responses: vec![DataPacket::from_string(response)],
            cache: serde_json::Map::new(),
        };
        self.with_outcome(node_id, outcome)
    }

    /// Make every query from one node fail
    pub fn failing_for(self, node_id: &str) -> Self {
        self.failing_nodes.lock().insert(node_id.to_string());
        self
    }

    /// Every recorded provider query, in call order
    pub fn provider_queries(&self) -> Vec<RecordedProviderQuery> {
        self.provider_queries.lock().clone()
    }

    /// Every recorded retrieval query, in call order
    pub fn retrieval_queries(&self) -> Vec<RecordedRetrievalQuery> {
        self.retrieval_queries.lock().clone()
    }

    /// Total number of queries of either kind
    pub fn total_queries(&self) -> usize {
        self.provider_queries.lock().len() + self.retrieval_queries.lock().len()
    }

    fn outcome_for(&self, node_id: &str) -> Result<QueryOutcome, FlowError> {
        if self.failing_nodes.lock().contains(node_id) {
            return Err(FlowError::node_execution(
                node_id,
                "scripted provider failure",
            ));
        }

        Ok(self
            .outcomes
            .lock()
            .get(node_id)
            .cloned()
            .unwrap_or_else(|| QueryOutcome {
                responses: vec![DataPacket::from_string("scripted response")],
                cache: serde_json::Map::new(),
            }))
    }
}

#[async_trait]
impl QueryService for ScriptedQueryService {
    async fn query_providers(&self, query: ProviderQuery) -> Result<QueryOutcome, FlowError> {
        let node_id = query.node_id.to_string();

        self.provider_queries.lock().push(RecordedProviderQuery {
            node_id: node_id.clone(),
            providers: query.providers.iter().map(|p| p.name.clone()).collect(),
            num_generations: query.num_generations,
            template: query.template.clone(),
            variables: query
                .variables
                .iter()
                .map(|(name, values)| {
                    (
                        name.clone(),
                        values.iter().map(|v| v.text().to_string()).collect(),
                    )
                })
                .collect(),
            api_keys: query.api_keys.clone(),
        });

        self.outcome_for(&node_id)
    }

    async fn query_knowledge_base(&self, query: RetrievalQuery) -> Result<QueryOutcome, FlowError> {
        let node_id = query.node_id.to_string();

        self.retrieval_queries.lock().push(RecordedRetrievalQuery {
            node_id: node_id.clone(),
            stores: query.stores.iter().map(|s| s.name.clone()).collect(),
            template: query.template.clone(),
            project_folder: query.knowledge_base.project_folder.clone(),
            folder_id: query.knowledge_base.folder_id.clone(),
            doc_uids: query.knowledge_base.doc_uids.clone(),
        });

        self.outcome_for(&node_id)
    }
}
