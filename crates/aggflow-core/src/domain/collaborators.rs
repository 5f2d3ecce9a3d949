//! Collaborator traits for the aggflow engine
//!
//! The engine consumes provider querying, response persistence and API-key
//! resolution as opaque collaborators. External crates implement these
//! traits; the engine never retries a collaborator call and treats the
//! response store as fire-and-forget.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::flow::NodeId;
use crate::domain::node_data::ProviderSpec;
use crate::error::FlowError;
use crate::types::{BoundValue, DataPacket};

/// Per-provider progress counts reported during a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryProgress {
    /// Responses received so far
    pub success: u32,
    /// Errors observed so far
    pub error: u32,
}

/// Callback receiving progress counts keyed by provider name
pub type ProgressCallback = Arc<dyn Fn(HashMap<String, QueryProgress>) + Send + Sync>;

/// What a query returned: provider responses plus a cache-file manifest
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// One entry per provider response
    pub responses: Vec<DataPacket>,
    /// Cache-file manifest keyed by cache entry name
    pub cache: serde_json::Map<String, serde_json::Value>,
}

/// A knowledge-base location extracted from `rag_knowledge_base` paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseRef {
    /// Top-level project folder
    pub project_folder: String,
    /// Folder identifier within the project
    pub folder_id: String,
    /// Per-document unique ids
    pub doc_uids: Vec<String>,
}

/// A language-model query on behalf of one prompt node
pub struct ProviderQuery {
    /// The prompt node issuing the query
    pub node_id: NodeId,
    /// Selected providers
    pub providers: Vec<ProviderSpec>,
    /// Generations requested per provider
    pub num_generations: u32,
    /// The unfilled prompt template
    pub template: String,
    /// Resolved values per template variable
    pub variables: HashMap<String, Vec<BoundValue>>,
    /// API keys by provider name
    pub api_keys: HashMap<String, String>,
    /// Optional progress callback
    pub progress: Option<ProgressCallback>,
}

/// A retrieval-augmented query on behalf of one prompt node
pub struct RetrievalQuery {
    /// The prompt node issuing the query
    pub node_id: NodeId,
    /// Selected retrieval stores
    pub stores: Vec<ProviderSpec>,
    /// The unfilled prompt template
    pub template: String,
    /// The knowledge base to retrieve from
    pub knowledge_base: KnowledgeBaseRef,
    /// Resolved values per template variable
    pub variables: HashMap<String, Vec<BoundValue>>,
    /// Optional progress callback
    pub progress: Option<ProgressCallback>,
}

/// Queries language-model and retrieval providers
///
/// Implementations own their timeout and retry policy; the engine issues
/// each call at most once.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Query the selected language-model providers
    async fn query_providers(&self, query: ProviderQuery) -> Result<QueryOutcome, FlowError>;

    /// Query the selected retrieval stores against a knowledge base
    async fn query_knowledge_base(&self, query: RetrievalQuery) -> Result<QueryOutcome, FlowError>;
}

/// Durable store for raw node responses
///
/// Writes are fire-and-forget: a failure is logged by the caller and never
/// aborts the run.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Persist a value under the given key
    async fn store(&self, key: &str, value: DataPacket) -> Result<(), FlowError>;
}

/// Resolves provider API keys when a prompt node supplies none
#[async_trait]
pub trait ApiKeyResolver: Send + Sync {
    /// Resolve provider name to secret
    async fn resolve(&self) -> Result<HashMap<String, String>, FlowError>;
}

/// Resolves API keys from conventional environment variables
///
/// Only variables that are actually set appear in the resolved map.
pub struct EnvKeyResolver {
    vars: Vec<(&'static str, &'static str)>,
}

impl EnvKeyResolver {
    /// Resolver over the conventional provider environment variables
    pub fn new() -> Self {
        Self {
            vars: vec![
                ("OpenAI", "OPENAI_API_KEY"),
                ("Anthropic", "ANTHROPIC_API_KEY"),
                ("Google", "GOOGLE_API_KEY"),
                ("HuggingFace", "HUGGINGFACE_API_KEY"),
                ("AzureOpenAI", "AZURE_OPENAI_KEY"),
                ("AzureOpenAI_Endpoint", "AZURE_OPENAI_ENDPOINT"),
                ("Together", "TOGETHER_API_KEY"),
            ],
        }
    }
}

impl Default for EnvKeyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiKeyResolver for EnvKeyResolver {
    async fn resolve(&self) -> Result<HashMap<String, String>, FlowError> {
        let mut keys = HashMap::new();
        for (name, var) in &self.vars {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    keys.insert(name.to_string(), value);
                }
            }
        }
        Ok(keys)
    }
}

/// In-memory collaborator implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;

    /// In-memory response store backed by a concurrent map
    #[derive(Debug, Default)]
    pub struct InMemoryResponseStore {
        entries: DashMap<String, DataPacket>,
    }

    impl InMemoryResponseStore {
        /// Create an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Read a stored value
        pub fn get(&self, key: &str) -> Option<DataPacket> {
            self.entries.get(key).map(|v| v.value().clone())
        }

        /// All stored keys
        pub fn keys(&self) -> Vec<String> {
            self.entries.iter().map(|e| e.key().clone()).collect()
        }

        /// Number of stored entries
        pub fn len(&self) -> usize {
            self.entries.len()
        }

        /// Whether the store is empty
        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }
    }

    #[async_trait]
    impl ResponseStore for InMemoryResponseStore {
        async fn store(&self, key: &str, value: DataPacket) -> Result<(), FlowError> {
            self.entries.insert(key.to_string(), value);
            Ok(())
        }
    }

    /// Key resolver returning a fixed map
    #[derive(Debug, Default)]
    pub struct StaticKeyResolver {
        keys: HashMap<String, String>,
    }

    impl StaticKeyResolver {
        /// Resolver with no keys
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a key to the resolved map
        pub fn with_key(mut self, name: &str, secret: &str) -> Self {
            self.keys.insert(name.to_string(), secret.to_string());
            self
        }
    }

    #[async_trait]
    impl ApiKeyResolver for StaticKeyResolver {
        async fn resolve(&self) -> Result<HashMap<String, String>, FlowError> {
            Ok(self.keys.clone())
        }
    }
}
