//!
//! Aggflow Core - Graph execution engine for prompt-flow pipelines
//!
//! This crate executes a user-authored directed graph of processing nodes
//! (text sources, prompt templates, splitters, joiners) against one or more
//! language-model/retrieval backends. Execution order is derived from the
//! graph's dependency-carrying ("colored") edges: nodes are grouped into
//! levels with no dependencies among them and each level runs concurrently.
//!
//! The concrete provider clients, the response cache and API-key storage are
//! external collaborators reached through the traits in
//! [`domain::collaborators`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - flow models, graph analysis, transforms, collaborator traits
pub mod domain;

/// Application services - node dispatch and level-parallel flow execution
pub mod application;

/// Core value types
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use error::FlowError;
pub use types::{BoundValue, DataPacket, TaggedText};

pub use domain::collaborators::{
    ApiKeyResolver, EnvKeyResolver, KnowledgeBaseRef, ProgressCallback, ProviderQuery,
    QueryOutcome, QueryProgress, QueryService, ResponseStore, RetrievalQuery,
};
pub use domain::execution_context::{ExecutionContext, NodeOutput, NodeReport, NodeRunStatus};
pub use domain::flow::{Edge, EdgeData, Flow, Node, NodeId, NodeKind};
pub use domain::graph::FlowGraph;
pub use domain::node_data::ProviderSpec;

pub use application::flow_execution_service::{FlowExecutionService, RequiredResources};
pub use application::node_dispatcher::{NodeDispatcher, SPLIT_INPUT_HANDLE};
pub use application::variable_binder::{VariableBinder, RAG_KNOWLEDGE_BASE};
