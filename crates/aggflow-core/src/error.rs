use thiserror::Error;

/// Core error type for the aggflow engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The graph references a node that does not exist, or is otherwise malformed
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// The colored dependency graph contains a cycle
    #[error("Cycle detected in the colored dependency graph")]
    CycleDetected,

    /// A node declares a type the engine does not know
    #[error("Unsupported node type: {0}")]
    UnsupportedNodeType(String),

    /// A node is missing configuration it cannot run without
    #[error("Missing configuration for node {node_id}: {message}")]
    MissingConfig {
        /// Id of the node with the missing configuration
        node_id: String,
        /// What is missing
        message: String,
    },

    /// A prompt template references variables with no feeding colored edge
    #[error("Node {node_id} has unbound template variables: {missing:?}")]
    UnboundVariable {
        /// Id of the prompt node
        node_id: String,
        /// Placeholder names with no feeding edge
        missing: Vec<String>,
    },

    /// A split or join node was configured with an unknown format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A node failed while executing
    #[error("Node {node_id} failed: {message}")]
    NodeExecution {
        /// Id of the failing node
        node_id: String,
        /// Failure description, usually from a collaborator
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FlowError {
    /// Wrap a collaborator or runtime failure with the originating node id
    pub fn node_execution(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::NodeExecution {
            node_id: node_id.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}
