//! Domain layer for the aggflow engine
//!
//! Flow and graph models, the pure template and split/join transforms, the
//! per-run execution context, and the traits external collaborators
//! implement.

/// External collaborator traits (query service, response store, API keys)
pub mod collaborators;

/// Per-run store of node results
pub mod execution_context;

/// Flow wire model: nodes, edges, node kinds
pub mod flow;

/// Validated graph view with colored/regular edge channels
pub mod graph;

/// Typed per-kind node configuration payloads
pub mod node_data;

/// Prompt template placeholder extraction and binding checks
pub mod template;

/// Split and join text transforms
pub mod transforms;
