//! Application services for the aggflow engine
//!
//! The flow execution service drives level-parallel execution, the node
//! dispatcher maps node kinds to their execution routines, and the variable
//! binder resolves edge-fed inputs against the execution context.

/// Level-parallel flow execution
pub mod flow_execution_service;

/// Per-kind node execution routines
pub mod node_dispatcher;

/// Edge-fed input resolution
pub mod variable_binder;
