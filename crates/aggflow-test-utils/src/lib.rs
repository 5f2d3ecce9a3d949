//!
//! Aggflow Test Utils - Testing utilities for the aggflow engine
//!
//! Scripted collaborator implementations that record every call, plus a
//! builder for assembling test flows without hand-writing wire JSON.

#![forbid(unsafe_code)]

/// Scripted and recording collaborator implementations
pub mod implementations;

/// Flow assembly helpers
pub mod builders;

pub use builders::FlowBuilder;
pub use implementations::{
    RecordedProviderQuery, RecordedRetrievalQuery, RecordingResponseStore, ScriptedQueryService,
};
