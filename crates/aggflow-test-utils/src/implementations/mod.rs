//! Scripted and recording collaborator implementations

mod recording_response_store;
mod scripted_query_service;

pub use recording_response_store::RecordingResponseStore;
pub use scripted_query_service::{
    RecordedProviderQuery, RecordedRetrievalQuery, ScriptedQueryService,
};
