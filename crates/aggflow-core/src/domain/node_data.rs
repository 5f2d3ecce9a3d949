//! Typed views over the per-kind `data` payload of a node
//!
//! The wire format keeps node data as free-form JSON; the dispatcher parses
//! it into these structs right before executing a node.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::flow::NodeId;
use crate::error::FlowError;
use crate::types::value_to_string;

/// Parse a node's data payload into its typed per-kind view
///
/// An absent payload parses as an empty object; a malformed one fails with
/// the owning node id attached.
pub fn parse_node_data<T: serde::de::DeserializeOwned>(
    id: &NodeId,
    data: &serde_json::Value,
) -> Result<T, FlowError> {
    let value = if data.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        data.clone()
    };
    serde_json::from_value(value).map_err(|e| {
        FlowError::node_execution(id.to_string(), format!("invalid node data: {}", e))
    })
}

/// Payload of `textfields` and `uploadfilefields` nodes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsData {
    /// Field name to value
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,

    /// Per-field visibility flag; a field is visible unless explicitly false
    #[serde(default)]
    pub fields_visibility: HashMap<String, bool>,
}

impl FieldsData {
    /// The fields whose visibility flag is not explicitly false, stringified
    pub fn visible_fields(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|(name, _)| self.fields_visibility.get(*name) != Some(&false))
            .map(|(name, value)| (name.clone(), value_to_string(value)))
            .collect()
    }

    /// All fields stringified, ignoring visibility
    pub fn raw_fields(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value_to_string(value)))
            .collect()
    }
}

/// Payload of a `split` node
#[derive(Debug, Clone, Deserialize)]
pub struct SplitData {
    /// The split format tag; required
    #[serde(rename = "splitFormat")]
    pub split_format: Option<String>,
}

/// Payload of a `join` node
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinData {
    /// The join format tag; defaults to the numbered list when absent
    #[serde(default)]
    pub format: Option<String>,
}

/// An opaque provider (LLM or retrieval store) selection
///
/// Only the name is meaningful to the engine; everything else is carried
/// through to the query service untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Provider name
    pub name: String,

    /// Provider-specific settings, passed through verbatim
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

fn default_generations() -> u32 {
    1
}

/// Payload of a `prompt` node
#[derive(Debug, Clone, Deserialize)]
pub struct PromptData {
    /// The prompt template with `{name}` / `{=name}` placeholders
    pub prompt: Option<String>,

    /// Selected language-model providers
    #[serde(default)]
    pub llms: Vec<ProviderSpec>,

    /// Selected retrieval stores
    #[serde(default)]
    pub rags: Vec<ProviderSpec>,

    /// Explicit API keys; when absent the resolver collaborator is consulted
    #[serde(rename = "apiKeys")]
    pub api_keys: Option<HashMap<String, String>>,

    /// Number of generations requested per provider
    #[serde(rename = "numGenerations", default = "default_generations")]
    pub num_generations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visible_fields_filters_hidden() {
        let data: FieldsData = serde_json::from_value(json!({
            "fields": { "f1": "alpha", "f2": "beta", "f3": "gamma" },
            "fields_visibility": { "f2": false, "f3": true }
        }))
        .unwrap();

        let visible = data.visible_fields();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible.get("f1").map(String::as_str), Some("alpha"));
        assert!(!visible.contains_key("f2"));
        assert_eq!(visible.get("f3").map(String::as_str), Some("gamma"));
    }

    #[test]
    fn test_raw_fields_ignores_visibility() {
        let data: FieldsData = serde_json::from_value(json!({
            "fields": { "f1": "a", "f2": "b" },
            "fields_visibility": { "f2": false }
        }))
        .unwrap();

        assert_eq!(data.raw_fields().len(), 2);
    }

    #[test]
    fn test_fields_stringify_non_string_values() {
        let data: FieldsData = serde_json::from_value(json!({
            "fields": { "n": 42 }
        }))
        .unwrap();

        assert_eq!(data.visible_fields().get("n").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_provider_spec_keeps_extra_settings() {
        let spec: ProviderSpec = serde_json::from_value(json!({
            "name": "gpt-4",
            "temperature": 0.2,
            "base_model": "gpt-4"
        }))
        .unwrap();

        assert_eq!(spec.name, "gpt-4");
        assert_eq!(spec.settings["temperature"], json!(0.2));
    }

    #[test]
    fn test_prompt_data_defaults() {
        let data: PromptData = serde_json::from_value(json!({
            "prompt": "Hello {name}"
        }))
        .unwrap();

        assert!(data.llms.is_empty());
        assert!(data.rags.is_empty());
        assert!(data.api_keys.is_none());
        assert_eq!(data.num_generations, 1);
    }

    #[test]
    fn test_split_data_without_format() {
        let data: SplitData = serde_json::from_value(json!({})).unwrap();
        assert!(data.split_format.is_none());
    }
}
