//! Prompt template placeholders
//!
//! Templates reference inputs with `{name}` and `{=name}` tokens. Every
//! referenced name must be fed by a colored edge before a prompt node may
//! issue provider calls.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::flow::NodeId;
use crate::domain::graph::FlowGraph;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{=?([^{}]+)\}").expect("placeholder pattern is valid"))
}

/// Extract the placeholder names referenced by a template
///
/// Matches both `{name}` and `{=name}` tokens and returns the deduplicated,
/// trimmed names in first-seen order.
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in placeholder_pattern().captures_iter(template) {
        let name = caps[1].trim().to_string();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Placeholder names with no colored edge feeding the matching input
pub fn unbound_variables(template: &str, graph: &FlowGraph, node_id: &NodeId) -> Vec<String> {
    extract_variables(template)
        .into_iter()
        .filter(|name| !graph.has_colored_input(node_id, name))
        .collect()
}

/// Whether every placeholder in the template has a feeding colored edge
pub fn is_fully_bound(template: &str, graph: &FlowGraph, node_id: &NodeId) -> bool {
    unbound_variables(template, graph, node_id).is_empty()
}

/// Whether a field value still contains a provider-side deferred placeholder
///
/// Such values are not ready for binding and are dropped by the variable
/// binder.
pub fn has_deferred_placeholder(text: &str) -> bool {
    text.contains("{@") || text.contains("{=")
}

/// Escape braces so a text cannot be re-parsed as template placeholders
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "\\{").replace('}', "\\}")
}
