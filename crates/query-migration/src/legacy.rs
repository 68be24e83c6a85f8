//! Serde model of the legacy query-definition document.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::MigrationError;

/// Top-level legacy document: an ordered list of query groups.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyQueryDocument {
    /// Query groups in document order
    pub queries: Vec<LegacyQueryGroup>,
}

/// One legacy group: a named, categorized list of queries.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyQueryGroup {
    /// Group name, becomes the normalized description
    pub name: String,
    /// Category, folded into the normalized display name
    pub category: String,
    /// Queries in the group; never empty in well-formed input
    #[serde(rename = "queryList")]
    pub query_list: Vec<LegacyQueryItem>,
}

/// One legacy query entry.
///
/// Everything but `query` is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyQueryItem {
    /// The Cypher-like query text
    pub query: String,
    /// Optional display title
    #[serde(default)]
    pub title: Option<String>,
    /// Named parameters to inline as literal values
    #[serde(default)]
    pub props: Option<BTreeMap<String, String>>,
    /// Whether this is the group's final query
    #[serde(rename = "final", default)]
    pub is_final: bool,
    /// Legacy UI flag, carried through the parse but unused
    #[serde(default)]
    pub allow_collapse: bool,
    /// Legacy UI flag, carried through the parse but unused
    #[serde(default)]
    pub require_node_select: bool,
    /// Start node hint for multi-step queries
    #[serde(default)]
    pub start_node: Option<String>,
    /// End node hint for multi-step queries
    #[serde(default)]
    pub end_node: Option<String>,
}

/// Decode a document, failing with [`MigrationError::MalformedDocument`]
/// on any structural mismatch.
pub(crate) fn parse_document(data: &str) -> Result<LegacyQueryDocument, MigrationError> {
    Ok(serde_json::from_str(data)?)
}
