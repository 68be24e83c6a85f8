//! Legacy group to saved-query normalization.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{LegacyQueryDocument, LegacyQueryGroup, MigrationError};

/// Sentinel description marking a group normalization did not implement.
/// Records carrying it are filtered out before injection.
pub const UNIMPLEMENTED: &str = "Unimplemented";

/// The application's flat saved-query record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// Display name, `[category] groupName`
    pub name: String,
    /// Description (the legacy group name, or the sentinel)
    pub description: String,
    /// Query text with parameters inlined
    pub query: String,
}

impl NormalizedQuery {
    /// Whether this record survived normalization and may be injected.
    pub fn is_implemented(&self) -> bool {
        self.description != UNIMPLEMENTED
    }
}

/// Result of normalizing a whole document.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    /// Records eligible for injection
    pub queries: Vec<NormalizedQuery>,
    /// Multi-query groups that were skipped by policy
    pub skipped: usize,
}

/// Normalize every group in a document, filtering out sentinel records.
///
/// The skip count is part of the result so the policy gap is surfaced
/// rather than silently dropped.
pub fn normalize_document(
    document: &LegacyQueryDocument,
) -> Result<NormalizedBatch, MigrationError> {
    let mut queries = Vec::new();
    let mut skipped = 0;
    for group in &document.queries {
        let normalized = normalize_group(group)?;
        if normalized.is_implemented() {
            queries.push(normalized);
        } else {
            debug!(group = %group.name, "skipping multi-query group");
            skipped += 1;
        }
    }
    Ok(NormalizedBatch { queries, skipped })
}

/// Normalize one legacy group.
///
/// Single-query groups inline their parameter map and take the
/// `[category] name` display form. Groups with more than one query produce
/// a sentinel record: the legacy multi-step format has no agreed flat
/// equivalent, so they are skipped and counted instead of guessed at.
pub fn normalize_group(group: &LegacyQueryGroup) -> Result<NormalizedQuery, MigrationError> {
    match group.query_list.as_slice() {
        [] => Err(MigrationError::MalformedQueryItem {
            group: group.name.clone(),
        }),
        [item] => {
            let query = match &item.props {
                Some(props) => inline_props(&item.query, props),
                None => item.query.clone(),
            };
            Ok(NormalizedQuery {
                name: format!("[{}] {}", group.category, group.name),
                description: group.name.clone(),
                query,
            })
        }
        _ => Ok(NormalizedQuery {
            name: format!("Multi query not implemented yet: {}", group.name),
            description: UNIMPLEMENTED.to_string(),
            query: "//Unimplemented".to_string(),
        }),
    }
}

/// Replace every `$name` token with the single-quoted literal value from
/// the parameter map. Plain textual substitution over all occurrences.
fn inline_props(query: &str, props: &BTreeMap<String, String>) -> String {
    let mut result = query.to_string();
    for (name, value) in props {
        result = result.replace(&format!("${name}"), &format!("'{value}'"));
    }
    result
}
