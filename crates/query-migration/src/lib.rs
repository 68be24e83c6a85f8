//! Legacy custom-query migration.
//!
//! Reads a legacy query-definition document (groups of Cypher queries keyed
//! by category), normalizes each group into the application's flat
//! saved-query record, and inserts the surviving records by running SQL
//! inside the database container. Multi-query groups are deliberately
//! skipped and reported rather than concatenated; see [`normalize_group`].

use std::path::{Path, PathBuf};

use container_engine::ContainerEngine;
use tracing::info;

mod inject;
mod legacy;
mod normalize;

pub use inject::{MigrationReport, MigrationTarget, QueryInjector};
pub use legacy::{LegacyQueryDocument, LegacyQueryGroup, LegacyQueryItem};
pub use normalize::{
    normalize_document, normalize_group, NormalizedBatch, NormalizedQuery, UNIMPLEMENTED,
};

/// Error types for the migration pipeline
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The legacy document could not be read from disk
    #[error("failed to read legacy query document {path}: {source}")]
    DocumentRead {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The legacy document does not decode into the documented shape
    #[error("malformed legacy query document: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    /// A group violates the well-formedness invariant (empty query list)
    #[error("malformed query group {group}: empty query list")]
    MalformedQueryItem {
        /// Offending group name
        group: String,
    },

    /// An insertion failed; the remaining batch was aborted
    #[error("injection of {query} failed: {detail}")]
    InjectionFailed {
        /// Display name of the failed query
        query: String,
        /// psql or engine-reported cause
        detail: String,
    },

    /// The credential-expiration update statement failed
    #[error("credential expiration update failed: {detail}")]
    ExpirationUpdateFailed {
        /// psql or engine-reported cause
        detail: String,
    },
}

/// Run the whole pipeline: read, parse, normalize, inject.
///
/// Injection is fail-fast — the first failed insert aborts the remaining
/// batch, so a partial, hard-to-diagnose query set is never left behind
/// silently. Re-running duplicates rows; the caller gates repeat runs.
pub async fn migrate(
    engine: &dyn ContainerEngine,
    target: &MigrationTarget,
    document_path: &Path,
) -> Result<MigrationReport, MigrationError> {
    let data = tokio::fs::read_to_string(document_path)
        .await
        .map_err(|source| MigrationError::DocumentRead {
            path: document_path.to_path_buf(),
            source,
        })?;
    let document = legacy::parse_document(&data)?;
    let batch = normalize_document(&document)?;
    info!(
        total = document.queries.len(),
        skipped = batch.skipped,
        "normalized legacy query document"
    );

    QueryInjector::new(engine, target).inject_all(&batch).await
}
