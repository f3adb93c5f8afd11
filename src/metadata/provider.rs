//! MetadataProvider trait definition.
//!
//! The provider is the engine's only window onto the host: it answers
//! existence and shape questions about tables and saved queries and is never
//! asked to change anything.

use std::path::PathBuf;

use async_trait::async_trait;

use super::types::*;

/// Errors from metadata lookups.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("table {0} not found")]
    TableNotFound(u64),

    #[error("query {0} not found")]
    QueryNotFound(u64),

    /// The lookup itself failed (transport, permissions, ...).
    #[error("metadata lookup failed: {0}")]
    Unavailable(String),

    #[error("failed to read metadata snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata snapshot: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Read-only access to host metadata.
///
/// Implementations must be safe to call concurrently; a single compilation
/// issues its lookups in parallel.
///
/// # Example
///
/// ```ignore
/// use trellis::metadata::MetadataProvider;
///
/// async fn field_exists(provider: &impl MetadataProvider, table: u64, field: u64) -> bool {
///     match provider.get_table_fields(table).await {
///         Ok(fields) => fields.iter().any(|f| f.id == field),
///         Err(_) => false,
///     }
/// }
/// ```
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fields of a physical table.
    async fn get_table_fields(&self, table_id: u64) -> MetadataResult<Vec<FieldInfo>>;

    /// Output columns of a saved query, or `NotMaterialized` if it has none yet.
    async fn get_query_output_columns(&self, query_id: u64) -> MetadataResult<QueryOutput>;

    /// Parameters already compiled onto a saved query.
    async fn get_query_parameters(&self, query_id: u64) -> MetadataResult<Vec<QueryParameterInfo>>;
}

#[async_trait]
impl<T: MetadataProvider + ?Sized> MetadataProvider for std::sync::Arc<T> {
    async fn get_table_fields(&self, table_id: u64) -> MetadataResult<Vec<FieldInfo>> {
        (**self).get_table_fields(table_id).await
    }

    async fn get_query_output_columns(&self, query_id: u64) -> MetadataResult<QueryOutput> {
        (**self).get_query_output_columns(query_id).await
    }

    async fn get_query_parameters(&self, query_id: u64) -> MetadataResult<Vec<QueryParameterInfo>> {
        (**self).get_query_parameters(query_id).await
    }
}
