//! Metadata provider backed by a JSON snapshot of the host.
//!
//! ```json
//! {
//!   "tables":  { "2":  { "fields": [{ "id": 1, "name": "id" }] } },
//!   "queries": { "42": { "result_metadata": [{ "name": "region" }],
//!                        "parameters": [ ... ] } }
//! }
//! ```
//!
//! A query with a missing, null or empty `result_metadata` has never been
//! run and reports [`QueryOutput::NotMaterialized`].

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{MetadataError, MetadataProvider, MetadataResult};
use super::types::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TableEntry {
    #[serde(default)]
    fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct QueryEntry {
    #[serde(default)]
    result_metadata: Option<Vec<ColumnInfo>>,
    #[serde(default)]
    parameters: Vec<QueryParameterInfo>,
}

/// In-memory provider loaded from (or built like) a metadata snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadataProvider {
    #[serde(default)]
    tables: HashMap<u64, TableEntry>,
    #[serde(default)]
    queries: HashMap<u64, QueryEntry>,
}

impl SnapshotMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> MetadataResult<Self> {
        serde_json::from_str(json).map_err(MetadataError::Parse)
    }

    /// Read a snapshot file.
    pub async fn load(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MetadataError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let snapshot = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.display(),
            tables = snapshot.tables.len(),
            queries = snapshot.queries.len(),
            "loaded metadata snapshot"
        );
        Ok(snapshot)
    }

    /// Add a table with the given `(id, name)` fields.
    pub fn with_table<'a>(
        mut self,
        table_id: u64,
        fields: impl IntoIterator<Item = (u64, &'a str)>,
    ) -> Self {
        let fields = fields
            .into_iter()
            .map(|(id, name)| FieldInfo {
                id,
                name: name.to_string(),
            })
            .collect();
        self.tables.insert(table_id, TableEntry { fields });
        self
    }

    /// Add a saved query whose last run produced `columns`.
    pub fn with_query<'a>(mut self, query_id: u64, columns: impl IntoIterator<Item = &'a str>) -> Self {
        let columns = columns
            .into_iter()
            .map(|name| ColumnInfo {
                name: name.to_string(),
            })
            .collect();
        self.queries.entry(query_id).or_default().result_metadata = Some(columns);
        self
    }

    /// Add a saved query that has never been run.
    pub fn with_unmaterialized_query(mut self, query_id: u64) -> Self {
        self.queries.entry(query_id).or_default().result_metadata = None;
        self
    }

    /// Attach compiled parameters to a saved query (creating it if needed).
    pub fn with_query_parameters(
        mut self,
        query_id: u64,
        parameters: impl IntoIterator<Item = QueryParameterInfo>,
    ) -> Self {
        self.queries
            .entry(query_id)
            .or_default()
            .parameters
            .extend(parameters);
        self
    }
}

#[async_trait]
impl MetadataProvider for SnapshotMetadataProvider {
    async fn get_table_fields(&self, table_id: u64) -> MetadataResult<Vec<FieldInfo>> {
        self.tables
            .get(&table_id)
            .map(|t| t.fields.clone())
            .ok_or(MetadataError::TableNotFound(table_id))
    }

    async fn get_query_output_columns(&self, query_id: u64) -> MetadataResult<QueryOutput> {
        let query = self
            .queries
            .get(&query_id)
            .ok_or(MetadataError::QueryNotFound(query_id))?;

        Ok(match &query.result_metadata {
            Some(columns) if !columns.is_empty() => QueryOutput::Materialized(columns.clone()),
            _ => QueryOutput::NotMaterialized,
        })
    }

    async fn get_query_parameters(&self, query_id: u64) -> MetadataResult<Vec<QueryParameterInfo>> {
        self.queries
            .get(&query_id)
            .map(|q| q.parameters.clone())
            .ok_or(MetadataError::QueryNotFound(query_id))
    }
}
