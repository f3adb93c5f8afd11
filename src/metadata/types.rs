//! Shapes returned by a [`MetadataProvider`](super::MetadataProvider).

use serde::{Deserialize, Serialize};

use crate::compile::ParameterTarget;

/// A column of a physical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub id: u64,
    pub name: String,
}

/// An output column of a saved query's last materialized result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
}

/// Output shape of a saved query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutput {
    Materialized(Vec<ColumnInfo>),
    /// The query exists but has never been run, so its columns are unknown.
    NotMaterialized,
}

impl QueryOutput {
    pub fn has_column(&self, name: &str) -> bool {
        match self {
            QueryOutput::Materialized(columns) => columns.iter().any(|c| c.name == name),
            QueryOutput::NotMaterialized => false,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        match self {
            QueryOutput::Materialized(columns) => columns.iter().map(|c| c.name.as_str()).collect(),
            QueryOutput::NotMaterialized => Vec::new(),
        }
    }
}

/// A parameter already compiled onto a saved query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameterInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    pub target: ParameterTarget,
}
