//! Reference stage: confirms that fields and saved queries named by specs
//! exist on the host.
//!
//! Lookups are deduplicated by id and dispatched concurrently, bounded by
//! `max_concurrent`. Errors are reported in spec order once every lookup
//! has answered.

use std::collections::{BTreeSet, HashMap};

use futures::stream::{self, StreamExt};

use super::{CompileResult, Diagnostics, ParameterError, Stage};
use crate::metadata::{FieldInfo, MetadataProvider, MetadataResult, QueryOutput};
use crate::params::{ParameterSpec, ValuesSource};

/// Checks `field_ref` and cross-query value sources against a provider.
pub struct ReferenceValidator<'a, P: MetadataProvider + ?Sized> {
    provider: &'a P,
    max_concurrent: usize,
}

impl<'a, P: MetadataProvider + ?Sized> ReferenceValidator<'a, P> {
    pub fn new(provider: &'a P, max_concurrent: usize) -> Self {
        Self {
            provider,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Check every reference in `specs`, collecting all failures.
    pub async fn validate(&self, specs: &[ParameterSpec]) -> CompileResult<()> {
        let table_ids: BTreeSet<u64> = specs
            .iter()
            .filter_map(|s| s.field_ref.map(|f| f.table_id))
            .collect();
        let query_ids: BTreeSet<u64> = specs
            .iter()
            .filter_map(|s| match &s.values_source {
                Some(ValuesSource::CrossQuery { query_id, .. }) => Some(*query_id),
                _ => None,
            })
            .collect();

        tracing::debug!(
            tables = table_ids.len(),
            queries = query_ids.len(),
            "references stage"
        );

        let (tables, queries) = self.fetch(&table_ids, &query_ids).await;

        let mut diags = Diagnostics::new();
        for (index, spec) in specs.iter().enumerate() {
            if let Some(field_ref) = &spec.field_ref {
                if let Some(message) = check_field(&tables, field_ref.table_id, field_ref.field_id) {
                    diags.push(ParameterError::reference(index, &spec.name, message));
                }
            }

            if let Some(ValuesSource::CrossQuery {
                query_id,
                value_field,
                label_field,
            }) = &spec.values_source
            {
                let fields = std::iter::once(("value_field", value_field.as_str()))
                    .chain(label_field.as_deref().map(|l| ("label_field", l)));
                for message in check_query(&queries, *query_id, fields) {
                    diags.push(ParameterError::reference(index, &spec.name, message));
                }
            }
        }

        diags.finish(Stage::References)
    }

    /// Table and query lookups share one `max_concurrent` budget.
    async fn fetch(
        &self,
        table_ids: &BTreeSet<u64>,
        query_ids: &BTreeSet<u64>,
    ) -> (TableLookups, QueryLookups) {
        let provider = self.provider;
        let lookups = table_ids
            .iter()
            .copied()
            .map(Lookup::Table)
            .chain(query_ids.iter().copied().map(Lookup::Query));

        let fetched: Vec<Fetched> = stream::iter(lookups)
            .map(|lookup| async move {
                match lookup {
                    Lookup::Table(id) => Fetched::Table(id, provider.get_table_fields(id).await),
                    Lookup::Query(id) => Fetched::Query(id, provider.get_query_output_columns(id).await),
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut tables = HashMap::with_capacity(table_ids.len());
        let mut queries = HashMap::with_capacity(query_ids.len());
        for result in fetched {
            match result {
                Fetched::Table(id, fields) => {
                    tables.insert(id, fields);
                }
                Fetched::Query(id, output) => {
                    queries.insert(id, output);
                }
            }
        }
        (tables, queries)
    }
}

type TableLookups = HashMap<u64, MetadataResult<Vec<FieldInfo>>>;
type QueryLookups = HashMap<u64, MetadataResult<QueryOutput>>;

enum Lookup {
    Table(u64),
    Query(u64),
}

enum Fetched {
    Table(u64, MetadataResult<Vec<FieldInfo>>),
    Query(u64, MetadataResult<QueryOutput>),
}

fn check_field(
    tables: &TableLookups,
    table_id: u64,
    field_id: u64,
) -> Option<String> {
    match tables.get(&table_id) {
        Some(Ok(fields)) if fields.iter().any(|f| f.id == field_id) => None,
        Some(Ok(fields)) => {
            let ids: Vec<String> = fields.iter().map(|f| f.id.to_string()).collect();
            Some(format!(
                "field {} not found in table {} (available field ids: {})",
                field_id,
                table_id,
                ids.join(", ")
            ))
        }
        Some(Err(e)) => Some(format!("cannot access table {} for field_ref: {}", table_id, e)),
        None => Some(format!("table {} was not looked up", table_id)),
    }
}

fn check_query<'f>(
    queries: &QueryLookups,
    query_id: u64,
    fields: impl Iterator<Item = (&'static str, &'f str)>,
) -> Vec<String> {
    let output = match queries.get(&query_id) {
        Some(Ok(output)) => output,
        Some(Err(e)) => {
            return vec![format!("values_source query {} is not accessible: {}", query_id, e)]
        }
        None => return vec![format!("values_source query {} was not looked up", query_id)],
    };

    if *output == QueryOutput::NotMaterialized {
        return vec![format!(
            "values_source query {} has no result metadata; run it once so its output columns are known",
            query_id
        )];
    }

    fields
        .filter(|(_, column)| !output.has_column(column))
        .map(|(key, column)| {
            format!(
                "{} '{}' is not an output column of query {} (available: {})",
                key,
                column,
                query_id,
                output.column_names().join(", ")
            )
        })
        .collect()
}
