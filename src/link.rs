//! Dashcard parameter mapping linker.
//!
//! Dashboard parameters and each query's own parameters live in separate
//! namespaces. A dashcard mapping names one parameter from each; linking
//! resolves both names against already-compiled parameter sets and emits the
//! id-addressed triple the host persists.
//!
//! ```text
//!  dashboard params ─┐
//!                    ├─▶ {dashboard_parameter_name, query_parameter_name}
//!  query N params ───┘         │
//!   (provider, once per N)     ▼
//!                     {card_id: N, parameter_id, target}
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::compile::{CompileOptions, CompiledParameter, ParameterTarget};
use crate::metadata::{MetadataProvider, MetadataResult, QueryParameterInfo};
use crate::params::DashCardSpec;
use crate::validation::{CompileResult, Diagnostics, ErrorKind, Location, ParameterError, Stage};

/// A mapping resolved to ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMapping {
    #[serde(rename = "card_id")]
    pub query_id: u64,
    /// Id of the dashboard parameter.
    pub parameter_id: String,
    /// Target of the query parameter.
    pub target: ParameterTarget,
}

/// A dashcard ready for the host's dashboard update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedDashCard {
    /// Existing id, or a negative placeholder for a new placement.
    pub id: i64,
    #[serde(rename = "card_id")]
    pub query_id: u64,
    pub col: i64,
    pub row: i64,
    pub size_x: i64,
    pub size_y: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_tab_id: Option<i64>,
    pub parameter_mappings: Vec<ResolvedMapping>,
}

/// Resolves dashcard mappings against compiled dashboard parameters and the
/// provider's view of each query's parameters.
pub struct ParameterMappingLinker<'a, P: MetadataProvider + ?Sized> {
    provider: &'a P,
    options: CompileOptions,
}

impl<'a, P: MetadataProvider + ?Sized> ParameterMappingLinker<'a, P> {
    pub fn new(provider: &'a P, options: CompileOptions) -> Self {
        Self { provider, options }
    }

    /// Check the layout, then resolve every mapping on every dashcard.
    ///
    /// Each distinct query is fetched at most once per call.
    pub async fn link(
        &self,
        dashcards: &[DashCardSpec],
        dashboard_params: &[CompiledParameter],
    ) -> CompileResult<Vec<LinkedDashCard>> {
        check_layout(dashcards, self.options.grid_width)?;

        let query_ids: BTreeSet<u64> = dashcards
            .iter()
            .filter(|card| !card.parameter_mappings.is_empty())
            .map(|card| card.query_id)
            .collect();
        tracing::debug!(
            dashcards = dashcards.len(),
            queries = query_ids.len(),
            "linking stage"
        );
        let query_params = self.fetch_query_parameters(&query_ids).await;

        let mut diags = Diagnostics::new();
        let mut resolved: Vec<Vec<ResolvedMapping>> = Vec::with_capacity(dashcards.len());

        for (card_index, card) in dashcards.iter().enumerate() {
            let mut mappings = Vec::with_capacity(card.parameter_mappings.len());
            if card.parameter_mappings.is_empty() {
                resolved.push(mappings);
                continue;
            }

            let known = match query_params.get(&card.query_id) {
                Some(Ok(params)) => Some(params.as_slice()),
                Some(Err(e)) => {
                    diags.push(ParameterError::new(
                        ErrorKind::ReferenceNotFound,
                        Location::Dashcard { index: card_index },
                        None,
                        format!("cannot read parameters of query {}: {}", card.query_id, e),
                    ));
                    None
                }
                None => None,
            };

            for (mapping_index, mapping) in card.parameter_mappings.iter().enumerate() {
                let dashboard_param =
                    match find_dashboard_parameter(dashboard_params, &mapping.dashboard_parameter_name) {
                        Ok(param) => Some(param),
                        Err(message) => {
                            diags.push(ParameterError::unresolved(
                                card_index,
                                mapping_index,
                                &mapping.dashboard_parameter_name,
                                message,
                            ));
                            None
                        }
                    };

                // Fetch failures were reported once for the whole dashcard.
                let Some(known) = known else { continue };
                let query_param = find_query_parameter(known, &mapping.query_parameter_name);
                if query_param.is_none() {
                    let available: Vec<&str> = known.iter().map(|p| p.target.tag_name()).collect();
                    diags.push(ParameterError::unresolved(
                        card_index,
                        mapping_index,
                        &mapping.query_parameter_name,
                        format!(
                            "query {} has no parameter named '{}' (available: {})",
                            card.query_id,
                            mapping.query_parameter_name,
                            available.join(", ")
                        ),
                    ));
                }

                if let (Some(dashboard_param), Some(query_param)) = (dashboard_param, query_param) {
                    mappings.push(ResolvedMapping {
                        query_id: card.query_id,
                        parameter_id: dashboard_param.id.clone(),
                        target: query_param.target.clone(),
                    });
                }
            }
            resolved.push(mappings);
        }

        diags.finish(Stage::Linking)?;

        let mut placeholder_ids = PlaceholderIds::new(dashcards);
        let linked: Vec<LinkedDashCard> = dashcards
            .iter()
            .zip(resolved)
            .map(|(card, parameter_mappings)| LinkedDashCard {
                id: card.id.unwrap_or_else(|| placeholder_ids.next()),
                query_id: card.query_id,
                col: card.col,
                row: card.row,
                size_x: card.size_x,
                size_y: card.size_y,
                dashboard_tab_id: card.dashboard_tab_id,
                parameter_mappings,
            })
            .collect();

        tracing::info!(
            dashcards = linked.len(),
            mappings = linked.iter().map(|c| c.parameter_mappings.len()).sum::<usize>(),
            "linked dashcards"
        );
        Ok(linked)
    }

    async fn fetch_query_parameters(
        &self,
        ids: &BTreeSet<u64>,
    ) -> HashMap<u64, MetadataResult<Vec<QueryParameterInfo>>> {
        let provider = self.provider;
        stream::iter(ids.iter().copied())
            .map(|id| async move { (id, provider.get_query_parameters(id).await) })
            .buffer_unordered(self.options.max_concurrent_lookups.max(1))
            .collect()
            .await
    }
}

/// Convenience wrapper over [`ParameterMappingLinker::link`].
pub async fn link_dashcards<P: MetadataProvider + ?Sized>(
    dashcards: &[DashCardSpec],
    dashboard_params: &[CompiledParameter],
    provider: &P,
    options: CompileOptions,
) -> CompileResult<Vec<LinkedDashCard>> {
    ParameterMappingLinker::new(provider, options)
        .link(dashcards, dashboard_params)
        .await
}

/// Dashboard parameters are addressed by key first. Display names and slugs
/// are a fallback and must pick out exactly one parameter.
fn find_dashboard_parameter<'p>(
    params: &'p [CompiledParameter],
    name: &str,
) -> Result<&'p CompiledParameter, String> {
    if let Some(param) = params.iter().find(|p| p.key == name) {
        return Ok(param);
    }
    let matches: Vec<&CompiledParameter> = params
        .iter()
        .filter(|p| p.name == name || p.slug == name)
        .collect();
    match matches.as_slice() {
        [param] => Ok(*param),
        [] => Err(format!("no dashboard parameter named '{}'", name)),
        _ => {
            let keys: Vec<&str> = matches.iter().map(|p| p.key.as_str()).collect();
            Err(format!(
                "dashboard parameter name '{}' is ambiguous (matches: {})",
                name,
                keys.join(", ")
            ))
        }
    }
}

/// Query parameters are addressed by template-tag name, display name or slug.
fn find_query_parameter<'p>(params: &'p [QueryParameterInfo], name: &str) -> Option<&'p QueryParameterInfo> {
    params
        .iter()
        .find(|p| p.target.tag_name() == name)
        .or_else(|| params.iter().find(|p| p.name == name || p.slug == name))
}

/// Grid placement and per-dashcard mapping checks.
fn check_layout(dashcards: &[DashCardSpec], grid_width: i64) -> CompileResult<()> {
    let mut diags = Diagnostics::new();
    let mut seen_ids = HashSet::new();

    for (index, card) in dashcards.iter().enumerate() {
        let mut error = |message: String| {
            diags.push(ParameterError::new(
                ErrorKind::BusinessRuleViolation,
                Location::Dashcard { index },
                None,
                message,
            ))
        };

        if let Some(id) = card.id {
            if !seen_ids.insert(id) {
                error(format!("duplicate dashcard id {}", id));
            }
        }
        if card.col < 0 || card.row < 0 {
            error(format!("position ({}, {}) must not be negative", card.col, card.row));
        }
        if card.size_x < 1 || card.size_y < 1 {
            error(format!(
                "size {}x{} must be at least 1x1",
                card.size_x, card.size_y
            ));
        }
        if card.col.checked_add(card.size_x).map_or(true, |end| end > grid_width) {
            error(format!(
                "col {} + size_x {} exceeds the {}-column grid",
                card.col, card.size_x, grid_width
            ));
        }

        let mut mapped = HashMap::new();
        for (mapping_index, mapping) in card.parameter_mappings.iter().enumerate() {
            if let Some(first) = mapped.insert(mapping.dashboard_parameter_name.as_str(), mapping_index) {
                error(format!(
                    "dashboard parameter '{}' is mapped twice (mappings {} and {})",
                    mapping.dashboard_parameter_name, first, mapping_index
                ));
            }
        }
    }

    diags.finish(Stage::BusinessRules)
}

/// Hands out `-1, -2, ...` for new dashcards, skipping ids the caller used.
struct PlaceholderIds {
    next: i64,
    taken: HashSet<i64>,
}

impl PlaceholderIds {
    fn new(dashcards: &[DashCardSpec]) -> Self {
        Self {
            next: -1,
            taken: dashcards.iter().filter_map(|c| c.id).collect(),
        }
    }

    fn next(&mut self) -> i64 {
        while self.taken.contains(&self.next) {
            self.next -= 1;
        }
        let id = self.next;
        self.next -= 1;
        id
    }
}
