#[path = "../support/mod.rs"]
mod support;

use serde_json::{json, Value};
use support::CountingProvider;
use trellis::compile::{
    compile_dashboard_parameters, CompileOptions, CompiledParameter, ParameterTarget,
};
use trellis::link::{link_dashcards, ParameterMappingLinker, ResolvedMapping};
use trellis::metadata::{QueryParameterInfo, SnapshotMetadataProvider};
use trellis::params::schema::parse_dashcards;
use trellis::params::DashCardSpec;
use trellis::validation::{ErrorKind, Location, Stage};

fn query_param(id: &str, name: &str, target: ParameterTarget) -> QueryParameterInfo {
    QueryParameterInfo {
        id: id.to_string(),
        name: name.to_string(),
        slug: trellis::slug::base_slug(name),
        target,
    }
}

fn metadata() -> SnapshotMetadataProvider {
    SnapshotMetadataProvider::new()
        .with_query_parameters(
            42,
            [
                query_param("q1", "Date Filter", ParameterTarget::dimension("date_filter")),
                query_param("q2", "Region", ParameterTarget::dimension("region")),
            ],
        )
        .with_query_parameters(
            43,
            [query_param("q3", "status", ParameterTarget::variable("status"))],
        )
}

async fn dashboard_params(provider: &CountingProvider) -> Vec<CompiledParameter> {
    let raw = vec![
        json!({"id": "d1", "name": "Date Range", "type": "date/range"}),
        json!({"id": "d2", "name": "Region", "type": "string/="}),
        json!({"id": "d3", "name": "Status", "type": "string/="}),
    ];
    compile_dashboard_parameters(&raw, provider, CompileOptions::default())
        .await
        .unwrap()
}

fn cards(raw: Value) -> Vec<DashCardSpec> {
    parse_dashcards(raw.as_array().unwrap()).unwrap()
}

#[tokio::test]
async fn test_links_mapping_by_name() {
    let provider = CountingProvider::new(metadata());
    let params = dashboard_params(&provider).await;
    let dashcards = cards(json!([{
        "query_id": 42, "col": 0, "row": 0, "size_x": 12, "size_y": 6,
        "parameter_mappings": [
            {"dashboard_parameter_name": "Date Range", "query_parameter_name": "date_filter"}
        ]
    }]));

    let linked = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap();

    assert_eq!(
        linked[0].parameter_mappings,
        vec![ResolvedMapping {
            query_id: 42,
            parameter_id: "d1".to_string(),
            target: ParameterTarget::dimension("date_filter"),
        }]
    );
    assert_eq!(linked[0].id, -1);
}

#[tokio::test]
async fn test_each_query_fetched_once() {
    let provider = CountingProvider::new(metadata());
    let params = dashboard_params(&provider).await;
    let dashcards = cards(json!([
        {"query_id": 42, "col": 0, "row": 0, "size_x": 12, "size_y": 6,
         "parameter_mappings": [
            {"dashboard_parameter_name": "Date Range", "query_parameter_name": "date_filter"}
         ]},
        {"query_id": 42, "col": 12, "row": 0, "size_x": 12, "size_y": 6,
         "parameter_mappings": [
            {"dashboard_parameter_name": "Region", "query_parameter_name": "region"}
         ]},
        {"query_id": 43, "col": 0, "row": 6, "size_x": 24, "size_y": 4,
         "parameter_mappings": [
            {"dashboard_parameter_name": "d3", "query_parameter_name": "status"}
         ]},
        {"query_id": 44, "col": 0, "row": 10, "size_x": 24, "size_y": 4}
    ]));

    // "d3" is neither a name nor a slug of any dashboard parameter.
    let failure = ParameterMappingLinker::new(&provider, CompileOptions::default())
        .link(&dashcards, &params)
        .await
        .unwrap_err();
    assert_eq!(failure.errors.len(), 1);
    assert_eq!(provider.parameter_calls(), 2);

    let mut dashcards = dashcards;
    dashcards[2].parameter_mappings[0].dashboard_parameter_name = "Status".to_string();
    let linked = ParameterMappingLinker::new(&provider, CompileOptions::default())
        .link(&dashcards, &params)
        .await
        .unwrap();

    // Two more lookups: one per distinct query, none for the unmapped card.
    assert_eq!(provider.parameter_calls(), 4);
    assert_eq!(linked[1].parameter_mappings[0].parameter_id, "d2");
    assert_eq!(
        linked[2].parameter_mappings[0].target,
        ParameterTarget::variable("status")
    );
    assert!(linked[3].parameter_mappings.is_empty());
    let ids: Vec<i64> = linked.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![-1, -2, -3, -4]);
}

#[tokio::test]
async fn test_unresolved_names_reported_with_locations() {
    let provider = CountingProvider::new(metadata());
    let params = dashboard_params(&provider).await;
    let dashcards = cards(json!([
        {"id": 5, "query_id": 42, "col": 0, "row": 0, "size_x": 12, "size_y": 6,
         "parameter_mappings": [
            {"dashboard_parameter_name": "Date Range", "query_parameter_name": "date_filter"},
            {"dashboard_parameter_name": "Country", "query_parameter_name": "region"},
            {"dashboard_parameter_name": "Region", "query_parameter_name": "country"}
         ]}
    ]));

    let failure = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::Linking);
    assert!(failure
        .errors
        .iter()
        .all(|e| e.kind == ErrorKind::MappingUnresolved));
    assert_eq!(
        failure.errors[0].location,
        Location::Mapping { dashcard: 0, mapping: 1 }
    );
    assert_eq!(failure.errors[0].message, "no dashboard parameter named 'Country'");
    assert_eq!(
        failure.errors[1].location,
        Location::Mapping { dashcard: 0, mapping: 2 }
    );
    assert_eq!(
        failure.errors[1].message,
        "query 42 has no parameter named 'country' (available: date_filter, region)"
    );
}

#[tokio::test]
async fn test_query_parameter_matched_by_slug() {
    let provider = CountingProvider::new(metadata());
    let params = dashboard_params(&provider).await;
    let dashcards = cards(json!([{
        "query_id": 42, "col": 0, "row": 0, "size_x": 6, "size_y": 4,
        "parameter_mappings": [
            {"dashboard_parameter_name": "date_range", "query_parameter_name": "Date Filter"}
        ]
    }]));

    let linked = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap();
    assert_eq!(linked[0].parameter_mappings[0].parameter_id, "d1");
}

#[tokio::test]
async fn test_missing_query_reported_once_per_dashcard() {
    let provider = CountingProvider::new(metadata());
    let params = dashboard_params(&provider).await;
    let dashcards = cards(json!([{
        "query_id": 99, "col": 0, "row": 0, "size_x": 6, "size_y": 4,
        "parameter_mappings": [
            {"dashboard_parameter_name": "Date Range", "query_parameter_name": "date_filter"},
            {"dashboard_parameter_name": "Region", "query_parameter_name": "region"}
        ]
    }]));

    let failure = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::Linking);
    assert_eq!(failure.errors.len(), 1);
    assert_eq!(failure.errors[0].kind, ErrorKind::ReferenceNotFound);
    assert_eq!(failure.errors[0].location, Location::Dashcard { index: 0 });
    assert_eq!(
        failure.errors[0].message,
        "cannot read parameters of query 99: query 99 not found"
    );
}

#[tokio::test]
async fn test_layout_errors_stop_before_lookups() {
    let provider = CountingProvider::new(metadata());
    let params = dashboard_params(&provider).await;
    let dashcards = cards(json!([{
        "query_id": 42, "col": 20, "row": 0, "size_x": 6, "size_y": 4,
        "parameter_mappings": [
            {"dashboard_parameter_name": "Date Range", "query_parameter_name": "date_filter"}
        ]
    }]));

    let failure = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap_err();
    assert_eq!(failure.stage, Stage::BusinessRules);
    assert_eq!(failure.errors[0].message, "col 20 + size_x 6 exceeds the 24-column grid");
    assert_eq!(provider.parameter_calls(), 0);

    // A wider grid accepts the same placement.
    let options = CompileOptions::default().with_grid_width(26);
    assert!(link_dashcards(&dashcards, &params, &provider, options).await.is_ok());
}

#[tokio::test]
async fn test_spec_name_wins_over_other_display_names_and_slugs() {
    let provider = CountingProvider::new(metadata());
    let raw = vec![
        json!({"id": "first", "name": "Region", "type": "string/="}),
        json!({"id": "second", "name": "region", "type": "string/="}),
    ];
    let params = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    // "region" is both the second name and the first slug.
    assert_eq!(params[0].slug, "region");

    let dashcards = cards(json!([{
        "query_id": 42, "col": 0, "row": 0, "size_x": 12, "size_y": 6,
        "parameter_mappings": [
            {"dashboard_parameter_name": "region", "query_parameter_name": "region"}
        ]
    }]));
    let linked = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap();
    assert_eq!(linked[0].parameter_mappings[0].parameter_id, "second");

    let mut dashcards = dashcards;
    dashcards[0].parameter_mappings[0].dashboard_parameter_name = "Region".to_string();
    let linked = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap();
    assert_eq!(linked[0].parameter_mappings[0].parameter_id, "first");
}

#[tokio::test]
async fn test_shared_display_name_is_unresolved() {
    let provider = CountingProvider::new(metadata());
    let raw = vec![
        json!({"id": "n", "name": "north", "display_name": "Area", "type": "string/="}),
        json!({"id": "s", "name": "south", "display_name": "Area", "type": "string/="}),
    ];
    let params = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    let dashcards = cards(json!([{
        "query_id": 42, "col": 0, "row": 0, "size_x": 12, "size_y": 6,
        "parameter_mappings": [
            {"dashboard_parameter_name": "Area", "query_parameter_name": "region"},
            {"dashboard_parameter_name": "south", "query_parameter_name": "date_filter"}
        ]
    }]));

    let failure = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::Linking);
    assert_eq!(failure.errors.len(), 1);
    assert_eq!(failure.errors[0].kind, ErrorKind::MappingUnresolved);
    assert_eq!(
        failure.errors[0].location,
        Location::Mapping { dashcard: 0, mapping: 0 }
    );
    assert_eq!(
        failure.errors[0].message,
        "dashboard parameter name 'Area' is ambiguous (matches: north, south)"
    );
}

#[tokio::test]
async fn test_grid_overflow_reported_not_panicking() {
    let provider = CountingProvider::new(metadata());
    let params = dashboard_params(&provider).await;
    let dashcards = cards(json!([{
        "query_id": 42, "col": i64::MAX, "row": 0, "size_x": 1, "size_y": 4
    }]));

    let failure = link_dashcards(&dashcards, &params, &provider, CompileOptions::default())
        .await
        .unwrap_err();
    assert_eq!(failure.stage, Stage::BusinessRules);
    assert!(failure.errors[0].message.ends_with("exceeds the 24-column grid"));
}
