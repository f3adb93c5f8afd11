#[path = "../support/mod.rs"]
mod support;

use serde_json::json;
use support::CountingProvider;
use trellis::compile::{compile_dashboard_layout, compile_dashboard_parameters, CompileOptions};
use trellis::ids::SHORT_ID_LEN;
use trellis::metadata::{QueryParameterInfo, SnapshotMetadataProvider};
use trellis::params::{ParameterType, SectionId, StringOp, TemporalUnit};
use trellis::validation::{ErrorKind, Location, Stage};

fn sales_metadata() -> SnapshotMetadataProvider {
    SnapshotMetadataProvider::new().with_query(7, ["region"])
}

#[tokio::test]
async fn test_reserved_tab_name() {
    let provider = CountingProvider::new(sales_metadata());
    let raw = vec![
        json!({"name": "tab", "type": "string/="}),
        json!({"name": "Region", "type": "string/=",
               "values_source": {"type": "cross_query", "query_id": 7, "value_field": "region"}}),
    ];

    let failure = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::BusinessRules);
    assert_eq!(failure.kinds(), vec![ErrorKind::BusinessRuleViolation]);
    assert_eq!(failure.errors[0].name.as_deref(), Some("tab"));
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn test_reserved_name_is_checked_by_slug() {
    let provider = sales_metadata();
    let raw = vec![json!({"name": " Tab ", "type": "string/="})];

    let failure = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();
    assert!(failure.errors[0].message.contains("is reserved"));
}

#[tokio::test]
async fn test_empty_temporal_units_rejected_before_lookups() {
    let provider = CountingProvider::new(sales_metadata());
    let raw = vec![
        json!({"name": "Group By", "type": "temporal-unit", "temporal_units": []}),
        json!({"name": "Region", "type": "string/=",
               "values_source": {"type": "cross_query", "query_id": 7, "value_field": "region"}}),
    ];

    let failure = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::BusinessRules);
    assert_eq!(failure.errors.len(), 1);
    assert_eq!(failure.errors[0].location, Location::Parameter { index: 0 });
    assert!(failure.errors[0].message.contains("non-empty 'temporal_units'"));
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn test_temporal_unit_parameter() {
    let provider = sales_metadata();
    let raw = vec![json!({
        "name": "Group By",
        "type": "temporal-unit",
        "temporal_units": ["month", "quarter", "month"],
        "default": "quarter"
    })];

    let params = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();

    let param = &params[0];
    assert_eq!(param.section_id, SectionId::TemporalUnit);
    assert_eq!(
        param.temporal_units,
        Some(vec![TemporalUnit::Month, TemporalUnit::Quarter])
    );
    let json = serde_json::to_value(param).unwrap();
    assert_eq!(json["temporal_units"], json!(["month", "quarter"]));
    assert_eq!(json["default"], "quarter");
    assert_eq!(json["sectionId"], "temporal-unit");
}

#[tokio::test]
async fn test_temporal_unit_default_must_be_declared() {
    let provider = sales_metadata();
    let raw = vec![json!({
        "name": "Group By",
        "type": "temporal-unit",
        "temporal_units": ["month"],
        "default": "year"
    })];

    let failure = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        failure.errors[0].message,
        "default 'year' is not one of the declared temporal_units"
    );
}

#[tokio::test]
async fn test_generated_ids_are_short_alphanumeric() {
    let provider = sales_metadata();
    let raw = vec![
        json!({"name": "Date Range", "type": "date/range"}),
        json!({"name": "Region", "type": "string/=", "default": ["west"]}),
        json!({"name": "Order", "type": "id"}),
    ];

    let params = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();

    for param in &params {
        assert_eq!(param.id.len(), SHORT_ID_LEN);
        assert!(param.id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(param.target, None);
    }
    assert_ne!(params[0].id, params[1].id);
    assert_eq!(params[0].slug, "date_range");
    assert_eq!(params[2].section_id, SectionId::Id);
}

#[tokio::test]
async fn test_location_parameter() {
    let provider = sales_metadata();
    let raw = vec![json!({
        "name": "Country",
        "type": "location/starts-with",
        "values_source": {"type": "static", "values": ["Australia", "Austria"]}
    })];

    let params = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&params[0]).unwrap();

    assert_eq!(params[0].param_type, ParameterType::String(StringOp::StartsWith));
    assert_eq!(json["type"], "string/starts-with");
    assert_eq!(json["sectionId"], "location");
    assert_eq!(json["values_query_type"], "list");
    assert_eq!(json["values_source_type"], "static-list");
}

#[tokio::test]
async fn test_caller_ids_kept() {
    let provider = sales_metadata();
    let raw = vec![
        json!({"id": "d1", "name": "Date Range", "type": "date/range"}),
        json!({"name": "Region", "type": "string/="}),
    ];

    let params = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    assert_eq!(params[0].id, "d1");
    assert_ne!(params[1].id, "d1");
}

#[tokio::test]
async fn test_duplicate_caller_ids_rejected() {
    let provider = sales_metadata();
    let raw = vec![
        json!({"id": "d1", "name": "A", "type": "date/range"}),
        json!({"id": "d1", "name": "B", "type": "date/range"}),
    ];

    let failure = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();
    assert_eq!(failure.errors[0].message, "duplicate parameter id 'd1'");
    assert_eq!(failure.errors[0].location, Location::Parameter { index: 1 });
}

#[tokio::test]
async fn test_field_ref_forbidden_on_dashboard() {
    let provider = sales_metadata();
    let raw = vec![json!({
        "name": "Region",
        "type": "string/=",
        "field_ref": {"database_id": 1, "table_id": 2, "field_id": 3}
    })];

    let failure = compile_dashboard_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();
    assert_eq!(failure.stage, Stage::BusinessRules);
    assert!(failure.errors[0].message.contains("dashcard mappings"));
}

#[tokio::test]
async fn test_layout_merges_schema_errors() {
    let provider = CountingProvider::new(sales_metadata());
    let params = vec![json!({"name": "Region"})];
    let dashcards = vec![json!({"query_id": 7, "col": 0})];

    let failure = compile_dashboard_layout(&params, &dashcards, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::Schema);
    let locations: Vec<Location> = failure.errors.iter().map(|e| e.location).collect();
    assert_eq!(
        locations,
        vec![Location::Parameter { index: 0 }, Location::Dashcard { index: 0 }]
    );
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn test_layout_end_to_end() {
    let provider = sales_metadata().with_query_parameters(
        42,
        serde_json::from_value::<Vec<QueryParameterInfo>>(json!([{
            "id": "q-1",
            "name": "Date Filter",
            "slug": "date_filter",
            "target": ["dimension", ["template-tag", "date_filter"]]
        }]))
        .unwrap(),
    );
    let params = vec![json!({"id": "d1", "name": "Date Range", "type": "date/range"})];
    let dashcards = vec![json!({
        "card_id": 42, "col": 0, "row": 0, "size_x": 12, "size_y": 6,
        "parameter_mappings": [
            {"dashboard_parameter_name": "Date Range", "query_parameter_name": "date_filter"}
        ]
    })];

    let layout = compile_dashboard_layout(&params, &dashcards, &provider, CompileOptions::default())
        .await
        .unwrap();

    let json = serde_json::to_value(&layout).unwrap();
    assert_eq!(json["parameters"][0]["id"], "d1");
    assert_eq!(
        json["dashcards"][0],
        json!({
            "id": -1,
            "card_id": 42,
            "col": 0,
            "row": 0,
            "size_x": 12,
            "size_y": 6,
            "parameter_mappings": [{
                "card_id": 42,
                "parameter_id": "d1",
                "target": ["dimension", ["template-tag", "date_filter"]]
            }]
        })
    );
}
