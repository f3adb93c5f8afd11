#[path = "../support/mod.rs"]
mod support;

use serde_json::json;
use support::CountingProvider;
use trellis::compile::{compile_query_parameters, CompileOptions, ParameterTarget};
use trellis::metadata::SnapshotMetadataProvider;
use trellis::validation::{ErrorKind, Location, Stage};
use uuid::Uuid;

fn orders_metadata() -> SnapshotMetadataProvider {
    SnapshotMetadataProvider::new()
        .with_table(2, [(1, "id"), (2, "customer_name"), (4, "created_at")])
        .with_query(7, ["region", "region_label"])
        .with_unmaterialized_query(8)
}

#[tokio::test]
async fn test_static_dropdown_category() {
    let provider = CountingProvider::new(orders_metadata());
    let raw = vec![json!({
        "name": "order_status",
        "type": "category",
        "default": "pending",
        "ui_widget": "dropdown",
        "values_source": {"type": "static", "values": ["pending", "shipped"]}
    })];

    let compiled = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();

    let param = &compiled.parameters[0];
    assert_eq!(param.target, Some(ParameterTarget::variable("order_status")));
    assert_eq!(param.values_source_type, Some("static-list"));
    assert_eq!(
        param.values_source_config,
        Some(json!({"values": [["pending"], ["shipped"]]}))
    );

    let json = serde_json::to_value(&compiled).unwrap();
    let tag = &json["template-tags"]["order_status"];
    assert_eq!(tag["type"], "text");
    assert_eq!(tag["default"], "pending");
    assert!(tag.get("widget-type").is_none());
    assert_eq!(json["parameters"][0]["values_query_type"], "list");

    // Nothing to look up.
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn test_missing_field_is_one_reference_error() {
    let provider = CountingProvider::new(SnapshotMetadataProvider::new().with_table(2, [(1, "id"), (2, "status")]));
    let raw = vec![
        json!({"name": "status", "type": "category"}),
        json!({
            "name": "customer",
            "type": "string/=",
            "field_ref": {"database_id": 1, "table_id": 2, "field_id": 3}
        }),
    ];

    let failure = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::References);
    assert_eq!(failure.errors.len(), 1);
    let error = &failure.errors[0];
    assert_eq!(error.kind, ErrorKind::ReferenceNotFound);
    assert_eq!(error.location, Location::Parameter { index: 1 });
    assert_eq!(error.name.as_deref(), Some("customer"));
    assert_eq!(
        error.message,
        "field 3 not found in table 2 (available field ids: 1, 2)"
    );
}

#[tokio::test]
async fn test_parameter_and_tag_share_ids() {
    let provider = orders_metadata();
    let raw = vec![
        json!({"name": "status", "type": "category"}),
        json!({"name": "qty", "type": "number/="}),
        json!({"name": "created", "type": "date/range",
               "field_ref": {"database_id": 1, "table_id": 2, "field_id": 4}}),
        json!({"name": "customer", "type": "string/contains",
               "field_ref": {"database_id": 1, "table_id": 2, "field_id": 2}}),
    ];

    let compiled = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();

    assert_eq!(compiled.parameters.len(), 4);
    for (param, tag) in compiled.parameters.iter().zip(&compiled.binding_tags) {
        assert_eq!(param.id, tag.id);
        assert!(Uuid::parse_str(&param.id).is_ok());
        assert_eq!(param.target.as_ref().map(|t| t.tag_name()), Some(tag.name.as_str()));
    }

    let mut ids: Vec<&str> = compiled.parameters.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn test_field_filter_tag_shape() {
    let provider = orders_metadata();
    let raw = vec![json!({
        "name": "created",
        "type": "date/range",
        "display_name": "Created At",
        "field_ref": {"database_id": 1, "table_id": 2, "field_id": 4}
    })];

    let compiled = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&compiled).unwrap();
    let id = compiled.parameters[0].id.clone();

    assert_eq!(
        json["template-tags"]["created"],
        json!({
            "type": "dimension",
            "name": "created",
            "id": id,
            "display-name": "Created At",
            "dimension": ["field", 4, null],
            "widget-type": "date/range"
        })
    );
    assert_eq!(
        json["parameters"][0],
        json!({
            "id": id,
            "type": "date/range",
            "target": ["dimension", ["template-tag", "created"]],
            "name": "Created At",
            "slug": "created",
            "values_query_type": "none"
        })
    );
}

#[tokio::test]
async fn test_static_numeric_values_become_strings() {
    let provider = orders_metadata();
    let raw = vec![json!({
        "name": "qty",
        "type": "number/=",
        "default": 5,
        "ui_widget": "dropdown",
        "values_source": {"type": "static", "values": [5, 10, 2.5]}
    })];

    let compiled = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&compiled).unwrap();

    assert_eq!(
        json["parameters"][0]["values_source_config"],
        json!({"values": [["5"], ["10"], ["2.5"]]})
    );
    assert_eq!(json["parameters"][0]["default"], json!(["5"]));
    assert_eq!(json["template-tags"]["qty"]["default"], json!(["5"]));
}

#[tokio::test]
async fn test_connected_source_has_no_source_type() {
    let provider = orders_metadata();
    let raw = vec![json!({
        "name": "customer",
        "type": "string/=",
        "field_ref": {"database_id": 1, "table_id": 2, "field_id": 2},
        "values_source": {"type": "connected"}
    })];

    let compiled = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&compiled).unwrap();

    assert!(json["parameters"][0].get("values_source_type").is_none());
    assert_eq!(json["parameters"][0]["values_source_config"], json!({}));
    assert_eq!(json["parameters"][0]["values_query_type"], "list");
}

#[tokio::test]
async fn test_cross_query_source() {
    let provider = CountingProvider::new(orders_metadata());
    let raw = vec![
        json!({
            "name": "region",
            "type": "category",
            "values_source": {"type": "cross_query", "query_id": 7,
                              "value_field": "region", "label_field": "region_label"}
        }),
        json!({
            "name": "region_again",
            "type": "category",
            "values_source": {"type": "card", "card_id": 7, "value_field": "region"}
        }),
    ];

    let compiled = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&compiled).unwrap();

    assert_eq!(json["parameters"][0]["values_source_type"], "card");
    assert_eq!(json["parameters"][0]["values_query_type"], "search");
    assert_eq!(
        json["parameters"][0]["values_source_config"],
        json!({
            "card_id": 7,
            "value_field": ["field", "region", {"base-type": "type/Text"}],
            "label_field": ["field", "region_label", {"base-type": "type/Text"}]
        })
    );
    // Same query referenced twice, looked up once.
    assert_eq!(provider.output_calls(), 1);
}

#[tokio::test]
async fn test_cross_query_reference_errors() {
    let provider = orders_metadata();
    let raw = vec![
        json!({"name": "a", "type": "category",
               "values_source": {"type": "cross_query", "query_id": 7, "value_field": "country"}}),
        json!({"name": "b", "type": "category",
               "values_source": {"type": "cross_query", "query_id": 8, "value_field": "region"}}),
        json!({"name": "c", "type": "category",
               "values_source": {"type": "cross_query", "query_id": 99, "value_field": "region"}}),
    ];

    let failure = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::References);
    let messages: Vec<&str> = failure.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "value_field 'country' is not an output column of query 7 (available: region, region_label)",
            "values_source query 8 has no result metadata; run it once so its output columns are known",
            "values_source query 99 is not accessible: query 99 not found",
        ]
    );
}

#[tokio::test]
async fn test_business_failure_makes_no_lookups() {
    let provider = CountingProvider::new(orders_metadata());
    let raw = vec![
        json!({"name": "customer", "type": "string/=",
               "field_ref": {"database_id": 1, "table_id": 2, "field_id": 2},
               "required": true}),
        json!({"name": "region", "type": "category",
               "values_source": {"type": "cross_query", "query_id": 7, "value_field": "region"}}),
    ];

    let failure = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::BusinessRules);
    assert_eq!(
        failure.errors[0].message,
        "required parameter must have a default value"
    );
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn test_duplicate_slugs_get_suffixes() {
    let provider = orders_metadata();
    let raw = vec![
        json!({"name": "order_date", "type": "date/single"}),
        json!({"name": "Order_Date", "type": "date/single"}),
    ];

    let compiled = compile_query_parameters(&raw, &provider, CompileOptions::default())
        .await
        .unwrap();
    assert_eq!(compiled.parameters[0].slug, "order_date");
    assert_eq!(compiled.parameters[1].slug, "order_date_1");
}
