use attachkit::definition::{AttachmentDefinition, ScreenDefinition};
use attachkit::transform::{transform, transform_value};
use serde_json::{json, Value};

fn screen(value: Value) -> ScreenDefinition {
    serde_json::from_value(value).expect("screen definition")
}

fn attachment(entity_type: &str, columns: &[&str]) -> AttachmentDefinition {
    serde_json::from_value(json!({
        "entityType": entity_type,
        "table": format!("{}_DOCS", entity_type.to_uppercase()),
        "columns": columns.iter().map(|c| json!({ "column": c })).collect::<Vec<_>>(),
        "id": 7
    }))
    .expect("attachment definition")
}

fn root_with_filters(filters: Value) -> ScreenDefinition {
    screen(json!({
        "dataSources": [{ "entityType": "Asset", "table": "FA_ASSET", "filters": filters }],
        "rootComponent": { "dataSource": "Asset" }
    }))
}

#[test]
fn root_id_columns_come_from_direct_children_only() {
    let model = transform(
        &screen(json!({
            "dataSources": [
                { "entityType": "Asset", "table": "FA_ASSET" },
                { "entityType": "Component", "parentNavigationProperty": "Asset",
                  "linkages": [{ "parentProperty": "Faid", "childProperty": "Faid" }] },
                { "entityType": "Location", "parentNavigationProperty": "Asset",
                  "linkages": [{ "parentProperty": "Faid", "childProperty": "AssetId" },
                               { "parentProperty": "Company", "childProperty": "Company" }] },
                { "entityType": "Part", "parentNavigationProperty": "Component",
                  "linkages": [{ "parentProperty": "CompId", "childProperty": "CompId" }] }
            ],
            "rootComponent": { "dataSource": "Asset" }
        })),
        &[],
    )
    .expect("model");

    let root = model.root().expect("root");
    assert_eq!(root.root_id_columns, Some(vec!["Company".to_string(), "Faid".to_string()]));
    assert!(model.children().all(|c| c.root_id_columns.is_none()));
    assert_eq!(model.entities.iter().filter(|e| e.is_root_entity).count(), 1);
    // grandchild linkages still count as linkage values
    assert!(model.linkage_values.contains(&"CompId".to_string()));
    assert!(model.linkage_values.contains(&"AssetId".to_string()));
}

#[test]
fn single_filter_is_used() {
    let model = transform(&root_with_filters(json!([{ "name": "A" }])), &[]).unwrap();
    assert_eq!(model.root().unwrap().named_filter.as_deref(), Some("A"));
}

#[test]
fn second_filter_wins_when_there_are_several() {
    // Observed behaviour of the screens: with more than one filter the first
    // is skipped. Kept as is until the intent is confirmed.
    let model = transform(&root_with_filters(json!([{ "name": "A" }, { "name": "B" }, { "name": "C" }])), &[]).unwrap();
    assert_eq!(model.root().unwrap().named_filter.as_deref(), Some("B"));
}

#[test]
fn constant_filter_takes_precedence_and_children_get_none() {
    let model = transform(
        &screen(json!({
            "dataSources": [
                { "entityType": "Asset", "constantFilter": "OnlyMine", "filters": [{ "name": "A" }] },
                { "entityType": "Component", "parentNavigationProperty": "Asset", "filters": [{ "name": "X" }] }
            ],
            "rootComponent": { "dataSource": "Asset" }
        })),
        &[],
    )
    .unwrap();
    assert_eq!(model.root().unwrap().named_filter.as_deref(), Some("OnlyMine"));
    assert_eq!(model.entity("Component").unwrap().named_filter, None);
}

#[test]
fn sortby_param_marks_descending_properties() {
    let model = transform(
        &screen(json!({
            "dataSources": [{
                "entityType": "Asset",
                "orderBys": [
                    { "description": "Newest", "properties": [{ "property": "X", "descending": true }, { "property": "Y" }] }
                ]
            }],
            "rootComponent": { "dataSource": "Asset" }
        })),
        &[],
    )
    .unwrap();
    assert_eq!(model.root().unwrap().sortby_param.as_deref(), Some("X desc,Y"));
}

#[test]
fn default_order_by_is_preferred_over_first() {
    let order_bys = json!([
        { "description": "By Id", "properties": [{ "property": "Faid" }] },
        { "description": "By Name", "properties": [{ "property": "Name" }] }
    ]);
    let chosen = transform(
        &screen(json!({
            "dataSources": [{ "entityType": "Asset", "orderBys": order_bys, "defaultOrderBy": "By Name" }],
            "rootComponent": { "dataSource": "Asset" }
        })),
        &[],
    )
    .unwrap();
    assert_eq!(chosen.root().unwrap().sortby_param.as_deref(), Some("Name"));

    let fallback = transform(
        &screen(json!({
            "dataSources": [{ "entityType": "Asset", "orderBys": order_bys, "defaultOrderBy": "Missing" }],
            "rootComponent": { "dataSource": "Asset" }
        })),
        &[],
    )
    .unwrap();
    assert_eq!(fallback.root().unwrap().sortby_param.as_deref(), Some("Faid"));

    let unordered = transform(&root_with_filters(json!([])), &[]).unwrap();
    assert_eq!(unordered.root().unwrap().sortby_param, None);
}

#[test]
fn required_order_by_columns_must_appear_in_every_variant() {
    let model = transform(
        &screen(json!({
            "dataSources": [{
                "entityType": "Asset",
                "properties": {
                    "Faid": { "dbColumn": "FAID", "isRequired": true },
                    "Name": { "dbColumn": "NAME", "isRequired": true },
                    "Cost": { "dbColumn": "COST", "isRequired": false }
                },
                "orderBys": [
                    { "description": "By Id", "properties": [{ "property": "Faid" }, { "property": "Name" }, { "property": "Cost" }] },
                    { "description": "By Cost", "properties": [{ "property": "Cost" }, { "property": "Faid" }] }
                ]
            }],
            "rootComponent": { "dataSource": "Asset" }
        })),
        &[],
    )
    .unwrap();
    let root = model.root().unwrap();
    // Name is required but only in one variant, Cost is common but not required
    assert_eq!(root.required_order_by_columns, vec!["Faid".to_string()]);
    assert_eq!(root.order_by_properties, vec!["Cost".to_string(), "Faid".to_string(), "Name".to_string()]);
}

#[test]
fn child_column_filter_matches_db_columns_case_insensitively() {
    let model = transform(
        &screen(json!({
            "dataSources": [
                { "entityType": "Asset", "properties": { "Faid": { "dbColumn": "FAID" } } },
                { "entityType": "Component", "parentNavigationProperty": "Asset",
                  "linkages": [{ "parentProperty": "Faid", "childProperty": "Faid" }],
                  "properties": {
                      "CompId": { "dbColumn": "comp_id" },
                      "Faid": { "dbColumn": "FAID" },
                      "Label": { "dbColumn": "LABEL" }
                  } },
                { "entityType": "Note", "parentNavigationProperty": "Asset",
                  "properties": { "Text": { "dbColumn": "TEXT" } } }
            ],
            "rootComponent": { "dataSource": "Asset" }
        })),
        &[attachment("Asset", &["FAID"]), attachment("Component", &["COMP_ID", "FAID"]), attachment("Note", &["NOTE_ID"])],
    )
    .unwrap();

    let root = model.root().unwrap();
    assert!(root.attachment.is_some());
    assert_eq!(root.child_column_filter, None);
    assert_eq!(root.max_filters, None);

    let component = model.entity("Component").unwrap();
    assert_eq!(component.child_column_filter, Some(vec!["CompId".to_string(), "Faid".to_string()]));
    assert_eq!(component.max_filters, Some(vec!["CompId".to_string(), "Faid".to_string()]));
    assert_eq!(component.attachment.as_ref().map(|a| a.id.as_str()), Some("7"));

    // matched definition but no matching column: empty filter, no max filters
    let note = model.entity("Note").unwrap();
    assert_eq!(note.child_column_filter, Some(vec![]));
    assert_eq!(note.max_filters, None);
}

#[test]
fn missing_root_yields_none() {
    let orphan = screen(json!({
        "dataSources": [{ "entityType": "Asset" }],
        "rootComponent": { "dataSource": "Vendor" }
    }));
    assert!(transform(&orphan, &[]).is_none());
}

#[test]
fn malformed_documents_yield_none() {
    assert!(transform_value(&json!({ "rootComponent": { "dataSource": "Asset" } }), &[]).is_none());
    assert!(transform_value(&json!({ "dataSources": [] }), &[]).is_none());
    assert!(transform_value(&json!("not a screen"), &[]).is_none());
    let fine = json!({ "dataSources": [{ "entityType": "Asset" }], "rootComponent": { "dataSource": "Asset" } });
    assert!(transform_value(&fine, &[]).is_some());
}
