//! Entity transformation.
//!
//! Turns a screen definition and the attachment definitions of its models
//! into one query-ready descriptor per data source: sort string, named
//! filter, required columns and the column sets children use to filter
//! against their parents.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::definition::{AttachmentDefinition, DataSource, Linkage, OrderBy, ScreenDefinition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescriptor {
    pub is_root_entity: bool,
    pub entity_type: String,
    pub parent_entity_type: Option<String>,
    pub sortby_param: Option<String>,
    pub named_filter: Option<String>,
    pub table: String,
    pub attachment: Option<AttachmentDefinition>,
    pub linkages: Vec<Linkage>,
    pub required_order_by_columns: Vec<String>,
    pub order_by_properties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id_columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_column_filter: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_filters: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedModel {
    pub root_entity_type: String,
    /// Every parent and child property named by any linkage.
    pub linkage_values: Vec<String>,
    pub entities: Vec<EntityDescriptor>,
}

impl TransformedModel {
    pub fn root(&self) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.is_root_entity)
    }
    pub fn children(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.iter().filter(|e| !e.is_root_entity)
    }
    pub fn entity(&self, entity_type: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.entity_type == entity_type)
    }
}

/// Like [`transform`], but starts from raw JSON. A document without
/// `dataSources` or `rootComponent` is logged and yields `None`.
pub fn transform_value(screen: &Value, attachment_defs: &[AttachmentDefinition]) -> Option<TransformedModel> {
    match serde_json::from_value::<ScreenDefinition>(screen.clone()) {
        Ok(definition) => transform(&definition, attachment_defs),
        Err(e) => {
            error!(error = %e, "malformed screen definition");
            None
        }
    }
}

/// Builds the descriptors. `None` (logged) when no data source is the root.
pub fn transform(screen: &ScreenDefinition, attachment_defs: &[AttachmentDefinition]) -> Option<TransformedModel> {
    let root_entity_type = screen.root_component.data_source.as_str();
    if screen.root().is_none() {
        error!(root = root_entity_type, "screen definition has no root data source");
        return None;
    }

    let mut linkage_values = BTreeSet::new();
    let mut root_id_columns = BTreeSet::new();
    for ds in &screen.data_sources {
        let Some(parent) = ds.parent_navigation_property.as_deref() else { continue };
        for linkage in &ds.linkages {
            linkage_values.insert(linkage.parent_property.clone());
            linkage_values.insert(linkage.child_property.clone());
            // grandchildren filter through their own parent, never the root
            if parent == root_entity_type {
                root_id_columns.insert(linkage.parent_property.clone());
            }
        }
    }

    let entities = screen
        .data_sources
        .iter()
        .map(|ds| describe(ds, ds.entity_type == root_entity_type, attachment_defs, &root_id_columns))
        .collect();

    debug!(root = root_entity_type, linkages = linkage_values.len(), "screen definition transformed");
    Some(TransformedModel {
        root_entity_type: root_entity_type.to_string(),
        linkage_values: linkage_values.into_iter().collect(),
        entities,
    })
}

fn describe(
    ds: &DataSource,
    is_root: bool,
    attachment_defs: &[AttachmentDefinition],
    root_id_columns: &BTreeSet<String>,
) -> EntityDescriptor {
    let attachment = attachment_defs.iter().find(|a| a.entity_type == ds.entity_type).cloned();

    let child_column_filter = match (&attachment, is_root) {
        (Some(def), false) => Some(
            ds.properties
                .iter()
                .filter(|(_, p)| def.columns.iter().any(|c| c.column.eq_ignore_ascii_case(&p.db_column)))
                .map(|(name, _)| name.clone())
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };

    let max_filters = match &child_column_filter {
        Some(columns) if !columns.is_empty() => {
            let mut union: BTreeSet<String> = root_id_columns.clone();
            union.extend(columns.iter().cloned());
            Some(union.into_iter().collect())
        }
        _ => None,
    };

    let (required_order_by_columns, order_by_properties) = order_by_columns(ds);

    EntityDescriptor {
        is_root_entity: is_root,
        entity_type: ds.entity_type.clone(),
        parent_entity_type: ds.parent_navigation_property.clone(),
        sortby_param: active_order_by(ds).and_then(sortby_param),
        named_filter: named_filter(ds, is_root),
        table: ds.table.clone(),
        attachment,
        linkages: ds.linkages.clone(),
        required_order_by_columns,
        order_by_properties,
        root_id_columns: is_root.then(|| root_id_columns.iter().cloned().collect()),
        child_column_filter,
        max_filters,
    }
}

/// Only the root carries a named filter. With several filters the second one
/// wins; that is what the screens have always sent.
pub fn named_filter(ds: &DataSource, is_root: bool) -> Option<String> {
    if !is_root {
        return None;
    }
    if let Some(constant) = &ds.constant_filter {
        return Some(constant.clone());
    }
    match ds.filters.len() {
        0 => None,
        1 => Some(ds.filters[0].name.clone()),
        _ => Some(ds.filters[1].name.clone()),
    }
}

/// The order-by named by `defaultOrderBy`, else the first one.
pub fn active_order_by(ds: &DataSource) -> Option<&OrderBy> {
    ds.default_order_by
        .as_deref()
        .and_then(|wanted| ds.order_bys.iter().find(|o| o.description == wanted))
        .or_else(|| ds.order_bys.first())
}

/// `X desc,Y` style sort parameter; `None` for an order-by without properties.
pub fn sortby_param(order_by: &OrderBy) -> Option<String> {
    if order_by.properties.is_empty() {
        return None;
    }
    let parts: Vec<String> = order_by
        .properties
        .iter()
        .map(|p| if p.descending { format!("{} desc", p.property) } else { p.property.clone() })
        .collect();
    Some(parts.join(","))
}

// (required ∩ every order-by, union of all order-by properties)
fn order_by_columns(ds: &DataSource) -> (Vec<String>, Vec<String>) {
    let all_order_by: BTreeSet<&str> = ds
        .order_bys
        .iter()
        .flat_map(|o| o.properties.iter().map(|p| p.property.as_str()))
        .collect();

    let mut common: Option<BTreeSet<&str>> = None;
    for order_by in &ds.order_bys {
        let these: BTreeSet<&str> = order_by.properties.iter().map(|p| p.property.as_str()).collect();
        common = Some(match common {
            None => these,
            Some(acc) => acc.intersection(&these).copied().collect(),
        });
    }
    let common = common.unwrap_or_default();

    let required: Vec<String> = ds
        .properties
        .iter()
        .filter(|(name, p)| p.is_required && common.contains(name.as_str()))
        .map(|(name, _)| name.clone())
        .collect();
    (required, all_order_by.into_iter().map(String::from).collect())
}
