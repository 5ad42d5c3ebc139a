//! Screen and attachment definitions as served by the application server.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenDefinition {
    pub data_sources: Vec<DataSource>,
    pub root_component: RootComponent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootComponent {
    pub data_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub entity_type: String,
    #[serde(default)]
    pub table: String,
    /// Entity type of the parent data source.
    #[serde(default)]
    pub parent_navigation_property: Option<String>,
    #[serde(default)]
    pub linkages: Vec<Linkage>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub constant_filter: Option<String>,
    #[serde(default)]
    pub order_bys: Vec<OrderBy>,
    #[serde(default)]
    pub default_order_by: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    /// BT20 model the data source is built on.
    #[serde(default)]
    pub prog_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linkage {
    pub parent_property: String,
    pub child_property: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub description: String,
    #[serde(default)]
    pub properties: Vec<OrderByProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByProperty {
    pub property: String,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub db_column: String,
    #[serde(default)]
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDefinition {
    pub entity_type: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub columns: Vec<AttachmentColumn>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentColumn {
    pub column: String,
}

// ids come back as numbers from some environments
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl ScreenDefinition {
    pub fn root(&self) -> Option<&DataSource> {
        self.data_sources.iter().find(|ds| ds.entity_type == self.root_component.data_source)
    }
    pub fn data_source(&self, entity_type: &str) -> Option<&DataSource> {
        self.data_sources.iter().find(|ds| ds.entity_type == entity_type)
    }
    /// Distinct BT20 models referenced by the data sources.
    pub fn prog_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.data_sources.iter().filter_map(|ds| ds.prog_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
