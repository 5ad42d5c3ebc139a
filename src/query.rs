//! OData-style filter text and record query parameters.

use serde_json::{Map, Value};

use crate::definition::Linkage;

/// `'value'` with embedded quotes doubled; numbers and booleans stay bare.
/// Nulls, arrays and objects have no literal form.
pub fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `(column eq literal)`
pub fn eq_clause(column: &str, value: &Value) -> Option<String> {
    literal(value).map(|l| format!("({} eq {})", column, l))
}

/// Filter finding a record by its key, always quoted: `(Faid eq '130013048')`.
pub fn key_filter(column: &str, item_id: &str) -> String {
    format!("({} eq '{}')", column, item_id.replace('\'', "''"))
}

fn and_all(clauses: Vec<String>) -> Option<String> {
    if clauses.is_empty() { None } else { Some(clauses.join(" and ")) }
}

/// One clause per linkage, all joined. `None` unless every linkage's parent
/// property has a literal value in `parent`.
pub fn linkage_filter(linkages: &[Linkage], parent: &Map<String, Value>) -> Option<String> {
    let clauses = linkages
        .iter()
        .map(|l| parent.get(&l.parent_property).and_then(|v| eq_clause(&l.child_property, v)))
        .collect::<Option<Vec<_>>>()?;
    and_all(clauses)
}

/// Equality on each of `columns` present in `parent`.
pub fn column_filter(columns: &[String], parent: &Map<String, Value>) -> Option<String> {
    and_all(
        columns
            .iter()
            .filter_map(|c| parent.get(c).and_then(|v| eq_clause(c, v)))
            .collect(),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub filter: Option<String>,
    pub named_filter: Option<String>,
    pub order_by: Option<String>,
    pub skip: Option<usize>,
    pub top: Option<usize>,
}

impl RecordQuery {
    pub fn new(filter: Option<String>) -> Self {
        Self { filter, ..Self::default() }
    }
    pub fn named_filter(mut self, named_filter: Option<String>) -> Self {
        self.named_filter = named_filter;
        self
    }
    pub fn order_by(mut self, order_by: Option<String>) -> Self {
        self.order_by = order_by;
        self
    }
    pub fn page(mut self, skip: usize, top: usize) -> Self {
        self.skip = Some(skip);
        self.top = Some(top);
        self
    }
    /// Query string pairs, unencoded; the transport encodes them.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(f) = &self.filter {
            pairs.push(("$filter".to_string(), f.clone()));
        }
        if let Some(n) = &self.named_filter {
            pairs.push(("namedFilter".to_string(), n.clone()));
        }
        if let Some(o) = &self.order_by {
            pairs.push(("$orderby".to_string(), o.clone()));
        }
        if let Some(s) = self.skip {
            pairs.push(("$skip".to_string(), s.to_string()));
        }
        if let Some(t) = self.top {
            pairs.push(("$top".to_string(), t.to_string()));
        }
        pairs
    }
}

/// Rows of an OData response: the `value` array, or the body itself when it
/// is already an array.
pub fn rows(body: &Value) -> Option<&Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("value").and_then(Value::as_array),
        _ => None,
    }
}
