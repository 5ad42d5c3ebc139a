//! Dropdown search and selection.
//!
//! A dropdown keeps its items in memory and filters them with one of four
//! predicates over the whitespace separated words of the query. The running
//! selection is handed to the host as a parameter when submitted, or after
//! every change when auto-submit is on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchMode {
    #[default]
    ContainsAny,
    ContainsAll,
    StartsWithAny,
    StartsWithFirstContainsRest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub case_insensitive: bool,
}

impl SearchOptions {
    pub fn new(mode: SearchMode, case_insensitive: bool) -> Self {
        Self { mode, case_insensitive }
    }
}

pub fn terms(query: &str) -> Vec<&str> {
    query.split_whitespace().collect()
}

/// Whether `text` passes the predicate. No terms means everything passes.
pub fn matches<S: AsRef<str>>(text: &str, terms: &[S], options: SearchOptions) -> bool {
    if terms.is_empty() {
        return true;
    }
    let fold = |s: &str| if options.case_insensitive { s.to_lowercase() } else { s.to_string() };
    let text = fold(text);
    let terms: Vec<String> = terms.iter().map(|t| fold(t.as_ref())).collect();
    match options.mode {
        SearchMode::ContainsAny => terms.iter().any(|t| text.contains(t.as_str())),
        SearchMode::ContainsAll => terms.iter().all(|t| text.contains(t.as_str())),
        SearchMode::StartsWithAny => terms.iter().any(|t| text.starts_with(t.as_str())),
        SearchMode::StartsWithFirstContainsRest => {
            text.starts_with(terms[0].as_str()) && terms[1..].iter().all(|t| text.contains(t.as_str()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownItem {
    pub value: String,
    pub display: String,
    #[serde(default)]
    pub group: Option<String>,
}

impl DropdownItem {
    pub fn new(value: &str, display: &str) -> Self {
        Self { value: value.to_string(), display: display.to_string(), group: None }
    }
    pub fn grouped(value: &str, display: &str, group: &str) -> Self {
        Self { value: value.to_string(), display: display.to_string(), group: Some(group.to_string()) }
    }
}

fn cell_text(cell: Option<&Value>) -> Option<String> {
    match cell? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Items from host tabular data. Rows without a value are skipped and the
/// first occurrence of a value wins.
pub fn items_from_rows(rows: &[Vec<Value>], value_column: usize, display_column: usize, group_column: Option<usize>) -> Vec<DropdownItem> {
    let mut items: Vec<DropdownItem> = Vec::new();
    for row in rows {
        let Some(value) = cell_text(row.get(value_column)) else { continue };
        if items.iter().any(|i| i.value == value) {
            continue;
        }
        let display = cell_text(row.get(display_column)).unwrap_or_else(|| value.clone());
        let group = group_column.and_then(|c| cell_text(row.get(c)));
        items.push(DropdownItem { value, display, group });
    }
    items
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    #[serde(rename = "use")]
    pub use_value: String,
    pub display: String,
}

/// The selection as the host parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub parameter: String,
    pub values: Vec<ParameterValue>,
}

#[derive(Debug, Clone)]
pub struct Dropdown {
    parameter_name: String,
    items: Vec<DropdownItem>,
    selection: Vec<String>,
    multiple: bool,
    auto_submit: bool,
    options: SearchOptions,
    submitted: Option<Submission>,
}

impl Dropdown {
    pub fn new(parameter_name: &str, options: SearchOptions) -> Self {
        Self {
            parameter_name: parameter_name.to_string(),
            items: Vec::new(),
            selection: Vec::new(),
            multiple: false,
            auto_submit: false,
            options,
            submitted: None,
        }
    }
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }
    pub fn auto_submit(mut self, auto_submit: bool) -> Self {
        self.auto_submit = auto_submit;
        self
    }

    /// Replaces the items, keeping the selected values that still exist.
    pub fn set_items(&mut self, items: Vec<DropdownItem>) {
        self.items = items;
        let items = &self.items;
        self.selection.retain(|v| items.iter().any(|i| &i.value == v));
    }
    pub fn items(&self) -> &[DropdownItem] {
        &self.items
    }
    pub fn options(&self) -> SearchOptions {
        self.options
    }
    pub fn set_mode(&mut self, mode: SearchMode) {
        self.options.mode = mode;
    }
    pub fn set_case_insensitive(&mut self, case_insensitive: bool) {
        self.options.case_insensitive = case_insensitive;
    }

    pub fn visible(&self, query: &str) -> Vec<&DropdownItem> {
        let terms = terms(query);
        self.items.iter().filter(|i| matches(&i.display, &terms, self.options)).collect()
    }

    /// Visible items bucketed by group, groups in first-seen order.
    pub fn grouped(&self, query: &str) -> Vec<(Option<&str>, Vec<&DropdownItem>)> {
        let mut groups: Vec<(Option<&str>, Vec<&DropdownItem>)> = Vec::new();
        for item in self.visible(query) {
            let group = item.group.as_deref();
            match groups.iter_mut().find(|(g, _)| *g == group) {
                Some((_, members)) => members.push(item),
                None => groups.push((group, vec![item])),
            }
        }
        groups
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }
    pub fn is_selected(&self, value: &str) -> bool {
        self.selection.iter().any(|v| v == value)
    }

    fn changed(&mut self) -> Option<Submission> {
        if self.auto_submit { Some(self.submit()) } else { None }
    }

    /// Selects `value`; in single mode it replaces the selection. Returns the
    /// submission when auto-submit is on.
    pub fn select(&mut self, value: &str) -> Option<Submission> {
        if !self.items.iter().any(|i| i.value == value) {
            warn!(value, "selected value is not among the items");
            return None;
        }
        if !self.multiple {
            self.selection.clear();
        }
        if !self.is_selected(value) {
            self.selection.push(value.to_string());
        }
        self.changed()
    }
    pub fn deselect(&mut self, value: &str) -> Option<Submission> {
        let before = self.selection.len();
        self.selection.retain(|v| v != value);
        if self.selection.len() == before {
            return None;
        }
        self.changed()
    }
    pub fn toggle(&mut self, value: &str) -> Option<Submission> {
        if self.is_selected(value) { self.deselect(value) } else { self.select(value) }
    }
    pub fn clear(&mut self) -> Option<Submission> {
        self.selection.clear();
        self.changed()
    }

    /// Serializes the selection for the host.
    pub fn submit(&mut self) -> Submission {
        let values = self
            .selection
            .iter()
            .map(|v| ParameterValue {
                use_value: v.clone(),
                display: self.items.iter().find(|i| &i.value == v).map(|i| i.display.clone()).unwrap_or_else(|| v.clone()),
            })
            .collect();
        let submission = Submission { parameter: self.parameter_name.clone(), values };
        debug!(parameter = self.parameter_name.as_str(), count = submission.values.len(), "selection submitted");
        self.submitted = Some(submission.clone());
        submission
    }
    /// The last submission, which is what the host reads back.
    pub fn submitted(&self) -> Option<&Submission> {
        self.submitted.as_ref()
    }
}
