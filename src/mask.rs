//! Mask registry.
//!
//! A mask is the short code of a business screen (`FAUPAS` is the fixed
//! asset master). Each entry carries the module it lives in, the key column
//! used to find a record by id, and a sample id handy for smoke testing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::error::{ControlError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    pub mask: String,
    pub module: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "itemID")]
    pub item_id: Option<String>,
}

impl Mask {
    pub fn new(mask: &str, module: &str, name: Option<&str>, item_id: Option<&str>) -> Self {
        Self {
            mask: mask.to_string(),
            module: module.to_string(),
            name: name.map(String::from),
            item_id: item_id.map(String::from),
        }
    }
    /// `module/mask`, the form used by the screen endpoints.
    pub fn path(&self) -> String {
        format!("{}/{}", self.module, self.mask)
    }
}

lazy_static::lazy_static! {
    static ref BUILT_IN: Vec<Mask> = vec![
        Mask::new("FAUPAS", "FA", Some("Faid"), Some("130013048")),
        Mask::new("POUPPR", "PO", Some("PoNumber"), Some("PO000417")),
        Mask::new("APUPIN", "AP", Some("InvoiceId"), Some("10042")),
        Mask::new("GLUPJE", "GL", Some("JournalNumber"), Some("2024-000118")),
        Mask::new("HRUPEM", "HR", Some("EmployeeId"), Some("004512")),
        Mask::new("WOUPWO", "WO", Some("WorkOrder"), Some("WO-88121")),
    ];
}

#[derive(Debug, Clone)]
pub struct MaskRegistry {
    masks: Vec<Mask>,
}

impl MaskRegistry {
    /// Builds a registry, rejecting duplicate mask codes.
    pub fn new(masks: Vec<Mask>) -> Result<Self> {
        let mut seen = HashSet::new();
        for m in &masks {
            if !seen.insert(m.mask.as_str()) {
                return Err(ControlError::Config(format!("duplicate mask '{}'", m.mask)));
            }
        }
        Ok(Self { masks })
    }
    /// Case-sensitive exact match. A miss is logged; callers abort.
    pub fn find(&self, code: &str) -> Option<&Mask> {
        let found = self.masks.iter().find(|m| m.mask == code);
        if found.is_none() {
            warn!(mask = code, "mask not found in registry");
        }
        found
    }
    pub fn require(&self, code: &str) -> Result<&Mask> {
        self.find(code).ok_or_else(|| ControlError::MaskNotFound(code.to_string()))
    }
    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }
    pub fn len(&self) -> usize {
        self.masks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

impl Default for MaskRegistry {
    fn default() -> Self {
        Self { masks: BUILT_IN.clone() }
    }
}
