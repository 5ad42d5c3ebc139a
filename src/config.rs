//! Control settings.
//!
//! The host hands every control a flat object keyed by human readable names
//! ("App Server Url", "Multiple Select", ...). Values arrive as strings more
//! often than not, so booleans and numbers are parsed leniently. The CLI
//! harness reads the same settings from a file and the environment instead.

use chrono::Duration;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::cache::CachePolicy;
use crate::endpoint::{EndpointPaths, Endpoints};
use crate::error::{ControlError, Result};
use crate::mask::{Mask, MaskRegistry};
use crate::search::SearchMode;

pub const APP_SERVER_URL: &str = "App Server Url";
pub const JOB_SERVER_URL: &str = "Job Server Url";
pub const ENVIRONMENT: &str = "Environment";
pub const MASK_NAME: &str = "Mask Name";
pub const ITEM_ID: &str = "Item ID";
pub const PARAMETER_NAME: &str = "Parameter Name";
pub const MULTIPLE_SELECT: &str = "Multiple Select";
pub const AUTO_SUBMIT: &str = "Auto Submit";
pub const CASE_INSENSITIVE_DEFAULT: &str = "Case Insensitive Search Default";
pub const SEARCH_MODE: &str = "Search Mode";
pub const CACHE_VERSION: &str = "Cache Version";
pub const PAGE_SIZE: &str = "Page Size";

const DEFAULT_CACHE_VERSION: &str = "1";
const DEFAULT_PAGE_SIZE: usize = 100;

fn require(config: &Value, keys: &[&'static str]) -> Result<()> {
    for key in keys {
        let present = match config.get(*key) {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if !present {
            return Err(ControlError::MissingConfig(key));
        }
    }
    Ok(())
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("not a boolean: {other}"))),
        },
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!("not a boolean: {other}"))),
    }
}

fn lenient_usize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<usize>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => Ok(n.as_u64().and_then(|n| usize::try_from(n).ok())),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!("not a number: {other}"))),
    }
}

// ------------- Attachment control -------------
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentSettings {
    #[serde(rename = "App Server Url")]
    pub app_server_url: String,
    #[serde(rename = "Job Server Url", default)]
    pub job_server_url: Option<String>,
    #[serde(rename = "Environment")]
    pub environment: String,
    #[serde(rename = "Mask Name", default)]
    pub mask_name: Option<String>,
    #[serde(rename = "Item ID", default)]
    pub item_id: Option<String>,
    #[serde(rename = "Cache Version", default)]
    pub cache_version: Option<String>,
    #[serde(rename = "Page Size", default, deserialize_with = "lenient_usize")]
    pub page_size: Option<usize>,
    #[serde(rename = "Entity Cache Minutes", default, deserialize_with = "lenient_usize")]
    pub entity_cache_minutes: Option<usize>,
    #[serde(rename = "Paths", default)]
    pub paths: EndpointPaths,
    #[serde(rename = "Masks", default)]
    pub masks: Option<Vec<Mask>>,
}

impl AttachmentSettings {
    pub fn new(app_server_url: &str, environment: &str) -> Self {
        Self {
            app_server_url: app_server_url.to_string(),
            job_server_url: None,
            environment: environment.to_string(),
            mask_name: None,
            item_id: None,
            cache_version: None,
            page_size: None,
            entity_cache_minutes: None,
            paths: EndpointPaths::default(),
            masks: None,
        }
    }

    /// Reads the host configuration object.
    pub fn from_host(config: &Value) -> Result<Self> {
        require(config, &[APP_SERVER_URL, ENVIRONMENT])?;
        serde_json::from_value(config.clone()).map_err(|e| ControlError::Config(e.to_string()))
    }

    pub fn endpoints(&self) -> Endpoints {
        let job = self.job_server_url.as_deref().filter(|s| !s.is_empty()).unwrap_or(&self.app_server_url);
        Endpoints::new(&self.app_server_url, job, &self.environment, self.paths.clone())
    }
    pub fn registry(&self) -> Result<MaskRegistry> {
        match &self.masks {
            Some(masks) => MaskRegistry::new(masks.clone()),
            None => Ok(MaskRegistry::default()),
        }
    }
    pub fn cache_version(&self) -> &str {
        self.cache_version.as_deref().unwrap_or(DEFAULT_CACHE_VERSION)
    }
    pub fn page_size(&self) -> usize {
        self.page_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }
    /// Fails when "Entity Cache Minutes" is too large to be a duration.
    pub fn cache_policy(&self) -> Result<CachePolicy> {
        let entity_ttl = match self.entity_cache_minutes {
            Some(minutes) => Some(
                i64::try_from(minutes)
                    .ok()
                    .and_then(Duration::try_minutes)
                    .ok_or_else(|| ControlError::Config(format!("Entity Cache Minutes out of range: {minutes}")))?,
            ),
            None => None,
        };
        Ok(CachePolicy { entity_ttl })
    }
}

// ------------- Dropdown control -------------
#[derive(Debug, Clone, Deserialize)]
pub struct DropdownSettings {
    #[serde(rename = "Parameter Name")]
    pub parameter_name: String,
    #[serde(rename = "Multiple Select", default, deserialize_with = "lenient_bool")]
    pub multiple_select: bool,
    #[serde(rename = "Auto Submit", default, deserialize_with = "lenient_bool")]
    pub auto_submit: bool,
    #[serde(rename = "Case Insensitive Search Default", default, deserialize_with = "lenient_bool")]
    pub case_insensitive: bool,
    #[serde(rename = "Search Mode", default)]
    pub search_mode: SearchMode,
    #[serde(rename = "Value Column", default, deserialize_with = "lenient_usize")]
    pub value_column: Option<usize>,
    #[serde(rename = "Display Column", default, deserialize_with = "lenient_usize")]
    pub display_column: Option<usize>,
    #[serde(rename = "Group Column", default, deserialize_with = "lenient_usize")]
    pub group_column: Option<usize>,
}

impl DropdownSettings {
    pub fn from_host(config: &Value) -> Result<Self> {
        require(config, &[PARAMETER_NAME])?;
        serde_json::from_value(config.clone()).map_err(|e| ControlError::Config(e.to_string()))
    }
}

// ------------- CLI harness -------------
/// Settings for the `attachkit` binary, from `attachkit.toml` (or the given
/// file) overlaid with `ATTACHKIT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessSettings {
    pub app_server_url: String,
    #[serde(default)]
    pub job_server_url: Option<String>,
    pub environment: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub cache_path: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub cache_version: Option<String>,
}

impl HarnessSettings {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ATTACHKIT").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize::<HarnessSettings>()?)
    }

    pub fn attachment_settings(&self) -> AttachmentSettings {
        let mut settings = AttachmentSettings::new(&self.app_server_url, &self.environment);
        settings.job_server_url = self.job_server_url.clone();
        settings.cache_version = self.cache_version.clone();
        settings
    }
}
