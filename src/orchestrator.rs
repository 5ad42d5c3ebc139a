//! Screen load orchestration.
//!
//! One [`AttachmentFetcher::load`] call authenticates, loads and transforms
//! the screen definition, fetches the root record by key, the child records
//! linked to it, and the attachment lists of all of them. Every network step
//! handles its own failure: it is logged and the step yields nothing, while
//! sibling entities carry on.

use std::sync::Arc;

use futures_util::future::{join, join_all};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::auth::{ApiToken, Authenticator, SessionCredentials};
use crate::cache::{cache_key, ordered_cache_key, CachePolicy, CacheStore, SessionCache};
use crate::config::AttachmentSettings;
use crate::definition::{AttachmentDefinition, ScreenDefinition};
use crate::endpoint::Endpoints;
use crate::error::Result;
use crate::mask::{Mask, MaskRegistry};
use crate::query::{self, RecordQuery};
use crate::tagged;
use crate::transform::{self, EntityDescriptor, TransformedModel};
use crate::transport::{Request, Transport};

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAttachments {
    pub identity: String,
    pub record: Record,
    pub attachments: Vec<Value>,
}

/// `data` is `None` when nothing was fetched for the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAttachments {
    pub entity_type: String,
    pub data: Option<Vec<RecordAttachments>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentReport {
    pub mask: String,
    pub item_id: String,
    pub root: EntityAttachments,
    pub children: Vec<EntityAttachments>,
}

impl AttachmentReport {
    pub fn total_attachments(&self) -> usize {
        std::iter::once(&self.root)
            .chain(self.children.iter())
            .filter_map(|e| e.data.as_ref())
            .flatten()
            .map(|r| r.attachments.len())
            .sum()
    }
    /// Whether the control should show its attachment icon.
    pub fn has_attachments(&self) -> bool {
        self.total_attachments() > 0
    }
    pub fn child(&self, entity_type: &str) -> Option<&EntityAttachments> {
        self.children.iter().find(|c| c.entity_type == entity_type)
    }
}

pub struct AttachmentFetcher<T: Transport, S: CacheStore> {
    transport: T,
    cache: Arc<SessionCache<S>>,
    endpoints: Endpoints,
    registry: MaskRegistry,
    environment: String,
    policy: CachePolicy,
    page_size: usize,
}

impl<T: Transport, S: CacheStore> AttachmentFetcher<T, S> {
    pub fn new(settings: &AttachmentSettings, transport: T, cache: Arc<SessionCache<S>>) -> Result<Self> {
        Ok(Self {
            transport,
            cache,
            endpoints: settings.endpoints(),
            registry: settings.registry()?,
            environment: settings.environment.clone(),
            policy: settings.cache_policy()?,
            page_size: settings.page_size(),
        })
    }
    pub fn registry(&self) -> &MaskRegistry {
        &self.registry
    }
    pub fn cache(&self) -> &SessionCache<S> {
        &self.cache
    }

    /// Runs the whole screen load. `None` when an aborting step failed:
    /// unknown mask, authentication, definitions, transformation or root record.
    pub async fn load(&self, mask_code: &str, item_id: &str, credentials: &SessionCredentials) -> Option<AttachmentReport> {
        let mask = self.registry.find(mask_code)?;

        let token = match Authenticator::new(&self.transport, self.cache.as_ref(), &self.endpoints, &self.environment)
            .token(mask, credentials)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                error!(mask = mask_code, error = %e, "authentication failed");
                return None;
            }
        };

        let model = self.model(mask, &token).await?;
        let root = model.root()?;
        let root_record = self.root_record(mask, item_id, root, &token).await?;
        let root_ids = root.root_id_columns.clone().unwrap_or_default();

        let root_future = async {
            let attachments = match &root.attachment {
                Some(_) => self.attachments_for(root, &root_record, item_id, item_id, &token).await,
                None => Vec::new(),
            };
            EntityAttachments {
                entity_type: root.entity_type.clone(),
                data: Some(vec![RecordAttachments {
                    identity: item_id.to_string(),
                    record: root_record.clone(),
                    attachments,
                }]),
            }
        };
        let children_future = join_all(
            model
                .children()
                .filter(|c| c.attachment.is_some())
                .map(|c| self.child_entity(c, item_id, &root_record, &root_ids, &token)),
        );
        let (root_entity, children) = join(root_future, children_future).await;

        let report = AttachmentReport { mask: mask.mask.clone(), item_id: item_id.to_string(), root: root_entity, children };
        info!(mask = mask_code, item = item_id, attachments = report.total_attachments(), "screen load complete");
        Some(report)
    }

    /// Definitions fetched (or read from cache) and transformed.
    pub async fn model(&self, mask: &Mask, token: &ApiToken) -> Option<TransformedModel> {
        let screen = self.screen_definition(mask, token).await?;
        let models = self.models(&screen.prog_ids(), token).await;
        let attachment_defs = self.attachment_definitions(&models, token).await;
        transform::transform(&screen, &attachment_defs)
    }

    async fn cached_json(&self, key: String, request: Request, what: &str) -> Option<Value> {
        if let Some(hit) = self.cache.get::<Value>(&key) {
            debug!(key = key.as_str(), "cache hit");
            return Some(hit);
        }
        match self.transport.fetch_json(request).await {
            Ok(value) => {
                self.cache.set(&key, &value, self.policy.entity_ttl);
                Some(value)
            }
            Err(e) => {
                warn!(what, error = %e, "fetch failed");
                None
            }
        }
    }

    pub async fn screen_definition(&self, mask: &Mask, token: &ApiToken) -> Option<ScreenDefinition> {
        let key = cache_key("getScreenDefinition", &[mask.mask.as_str()], &self.environment);
        let request = Request::get(self.endpoints.screen_definition(mask)).bearer(Some(&token.token));
        let raw = self.cached_json(key, request, "screen definition").await?;
        match serde_json::from_value(raw) {
            Ok(screen) => Some(screen),
            Err(e) => {
                error!(mask = mask.mask.as_str(), error = %e, "malformed screen definition");
                None
            }
        }
    }

    /// BT20 model names behind the given prog ids.
    pub async fn models(&self, prog_ids: &[String], token: &ApiToken) -> Vec<String> {
        if prog_ids.is_empty() {
            return Vec::new();
        }
        let key = cache_key("getModels", prog_ids, &self.environment);
        let body = json!({ "dataObjects": prog_ids.iter().map(|id| json!({ "progID": id })).collect::<Vec<_>>() });
        let request = Request::post_json(self.endpoints.models(), body).bearer(Some(&token.token));
        match self.cached_json(key, request, "models").await {
            Some(raw) => tagged::model_names(&raw),
            None => Vec::new(),
        }
    }

    pub async fn attachment_definitions(&self, models: &[String], token: &ApiToken) -> Vec<AttachmentDefinition> {
        if models.is_empty() {
            return Vec::new();
        }
        let mut sorted = models.to_vec();
        sorted.sort();
        let key = cache_key("getAttachmentDefinitions", &sorted, &self.environment);
        let request = Request::get(self.endpoints.attachment_definitions())
            .query("progIds", &sorted.join(","))
            .bearer(Some(&token.token));
        let Some(raw) = self.cached_json(key, request, "attachment definitions").await else {
            return Vec::new();
        };
        let Some(rows) = query::rows(&raw) else {
            warn!("attachment definitions response is not a list");
            return Vec::new();
        };
        rows.iter()
            .filter_map(|row| match serde_json::from_value::<AttachmentDefinition>(row.clone()) {
                Ok(def) => Some(def),
                Err(e) => {
                    warn!(error = %e, "skipping malformed attachment definition");
                    None
                }
            })
            .collect()
    }

    async fn fetch_rows(&self, entity_type: &str, query: RecordQuery, token: &ApiToken) -> Option<Vec<Record>> {
        let request = Request::get(self.endpoints.records(entity_type))
            .queries(query.to_pairs())
            .bearer(Some(&token.token));
        let body = match self.transport.fetch_json(request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(entity = entity_type, error = %e, "record fetch failed");
                return None;
            }
        };
        let Some(rows) = query::rows(&body) else {
            warn!(entity = entity_type, "record response has no rows");
            return None;
        };
        Some(rows.iter().filter_map(|r| r.as_object().cloned()).collect())
    }

    /// The first record matching the mask's key column.
    pub async fn root_record(&self, mask: &Mask, item_id: &str, root: &EntityDescriptor, token: &ApiToken) -> Option<Record> {
        let Some(key_column) = mask.name.as_deref() else {
            error!(mask = mask.mask.as_str(), "mask has no key column");
            return None;
        };
        let query = RecordQuery::new(Some(query::key_filter(key_column, item_id)))
            .named_filter(root.named_filter.clone())
            .order_by(root.sortby_param.clone())
            .page(0, 1);
        let record = self.fetch_rows(&root.entity_type, query, token).await?.into_iter().next();
        if record.is_none() {
            warn!(mask = mask.mask.as_str(), item = item_id, "root record not found");
        }
        record
    }

    /// Filter for a child: its linkages against the root record, else
    /// equality on the root id columns the root record carries.
    pub fn child_filter(child: &EntityDescriptor, root_record: &Record, root_ids: &[String]) -> Option<String> {
        query::linkage_filter(&child.linkages, root_record).or_else(|| query::column_filter(root_ids, root_record))
    }

    async fn child_entity(&self, child: &EntityDescriptor, item_id: &str, root_record: &Record, root_ids: &[String], token: &ApiToken) -> EntityAttachments {
        let empty = EntityAttachments { entity_type: child.entity_type.clone(), data: None };
        let Some(filter) = Self::child_filter(child, root_record, root_ids) else {
            debug!(entity = child.entity_type.as_str(), "no filter against the root record, skipping");
            return empty;
        };
        let query = RecordQuery::new(Some(filter))
            .named_filter(child.named_filter.clone())
            .order_by(child.sortby_param.clone())
            .page(0, self.page_size);
        let Some(records) = self.fetch_rows(&child.entity_type, query, token).await else {
            return empty;
        };
        let data = join_all(records.into_iter().enumerate().map(|(i, record)| async move {
            let identity = record_identity(child, &record, i);
            let attachments = self.attachments_for(child, &record, item_id, &identity, token).await;
            RecordAttachments { identity, record, attachments }
        }))
        .await;
        EntityAttachments { entity_type: child.entity_type.clone(), data: Some(data) }
    }

    /// Attachment list of one record, cached per root item. Empty on failure.
    pub async fn attachments_for(&self, entity: &EntityDescriptor, record: &Record, item_id: &str, identity: &str, token: &ApiToken) -> Vec<Value> {
        let Some(def) = &entity.attachment else { return Vec::new() };
        let key = ordered_cache_key("getAttachments", &[entity.entity_type.as_str(), item_id, identity], &self.environment);
        let body = json!({
            "entityType": entity.entity_type,
            "table": def.table,
            "attachmentId": def.id,
            "record": record,
        });
        let request = Request::post_json(self.endpoints.attachments(), body).bearer(Some(&token.token));
        match self.cached_json(key, request, "attachments").await {
            Some(raw) => query::rows(&raw).cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

/// Values of the child's attachment columns joined by `|`, or the row index
/// when the record has none of them.
pub fn record_identity(entity: &EntityDescriptor, record: &Record, index: usize) -> String {
    let parts: Vec<String> = entity
        .child_column_filter
        .iter()
        .flatten()
        .filter_map(|column| record.get(column))
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect();
    if parts.is_empty() { index.to_string() } else { parts.join("|") }
}
