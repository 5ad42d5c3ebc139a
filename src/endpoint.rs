//! Endpoint URLs.
//!
//! Auth endpoints hang off the job server, everything else off the app
//! server. Both are prefixed by the environment segment.

use serde::{Deserialize, Serialize};

use crate::mask::Mask;

/// Joins URL segments with exactly one `/` and a trailing `/`.
///
/// Slashes at segment boundaries are trimmed and empty segments dropped, so
/// `join(&["http://h/", "", "/dev"])` is `http://h/dev/`.
pub fn join(segments: &[&str]) -> String {
    let mut joined = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let trimmed = if i == 0 { segment.trim_end_matches('/') } else { segment.trim_matches('/') };
        if trimmed.is_empty() {
            continue;
        }
        joined.push_str(trimmed);
        joined.push('/');
    }
    joined
}

/// Path templates relative to the environment base. `{path}` expands to
/// `module/mask`, `{mask}` to the mask code and `{entity}` to an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointPaths {
    pub bootstrap_screen: String,
    pub api_token: String,
    pub validate_token: String,
    pub session_expiration: String,
    pub screen_definition: String,
    pub models: String,
    pub attachment_definitions: String,
    pub records: String,
    pub attachments: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            bootstrap_screen: "ui/screens/{path}".into(),
            api_token: "api/auth/token".into(),
            validate_token: "api/auth/validate".into(),
            session_expiration: "api/auth/session/expiration".into(),
            screen_definition: "api/screens/{path}/definition".into(),
            models: "api/bt20/models".into(),
            attachment_definitions: "api/attachments/definitions".into(),
            records: "api/data/{entity}".into(),
            attachments: "api/attachments/list".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    app_base: String,
    job_base: String,
    paths: EndpointPaths,
}

impl Endpoints {
    pub fn new(app_server_url: &str, job_server_url: &str, environment: &str, paths: EndpointPaths) -> Self {
        Self {
            app_base: join(&[app_server_url, environment]),
            job_base: join(&[job_server_url, environment]),
            paths,
        }
    }
    fn expand(base: &str, template: &str, mask: Option<&Mask>, entity: Option<&str>) -> String {
        let mut path = template.to_string();
        if let Some(m) = mask {
            path = path.replace("{path}", &m.path()).replace("{mask}", &m.mask);
        }
        if let Some(e) = entity {
            path = path.replace("{entity}", e);
        }
        format!("{}{}", base, path.trim_start_matches('/'))
    }
    pub fn bootstrap_screen(&self, mask: &Mask) -> String {
        Self::expand(&self.app_base, &self.paths.bootstrap_screen, Some(mask), None)
    }
    pub fn api_token(&self) -> String {
        Self::expand(&self.job_base, &self.paths.api_token, None, None)
    }
    pub fn validate_token(&self) -> String {
        Self::expand(&self.job_base, &self.paths.validate_token, None, None)
    }
    pub fn session_expiration(&self) -> String {
        Self::expand(&self.job_base, &self.paths.session_expiration, None, None)
    }
    pub fn screen_definition(&self, mask: &Mask) -> String {
        Self::expand(&self.app_base, &self.paths.screen_definition, Some(mask), None)
    }
    pub fn models(&self) -> String {
        Self::expand(&self.app_base, &self.paths.models, None, None)
    }
    pub fn attachment_definitions(&self) -> String {
        Self::expand(&self.app_base, &self.paths.attachment_definitions, None, None)
    }
    pub fn records(&self, entity_type: &str) -> String {
        Self::expand(&self.app_base, &self.paths.records, None, Some(entity_type))
    }
    pub fn attachments(&self) -> String {
        Self::expand(&self.app_base, &self.paths.attachments, None, None)
    }
}
