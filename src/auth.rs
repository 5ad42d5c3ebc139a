//! API token acquisition.
//!
//! Four round trips, none retried: load the bootstrap screen so the session
//! cookies exist, exchange the session id and auth token for an API token,
//! validate it, then read the session expiration interval. The token is
//! cached for exactly that interval.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{cache_key, CacheStore, SessionCache};
use crate::endpoint::Endpoints;
use crate::error::{ControlError, Result};
use crate::mask::Mask;
use crate::transport::{Request, Transport};

/// What the host hands over from its own session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    pub session_id: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token", alias = "apiToken")]
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpirationResponse {
    expiration_interval_in_minutes: i64,
}

pub const AUTH_CACHE_OPERATION: &str = "authToken";

pub struct Authenticator<'a, T: Transport, S: CacheStore> {
    transport: &'a T,
    cache: &'a SessionCache<S>,
    endpoints: &'a Endpoints,
    environment: &'a str,
}

impl<'a, T: Transport, S: CacheStore> Authenticator<'a, T, S> {
    pub fn new(transport: &'a T, cache: &'a SessionCache<S>, endpoints: &'a Endpoints, environment: &'a str) -> Self {
        Self { transport, cache, endpoints, environment }
    }

    fn key(&self, credentials: &SessionCredentials) -> String {
        cache_key(AUTH_CACHE_OPERATION, &[credentials.session_id.as_str()], self.environment)
    }

    /// A cached unexpired token, or a freshly acquired one.
    pub async fn token(&self, mask: &Mask, credentials: &SessionCredentials) -> Result<ApiToken> {
        let key = self.key(credentials);
        if let Some(cached) = self.cache.get::<ApiToken>(&key) {
            if cached.expires_at > Utc::now() {
                debug!("reusing cached api token");
                return Ok(cached);
            }
        }
        let token = self.acquire(mask, credentials).await?;
        self.cache.set_until(&key, &token, token.expires_at);
        Ok(token)
    }

    async fn acquire(&self, mask: &Mask, credentials: &SessionCredentials) -> Result<ApiToken> {
        let bootstrap = self.transport.send(Request::get(self.endpoints.bootstrap_screen(mask))).await?;
        if !bootstrap.is_success() {
            return Err(ControlError::Http { status: bootstrap.status, url: self.endpoints.bootstrap_screen(mask) });
        }

        let exchanged: TokenResponse = serde_json::from_value(
            self.transport
                .fetch_json(
                    Request::get(self.endpoints.api_token())
                        .query("sessionId", &credentials.session_id)
                        .query("authToken", &credentials.auth_token),
                )
                .await?,
        )
        .map_err(|e| ControlError::Malformed { message: format!("api token response: {e}") })?;

        let validation = self
            .transport
            .fetch_json(Request::post_form(
                self.endpoints.validate_token(),
                vec![("token".to_string(), exchanged.token.clone()), ("sessionId".to_string(), credentials.session_id.clone())],
            ))
            .await?;
        if validation.get("valid").and_then(Value::as_bool) == Some(false) {
            return Err(ControlError::Malformed { message: "api token rejected by validation".into() });
        }

        let expiration: ExpirationResponse = serde_json::from_value(
            self.transport
                .fetch_json(Request::get(self.endpoints.session_expiration()).bearer(Some(&exchanged.token)))
                .await?,
        )
        .map_err(|e| ControlError::Malformed { message: format!("session expiration response: {e}") })?;

        let minutes = expiration.expiration_interval_in_minutes;
        let expires_at = Duration::try_minutes(minutes)
            .and_then(|interval| Utc::now().checked_add_signed(interval))
            .ok_or_else(|| ControlError::Malformed { message: format!("session expiration interval out of range: {minutes}") })?;
        info!(minutes, "api token acquired");
        Ok(ApiToken { token: exchanged.token, expires_at })
    }
}
