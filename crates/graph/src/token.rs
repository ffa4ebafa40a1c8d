use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mailquote_core::config::Credentials;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::{identity_error_message, redact_body, transport_reason, GraphError};

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
pub const CACHE_SKEW_SECONDS: i64 = 60;
const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// Bearer token for the mailbox API. Never persisted.
#[derive(Clone)]
pub struct AccessToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self { value: SecretString::from(value.into()), expires_at }
    }

    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Still usable `skew` from now.
    pub fn is_fresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        !self.is_expired(now + skew)
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken, GraphError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<ExpiresIn>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(i64),
    Text(String),
}

impl ExpiresIn {
    fn seconds(&self) -> Option<i64> {
        match self {
            Self::Seconds(seconds) => Some(*seconds),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// OAuth2 client-credentials grant against `{authority}/{tenant}/oauth2/v2.0/token`.
#[derive(Clone, Debug)]
pub struct ClientCredentialsTokenProvider {
    client: Client,
    authority_url: String,
}

impl ClientCredentialsTokenProvider {
    pub fn new(client: Client, authority_url: impl Into<String>) -> Self {
        Self { client, authority_url: authority_url.into() }
    }

    fn token_url(&self, tenant_id: &str) -> Result<Url, GraphError> {
        let mut url = Url::parse(&self.authority_url)
            .map_err(|error| GraphError::Setup(format!("invalid authority url: {error}")))?;
        url.path_segments_mut()
            .map_err(|()| GraphError::Setup("authority url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([tenant_id, "oauth2", "v2.0", "token"]);
        Ok(url)
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken, GraphError> {
        let url = self.token_url(&credentials.tenant_id)?;
        let requested_at = Utc::now();

        let response = self
            .client
            .post(url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("scope", GRAPH_SCOPE),
                ("client_secret", credentials.client_secret.expose_secret()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|error| {
                error!(
                    event_name = "graph.token_request_failed",
                    tenant_id = %credentials.tenant_id,
                    error = %error,
                    "token request did not complete"
                );
                GraphError::TokenAcquisitionFailed {
                    status: None,
                    message: format!("Token acquisition failed ({})", transport_reason(&error)),
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| GraphError::TokenAcquisitionFailed {
            status: Some(status.as_u16()),
            message: format!("Token acquisition failed ({})", transport_reason(&error)),
        })?;

        if !status.is_success() {
            error!(
                event_name = "graph.token_rejected",
                tenant_id = %credentials.tenant_id,
                status = status.as_u16(),
                body = %redact_body(&body),
                "identity endpoint rejected the client-credentials grant"
            );
            return Err(GraphError::TokenAcquisitionFailed {
                status: Some(status.as_u16()),
                message: identity_error_message(&body).unwrap_or_else(|| {
                    format!("Token acquisition failed ({})", status.as_u16())
                }),
            });
        }

        let payload: TokenResponse =
            serde_json::from_str(&body).map_err(|error| GraphError::TokenAcquisitionFailed {
                status: Some(status.as_u16()),
                message: format!("Token acquisition failed: malformed token response ({error})"),
            })?;

        let lifetime = payload
            .expires_in
            .as_ref()
            .and_then(ExpiresIn::seconds)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECONDS)
            .max(1);
        let token =
            AccessToken::new(payload.access_token, requested_at + Duration::seconds(lifetime));

        debug!(
            event_name = "graph.token_acquired",
            tenant_id = %credentials.tenant_id,
            expires_at = %token.expires_at(),
            "acquired access token"
        );
        Ok(token)
    }
}

/// One lock-guarded token shared by every caller in the process. A caller that
/// finds the cache stale acquires while holding the lock, so concurrent callers
/// wait for that single acquisition instead of racing their own.
pub struct CachingTokenProvider<P> {
    inner: P,
    skew: Duration,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    tenant_id: String,
    client_id: String,
    token: AccessToken,
}

impl<P> CachingTokenProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_skew(inner, Duration::seconds(CACHE_SKEW_SECONDS))
    }

    pub fn with_skew(inner: P, skew: Duration) -> Self {
        Self { inner, skew, cached: Mutex::new(None) }
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

#[async_trait]
impl<P> TokenProvider for CachingTokenProvider<P>
where
    P: TokenProvider,
{
    async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken, GraphError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            let same_client = entry.tenant_id == credentials.tenant_id
                && entry.client_id == credentials.client_id;
            if same_client && entry.token.is_fresh(Utc::now(), self.skew) {
                return Ok(entry.token.clone());
            }
        }

        let token = self.inner.acquire_token(credentials).await?;
        *cached = Some(CachedToken {
            tenant_id: credentials.tenant_id.clone(),
            client_id: credentials.client_id.clone(),
            token: token.clone(),
        });
        Ok(token)
    }
}
