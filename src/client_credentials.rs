//! OAuth2 client-credentials grant with a shared, lazily refreshed token
//!
//! A [`TokenSource`] holds at most one grant response. Callers get the cached
//! access token while it is fresh; once it is within the leeway window of its
//! expiry, the next caller refreshes it while every other caller waits on the
//! same lock, so at most one token request is ever in flight.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::RequestBuilder;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;
use url::Url;

use crate::config::http_client;
use crate::config::ClientCredentialsConfig;
use crate::error::Error;
use crate::error::Result;
use crate::key_cache::expiry_after;

const GRANT_TYPE: &str = "client_credentials";

/// Anything that can hand out a currently valid bearer token
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// Immutable client-credentials request template
#[derive(Clone)]
pub struct ClientCredentialsRequest {
    token_url: Url,
    client_id: String,
    client_secret: String,
    audience: String,
    scopes: Vec<String>,
}

impl ClientCredentialsRequest {
    /// Validate the grant parameters
    ///
    /// The token URL must be absolute; client id, secret and audience are required.
    pub fn new(
        token_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self> {
        let token_url =
            Url::parse(token_url).map_err(|_| Error::InvalidTokenUrl(token_url.to_string()))?;
        if token_url.cannot_be_a_base() {
            return Err(Error::InvalidTokenUrl(token_url.to_string()));
        }

        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(Error::MissingGrantParameter("client_id"));
        }
        let client_secret = client_secret.into();
        if client_secret.is_empty() {
            return Err(Error::MissingGrantParameter("client_secret"));
        }
        let audience = audience.into();
        if audience.is_empty() {
            return Err(Error::MissingGrantParameter("audience"));
        }

        Ok(Self {
            token_url,
            client_id,
            client_secret,
            audience,
            scopes: Vec::new(),
        })
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Form fields of the token request, sent as `application/x-www-form-urlencoded`;
    /// `scope` only when scopes are configured
    pub fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("grant_type", GRANT_TYPE.to_string()),
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
            ("audience", self.audience.clone()),
        ];
        if !self.scopes.is_empty() {
            form.push(("scope", self.scopes.join(" ")));
        }
        form
    }

    async fn send(&self, client: &Client) -> Result<GrantResponse> {
        let response = client
            .post(self.token_url.clone())
            .form(&self.form())
            .send()
            .await
            .map_err(Error::GrantRequest)?;

        let status = response.status();
        let body = response.bytes().await.map_err(Error::GrantRequest)?;

        if !status.is_success() {
            return Err(Error::GrantStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let raw: RawGrantResponse = serde_json::from_slice(&body).map_err(Error::GrantDecode)?;
        Ok(GrantResponse::issued_now(raw))
    }
}

impl std::fmt::Debug for ClientCredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsRequest")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("audience", &self.audience)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[derive(Deserialize)]
struct RawGrantResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

/// Token endpoint response plus the instant it stops being valid
#[derive(Clone)]
pub struct GrantResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: Option<String>,
    pub expires_at: Instant,
}

impl GrantResponse {
    fn issued_now(raw: RawGrantResponse) -> Self {
        Self {
            expires_at: expiry_after(Duration::from_secs(raw.expires_in)),
            access_token: raw.access_token,
            token_type: raw.token_type,
            expires_in: raw.expires_in,
            scope: raw.scope,
        }
    }

    /// Whether `now` has reached the expiry minus `leeway`
    pub fn is_stale(&self, leeway: Duration, now: Instant) -> bool {
        match self.expires_at.checked_sub(leeway) {
            Some(refresh_at) => now >= refresh_at,
            None => true,
        }
    }
}

impl std::fmt::Debug for GrantResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Serves a cached client-credentials access token to concurrent callers
pub struct TokenSource {
    request: ClientCredentialsRequest,
    client: Client,
    leeway: Duration,
    current: Mutex<Option<GrantResponse>>,
}

impl TokenSource {
    pub fn new(config: ClientCredentialsConfig) -> Result<Self> {
        let request = ClientCredentialsRequest::new(
            &config.token_url,
            config.client_id,
            config.client_secret,
            config.audience,
        )?
        .with_scopes(config.scopes);
        let client = http_client(config.http_client, config.http_timeout)?;

        Ok(Self::from_request(request, client, config.leeway))
    }

    pub fn from_request(request: ClientCredentialsRequest, client: Client, leeway: Duration) -> Self {
        Self {
            request,
            client,
            leeway,
            current: Mutex::new(None),
        }
    }

    /// A fresh grant response, refreshing it first if it is stale
    ///
    /// The lock is held across the token request. A failed refresh leaves no
    /// cached grant behind, so the following call tries again.
    pub async fn grant(&self) -> Result<GrantResponse> {
        let mut current = self.current.lock().await;

        if let Some(grant) = current.as_ref() {
            if !grant.is_stale(self.leeway, Instant::now()) {
                return Ok(grant.clone());
            }
        }

        // Stale grants are never served, even if the refresh below fails or is cancelled
        *current = None;

        debug!(token_url = %self.request.token_url, "Requesting client credentials grant");
        let grant = self.request.send(&self.client).await.inspect_err(|e| {
            warn!(token_url = %self.request.token_url, error = %e, "Client credentials grant failed");
        })?;
        debug!(expires_in = grant.expires_in, "Client credentials grant refreshed");

        *current = Some(grant.clone());
        Ok(grant)
    }

    /// Attach `Authorization: Bearer <token>` to an outbound request
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token().await?;
        Ok(request.bearer_auth(token))
    }
}

#[async_trait]
impl AccessTokenSource for TokenSource {
    async fn token(&self) -> Result<String> {
        Ok(self.grant().await?.access_token)
    }
}
