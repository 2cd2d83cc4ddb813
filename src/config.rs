use std::time::Duration;

use reqwest::Client;

use crate::error::Error;
use crate::error::Result;

/// Timeout applied to every outbound HTTP call made by this crate
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a resolved signing certificate is served from cache
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(15);
/// Interval of the key cache background sweep
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Grace window subtracted from an access token's expiry
pub const DEFAULT_TOKEN_LEEWAY: Duration = Duration::from_secs(30);

pub(crate) const TOKEN_ISSUER_ENV: &str = "TOKEN_ISSUER";
pub(crate) const TOKEN_AUDIENCE_ENV: &str = "TOKEN_AUDIENCE";
pub(crate) const CLIENT_ID_ENV: &str = "MGMT_API_CLIENT_ID";
pub(crate) const CLIENT_SECRET_ENV: &str = "MGMT_API_CLIENT_SECRET";
pub(crate) const AUDIENCE_ENV: &str = "MGMT_API_AUDIENCE";
pub(crate) const ISSUER_ENV: &str = "MGMT_API_ISSUER";

/// Configuration for the JWT verifier
#[derive(Debug, Clone)]
pub struct JwtVerifierConfig {
    /// The expected issuer of the JWT tokens, also the base of the JWKS endpoint
    pub(crate) expected_issuer: String,
    /// The audience the token's `aud` claim must contain
    pub(crate) expected_audience: String,
    /// Time-to-live for resolved signing certificates (default: 15 seconds)
    pub(crate) jwks_cache_ttl: Duration,
    /// Timeout for JWKS requests when no custom client is given
    pub(crate) http_timeout: Duration,
    /// Optional custom HTTP client for fetching JWKS
    /// If not provided, a default client will be created
    pub(crate) http_client: Option<Client>,
}

impl JwtVerifierConfig {
    /// Create a new configuration with the given issuer and expected audience
    pub fn new(expected_issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            expected_issuer: expected_issuer.into(),
            expected_audience: audience.into(),
            jwks_cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            http_client: None,
        }
    }

    /// Read `TOKEN_ISSUER` and `TOKEN_AUDIENCE` from the environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            require_env(TOKEN_ISSUER_ENV)?,
            require_env(TOKEN_AUDIENCE_ENV)?,
        ))
    }

    /// Set the JWKS cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Set the timeout used by the default HTTP client
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }
}

/// Configuration for a client-credentials [`TokenSource`](crate::TokenSource)
#[derive(Debug, Clone)]
pub struct ClientCredentialsConfig {
    pub(crate) token_url: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) audience: String,
    pub(crate) scopes: Vec<String>,
    /// Subtracted from the token's expiry when deciding whether to refresh
    pub(crate) leeway: Duration,
    pub(crate) http_timeout: Duration,
    pub(crate) http_client: Option<Client>,
}

impl ClientCredentialsConfig {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: audience.into(),
            scopes: Vec::new(),
            leeway: DEFAULT_TOKEN_LEEWAY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            http_client: None,
        }
    }

    /// Read the management API credentials from the environment
    ///
    /// The token endpoint is derived as `{MGMT_API_ISSUER}/oauth/token`.
    pub fn from_env() -> Result<Self> {
        let issuer = require_env(ISSUER_ENV)?;
        let token_url = format!("{}/oauth/token", issuer.trim_end_matches('/'));

        Ok(Self::new(
            token_url,
            require_env(CLIENT_ID_ENV)?,
            require_env(CLIENT_SECRET_ENV)?,
            require_env(AUDIENCE_ENV)?,
        ))
    }

    /// Request these scopes, sent space-separated in the `scope` form field
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

/// Build the HTTP client used for outbound calls, honoring a caller-supplied one
pub(crate) fn http_client(custom: Option<Client>, timeout: Duration) -> Result<Client> {
    match custom {
        Some(client) => Ok(client),
        None => Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::HttpClient),
    }
}

fn require_env(name: &'static str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or(Error::MissingEnv(name))
}
