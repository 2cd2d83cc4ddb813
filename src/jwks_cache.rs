use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use tracing::warn;

use crate::config::DEFAULT_JWKS_CACHE_TTL;
use crate::error::Error;
use crate::error::Result;
use crate::key_cache::expiry_after;
use crate::key_cache::KeyCache;

/// A JSON Web Key as published in a JWKS document
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    #[serde(default)]
    pub alg: String,
    #[serde(default)]
    pub kty: String,
    #[serde(default, rename = "use")]
    pub key_use: String,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
    #[serde(default)]
    pub kid: String,
    #[serde(default)]
    pub x5t: String,
    /// Certificate chain, base64 (standard alphabet) DER, leaf first
    #[serde(default)]
    pub x5c: Vec<String>,
}

/// A JSON Web Key Set; any top-level member besides `keys` is rejected
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Strictly decode a JWKS document
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(Error::JwksDecode)
    }

    /// First key carrying `kid`
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid == kid)
    }
}

/// Cache slot for one signing certificate of one key set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CertificateKey {
    jwks_url: String,
    kid: String,
}

/// Resolves key identifiers to signing certificates published at a JWKS endpoint
///
/// Certificates are cached per `(jwks_url, kid)` for a short TTL so that key
/// rotation is picked up quickly while bursts of requests share one fetch.
/// Concurrent misses for the same key may each fetch.
pub struct JwksResolver {
    client: Client,
    cache: KeyCache<CertificateKey, String>,
    ttl: Duration,
}

impl JwksResolver {
    /// Create a resolver with the given HTTP client and the default TTL
    ///
    /// Must be called from within a tokio runtime, which hosts the certificate
    /// cache's sweep task.
    pub fn new(client: Client) -> Result<Self> {
        Self::with_ttl(client, DEFAULT_JWKS_CACHE_TTL)
    }

    /// Create a resolver with the given HTTP client and certificate TTL
    pub fn with_ttl(client: Client, ttl: Duration) -> Result<Self> {
        Ok(Self {
            client,
            cache: KeyCache::new()?,
            ttl,
        })
    }

    /// Base64 DER certificate of the key `kid` published at `jwks_url`
    pub async fn resolve_key(&self, jwks_url: &str, kid: &str) -> Result<String> {
        let slot = CertificateKey {
            jwks_url: jwks_url.to_string(),
            kid: kid.to_string(),
        };

        if let Some(certificate) = self.cache.get(&slot).await {
            debug!(jwks_url, kid, "Signing certificate served from cache");
            return Ok(certificate);
        }

        let jwks = self.fetch_jwks(jwks_url).await.inspect_err(|e| {
            warn!(jwks_url, error = %e, "JWKS resolution failed");
        })?;

        let key = jwks
            .find(kid)
            .ok_or_else(|| Error::KeyNotMatchInJwks(kid.to_string()))?;
        let certificate = key
            .x5c
            .first()
            .cloned()
            .ok_or_else(|| Error::CertificateMissing(kid.to_string()))?;

        self.cache
            .set(slot, certificate.clone(), expiry_after(self.ttl))
            .await;
        debug!(jwks_url, kid, "Signing certificate cached");

        Ok(certificate)
    }

    /// Fetch and strictly decode the key set at `jwks_url`
    pub async fn fetch_jwks(&self, jwks_url: &str) -> Result<JwkSet> {
        let fetch_error = |source| Error::JwksFetch {
            url: jwks_url.to_string(),
            source,
        };

        let response = self
            .client
            .get(jwks_url)
            .send()
            .await
            .map_err(fetch_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::JwksStatus {
                url: jwks_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(fetch_error)?;
        JwkSet::from_slice(&body)
    }
}
