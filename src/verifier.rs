use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use url::Url;

use crate::claims::validate_claims;
use crate::claims::Claims;
use crate::config::http_client;
use crate::config::JwtVerifierConfig;
use crate::error::Error;
use crate::error::Result;
use crate::jwks_cache::JwksResolver;
use crate::jws::public_key_from_encoded_der;
use crate::jws::CompactJws;

/// Trait for JWT verification
#[async_trait]
pub trait VerifyJwt {
    /// Verify a compact token against the configured issuer and audience
    async fn verify(&self, token: &str) -> Result<Claims>;
}

/// Verifies RS256/RS384/RS512 compact tokens against the issuer's JWKS
///
/// Signing certificates are looked up at `{issuer}/.well-known/jwks.json`
/// through a [`JwksResolver`], which may be shared with other verifiers.
pub struct JwtVerifier {
    resolver: Arc<JwksResolver>,
    expected_issuer: String,
    expected_audience: String,
}

impl JwtVerifier {
    /// Create a new JWT verifier with its own resolver
    ///
    /// Fails with [`Error::NoRuntime`] outside a tokio runtime, which hosts the
    /// certificate cache's sweep task.
    pub fn new(config: JwtVerifierConfig) -> Result<Self> {
        let client = http_client(config.http_client, config.http_timeout)?;
        let resolver = Arc::new(JwksResolver::with_ttl(client, config.jwks_cache_ttl)?);

        Ok(Self::with_resolver(
            config.expected_issuer,
            config.expected_audience,
            resolver,
        ))
    }

    /// Create a verifier backed by an existing resolver
    pub fn with_resolver(
        expected_issuer: impl Into<String>,
        expected_audience: impl Into<String>,
        resolver: Arc<JwksResolver>,
    ) -> Self {
        Self {
            resolver,
            expected_issuer: expected_issuer.into(),
            expected_audience: expected_audience.into(),
        }
    }

    /// Convenience constructor using default settings
    pub fn with_issuer(
        expected_issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self> {
        Self::new(JwtVerifierConfig::new(expected_issuer, audience))
    }

    pub fn resolver(&self) -> &Arc<JwksResolver> {
        &self.resolver
    }

    /// Verify `token` against an explicit issuer and audience
    ///
    /// Returns the token's claims only when the structure, the signature and
    /// the expiry, issuer and audience claims all check out.
    pub async fn verify_compact(
        &self,
        token: &str,
        expected_issuer: &str,
        expected_audience: &str,
    ) -> Result<Claims> {
        if token.is_empty() {
            return Err(Error::MissingToken);
        }
        let segments = token.split('.').count();
        if segments != 3 {
            return Err(Error::NotCompact(segments));
        }

        let jwks_url = jwks_url(expected_issuer)?;
        let jws = CompactJws::parse(token)?;

        let kid = jws.header.kid.as_deref().ok_or(Error::KeyIdMissing)?;
        let certificate = self.resolver.resolve_key(&jwks_url, kid).await?;
        let key = public_key_from_encoded_der(&certificate)?;
        jws.verify_signature(&key)?;

        validate_claims(
            &jws.claims,
            expected_issuer,
            expected_audience,
            Utc::now().timestamp(),
        )?;

        debug!(kid, sub = %jws.claims.sub, "Token verified");
        Ok(jws.claims)
    }
}

#[async_trait]
impl VerifyJwt for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_compact(token, &self.expected_issuer, &self.expected_audience)
            .await
    }
}

/// JWKS endpoint of `issuer`, which must be an absolute URI
pub fn jwks_url(issuer: &str) -> Result<String> {
    let parsed = Url::parse(issuer).map_err(|_| Error::InvalidIssuerUri(issuer.to_string()))?;
    if parsed.cannot_be_a_base() {
        return Err(Error::InvalidIssuerUri(issuer.to_string()));
    }

    let base = issuer.strip_suffix('/').unwrap_or(issuer);
    Ok(format!("{base}/.well-known/jwks.json"))
}
