//! # Gatekeep
//!
//! Bearer token plumbing for services that sit behind an OAuth2 authorization server.
//!
//! - **Inbound**: verify JWS compact tokens signed with RS256, RS384 or RS512 against
//!   the signing certificates the issuer publishes at `{issuer}/.well-known/jwks.json`,
//!   then check expiry, issuer and audience.
//! - **Outbound**: obtain machine-to-machine access tokens with the client-credentials
//!   grant and share one cached token between concurrent callers, refreshing it
//!   shortly before it expires.
//!
//! ## Features
//!
//! - RSASSA-PKCS1-v1_5 signature verification with keys taken from the `x5c` certificate
//! - Strict JWKS decoding and a short-lived signing certificate cache
//! - Generic TTL [`KeyCache`] with a background sweep that stops on shutdown
//! - Client-credentials [`TokenSource`] with at most one refresh in flight
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatekeep::{AccessTokenSource, ClientCredentialsConfig, JwtVerifier, JwtVerifierConfig, TokenSource, VerifyJwt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JwtVerifierConfig::new("https://tenant.auth.example.com/", "https://api.example.com");
//!     let verifier = JwtVerifier::new(config)?;
//!
//!     let claims = verifier.verify("eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9...").await?;
//!     println!("Subject: {}", claims.sub);
//!
//!     let source = TokenSource::new(ClientCredentialsConfig::new(
//!         "https://tenant.auth.example.com/oauth/token",
//!         "client-id",
//!         "client-secret",
//!         "https://tenant.auth.example.com/api/v2/",
//!     ))?;
//!     let access_token = source.token().await?;
//!     println!("Got a token of {} bytes", access_token.len());
//!
//!     Ok(())
//! }
//! ```

mod claims;
mod client_credentials;
mod config;
mod error;
mod extractor;
mod jwks_cache;
mod jws;
mod key_cache;
mod verifier;

// Re-exports for public API
pub use claims::validate_claims;
pub use claims::Audience;
pub use claims::Claims;
pub use client_credentials::AccessTokenSource;
pub use client_credentials::ClientCredentialsRequest;
pub use client_credentials::GrantResponse;
pub use client_credentials::TokenSource;
pub use config::ClientCredentialsConfig;
pub use config::JwtVerifierConfig;
pub use config::DEFAULT_HTTP_TIMEOUT;
pub use config::DEFAULT_JWKS_CACHE_TTL;
pub use config::DEFAULT_SWEEP_INTERVAL;
pub use config::DEFAULT_TOKEN_LEEWAY;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;
pub use extractor::extract_bearer;
pub use jwks_cache::Jwk;
pub use jwks_cache::JwkSet;
pub use jwks_cache::JwksResolver;
pub use jws::public_key_from_encoded_der;
pub use jws::verify_rsa;
pub use jws::CompactJws;
pub use jws::HashAlgorithm;
pub use jws::JoseHeader;
pub use key_cache::KeyCache;
pub use verifier::jwks_url;
pub use verifier::JwtVerifier;
pub use verifier::VerifyJwt;
