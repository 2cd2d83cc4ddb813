use std::sync::Arc;
use std::time::Duration;

use gatekeep::AccessTokenSource;
use gatekeep::ClientCredentialsConfig;
use gatekeep::JwksResolver;
use gatekeep::JwtVerifier;
use gatekeep::JwtVerifierConfig;
use gatekeep::TokenSource;
use gatekeep::VerifyJwt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Example 1: Verify an inbound bearer token with settings from TOKEN_ISSUER / TOKEN_AUDIENCE
    println!("=== Example 1: Verify From Environment ===");
    let token = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9...".to_string());

    match JwtVerifierConfig::from_env() {
        Ok(config) => {
            let verifier = JwtVerifier::new(config.with_cache_ttl(Duration::from_secs(30)))?;
            match verifier.verify(&token).await {
                Ok(claims) => {
                    println!("✓ Token verified successfully!");
                    println!("  Subject: {}", claims.sub);
                    println!("  Expires: {:?}", claims.expiration_time());
                }
                Err(e) => eprintln!("✗ Token verification failed ({:?}): {}", e.kind(), e),
            }
        }
        Err(e) => eprintln!("✗ {e}"),
    }

    println!();

    // Example 2: Two audiences of the same issuer sharing one certificate cache
    println!("=== Example 2: Shared Resolver ===");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let resolver = Arc::new(JwksResolver::new(client)?);
    let issuer = "https://tenant.auth.example.com/";
    let public_api = JwtVerifier::with_resolver(issuer, "https://api.example.com", Arc::clone(&resolver));
    let admin_api = JwtVerifier::with_resolver(issuer, "https://admin.example.com", resolver);

    for (name, verifier) in [("public", &public_api), ("admin", &admin_api)] {
        match verifier.verify(&token).await {
            Ok(claims) => println!("✓ {name}: {}", claims.sub),
            Err(e) => eprintln!("✗ {name}: {e}"),
        }
    }

    println!();

    // Example 3: Machine-to-machine access token from MGMT_API_* variables
    println!("=== Example 3: Client Credentials ===");
    match ClientCredentialsConfig::from_env() {
        Ok(config) => {
            let source = TokenSource::new(config.with_scopes(["read:users"]))?;
            match source.token().await {
                Ok(access_token) => println!("✓ Got an access token ({} bytes)", access_token.len()),
                Err(e) => eprintln!("✗ Token request failed: {e}"),
            }
        }
        Err(e) => eprintln!("✗ {e}"),
    }

    Ok(())
}
