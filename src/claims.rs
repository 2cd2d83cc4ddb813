use std::collections::HashSet;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::Error;
use crate::error::Result;

/// The `aud` claim, which providers send either as one string or as an array
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// Normalize into a set of audience values
    pub fn to_set(&self) -> HashSet<&str> {
        match self {
            Audience::Single(aud) => HashSet::from([aud.as_str()]),
            Audience::Many(auds) => auds.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, audience: &str) -> bool {
        self.to_set().contains(audience)
    }
}

/// Registered claims of a verified token
///
/// Any claim outside the registered set is kept in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    pub aud: Option<Audience>,
    /// Expiration time as Unix timestamp
    #[serde(default)]
    pub exp: i64,
    /// Issued at as Unix timestamp
    #[serde(default)]
    pub iat: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Instant on or after which the token must not be accepted
    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    /// Require `scope` to be listed in the array claim `scopes_claim`
    /// (for example `permissions`)
    pub fn require_scope(&self, scopes_claim: &str, scope: &str) -> Result<()> {
        let scopes = self
            .extra
            .get(scopes_claim)
            .ok_or_else(|| Error::ScopesClaimMissing(scopes_claim.to_string()))?;

        let Value::Array(scopes) = scopes else {
            return Err(Error::ScopesClaimMalformed(scopes_claim.to_string()));
        };

        let mut granted = HashSet::with_capacity(scopes.len());
        for value in scopes {
            let scope = value
                .as_str()
                .ok_or_else(|| Error::ScopesClaimMalformed(scopes_claim.to_string()))?;
            granted.insert(scope);
        }

        if granted.contains(scope) {
            Ok(())
        } else {
            Err(Error::ScopeNotGranted(scope.to_string()))
        }
    }
}

/// Check expiry, issuer and audience of already signature-verified claims
///
/// `now` is the verification time in seconds since the Unix epoch. The token is
/// accepted only while `now` is strictly before `exp`. Checks run in that order
/// and the first failure is returned.
pub fn validate_claims(
    claims: &Claims,
    expected_issuer: &str,
    expected_audience: &str,
    now: i64,
) -> Result<()> {
    if now >= claims.exp {
        return Err(Error::TokenExpired(claims.exp));
    }

    if claims.iss != expected_issuer {
        return Err(Error::WrongIssuer(claims.iss.clone()));
    }

    match &claims.aud {
        Some(aud) if aud.contains(expected_audience) => Ok(()),
        _ => Err(Error::InvalidAudience),
    }
}
