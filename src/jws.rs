//! JWS compact serialization and RSASSA-PKCS1-v1_5 signature checks
//!
//! A compact token is `header.payload.signature`, each segment base64url encoded
//! without padding. The signature covers the literal `header.payload` text as it
//! appears in the token.

use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::BigUint;
use rsa::Pkcs1v15Sign;
use rsa::RsaPublicKey;
use serde::Deserialize;
use sha2::Digest;
use sha2::Sha256;
use sha2::Sha384;
use sha2::Sha512;
use x509_parser::public_key::PublicKey;

use crate::claims::Claims;
use crate::error::header_encoding_error;
use crate::error::payload_encoding_error;
use crate::error::signature_encoding_error;
use crate::error::Error;
use crate::error::Result;

/// JOSE header of a JWS
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct JoseHeader {
    #[serde(default)]
    pub alg: String,
    pub kid: Option<String>,
    pub typ: Option<String>,
}

/// A compact JWS split into its segments and decoded
#[derive(Debug, Clone)]
pub struct CompactJws<'a> {
    header_segment: &'a str,
    payload_segment: &'a str,
    pub header: JoseHeader,
    pub claims: Claims,
    pub signature: Vec<u8>,
}

impl<'a> CompactJws<'a> {
    /// Split and decode a compact token without checking its signature
    pub fn parse(token: &'a str) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::MissingToken);
        }

        let segments: Vec<&str> = token.split('.').collect();
        let [header_segment, payload_segment, signature_segment] = segments[..] else {
            return Err(Error::NotCompact(segments.len()));
        };

        let header = decode_header(header_segment)?;
        let claims = decode_claims(payload_segment)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_segment)
            .map_err(signature_encoding_error)?;

        Ok(Self {
            header_segment,
            payload_segment,
            header,
            claims,
            signature,
        })
    }

    /// The exact text the signature was computed over
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header_segment, self.payload_segment)
    }

    /// Check the signature against `key` using the hash named by the header's `alg`
    pub fn verify_signature(&self, key: &RsaPublicKey) -> Result<()> {
        let hash = HashAlgorithm::from_alg(&self.header.alg)?;
        verify_rsa(key, hash, self.signing_input().as_bytes(), &self.signature)
    }
}

fn decode_header(segment: &str) -> Result<JoseHeader> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(header_encoding_error)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| Error::HeaderNotUtf8)?;

    serde_json::from_str(text).map_err(|source| Error::SegmentJson {
        segment: "header",
        source,
    })
}

fn decode_claims(segment: &str) -> Result<Claims> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(payload_encoding_error)?;

    serde_json::from_slice(&bytes).map_err(|source| Error::SegmentJson {
        segment: "payload",
        source,
    })
}

/// Digest used by an `RS*` signing algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Map a JWS `alg` value onto its digest
    pub fn from_alg(alg: &str) -> Result<Self> {
        match alg {
            "RS256" => Ok(Self::Sha256),
            "RS384" => Ok(Self::Sha384),
            "RS512" => Ok(Self::Sha512),
            other => Err(Error::AlgorithmNotSupported(other.to_string())),
        }
    }

    pub fn digest(self, input: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(input).to_vec(),
            Self::Sha384 => Sha384::digest(input).to_vec(),
            Self::Sha512 => Sha512::digest(input).to_vec(),
        }
    }

    fn padding(self) -> Pkcs1v15Sign {
        match self {
            Self::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
            Self::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
            Self::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }
}

/// Verify an RSASSA-PKCS1-v1_5 signature over `message`
pub fn verify_rsa(
    key: &RsaPublicKey,
    hash: HashAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let hashed = hash.digest(message);
    key.verify(hash.padding(), &hashed, signature)
        .map_err(|_| Error::InvalidSignature)
}

/// Extract the RSA public key from a base64 (standard alphabet) DER certificate,
/// as found in a JWK's `x5c` chain
pub fn public_key_from_encoded_der(encoded_der: &str) -> Result<RsaPublicKey> {
    let der = STANDARD
        .decode(encoded_der)
        .map_err(|e| Error::InvalidCertificate(format!("not base64: {e}")))?;

    let (_, certificate) = x509_parser::parse_x509_certificate(&der)
        .map_err(|e| Error::InvalidCertificate(e.to_string()))?;

    let parsed = certificate
        .public_key()
        .parsed()
        .map_err(|e| Error::InvalidCertificate(e.to_string()))?;

    match parsed {
        PublicKey::RSA(rsa) => RsaPublicKey::new(
            BigUint::from_bytes_be(rsa.modulus),
            BigUint::from_bytes_be(rsa.exponent),
        )
        .map_err(|e| Error::InvalidCertificate(e.to_string())),
        _ => Err(Error::NotRsaKey),
    }
}
