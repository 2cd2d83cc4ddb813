use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad family an [`Error`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The token or an input URI is structurally broken
    MalformedInput,
    /// The signing key could not be obtained from the JWKS endpoint
    KeyResolution,
    /// Signature, algorithm, or certificate problems
    Cryptographic,
    /// The token verified but one of its claims is not acceptable
    Claim,
    /// The client-credentials grant could not be obtained
    Grant,
    /// Required configuration is missing or invalid
    Configuration,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing token")]
    MissingToken,
    #[error("Token is not in JWS compact serialization, found {0} segments")]
    NotCompact(usize),
    #[error("Improperly formatted issuer: {0}")]
    InvalidIssuerUri(String),
    #[error("Unable to decode token {segment}: {source}")]
    SegmentEncoding {
        segment: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("Token header is not a valid UTF-8 encoded sequence")]
    HeaderNotUtf8,
    #[error("Unable to parse token {segment}: {source}")]
    SegmentJson {
        segment: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Authorization header not found")]
    MissingAuthorizationHeader,
    #[error("Authorization header segment count is incorrect")]
    MalformedAuthorizationHeader,
    #[error("Authorization scheme is not Bearer")]
    UnsupportedAuthorizationScheme,

    #[error("Missing 'kid' in the header of the provided JWT")]
    KeyIdMissing,
    #[error("Failed to fetch JWKS from {url}: {source}")]
    JwksFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("JWKS endpoint {url} responded with status {status}")]
    JwksStatus { url: String, status: u16 },
    #[error("Malformed JWKS document: {0}")]
    JwksDecode(#[source] serde_json::Error),
    #[error("Key {0} of your provided JWT does not match in JWKs")]
    KeyNotMatchInJwks(String),
    #[error("Key {0} carries no x5c certificate")]
    CertificateMissing(String),

    #[error("Unsupported signing algorithm: {0}")]
    AlgorithmNotSupported(String),
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("Certificate does not hold an RSA public key")]
    NotRsaKey,
    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("The provided JWT has expired. Expiration timestamp: {0}")]
    TokenExpired(i64),
    #[error("The provided JWT does not match the expected issuer. Provided issuer: {0}")]
    WrongIssuer(String),
    #[error("The provided JWT is not intended for the expected audience")]
    InvalidAudience,
    #[error("Scopes claim {0} not found")]
    ScopesClaimMissing(String),
    #[error("Scopes claim {0} is improperly formatted")]
    ScopesClaimMalformed(String),
    #[error("Scope {0} not granted")]
    ScopeNotGranted(String),

    #[error("Token endpoint request failed: {0}")]
    GrantRequest(#[source] reqwest::Error),
    #[error("Token endpoint responded with status {status}: {body}")]
    GrantStatus { status: u16, body: String },
    #[error("Malformed grant response: {0}")]
    GrantDecode(#[source] serde_json::Error),
    #[error("Improperly formatted token endpoint URL: {0}")]
    InvalidTokenUrl(String),
    #[error("{0} required")]
    MissingGrantParameter(&'static str),

    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("Key cache requires a running tokio runtime")]
    NoRuntime,
}

impl Error {
    /// The family of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingToken
            | Error::NotCompact(_)
            | Error::InvalidIssuerUri(_)
            | Error::SegmentEncoding { .. }
            | Error::HeaderNotUtf8
            | Error::SegmentJson { .. }
            | Error::MissingAuthorizationHeader
            | Error::MalformedAuthorizationHeader
            | Error::UnsupportedAuthorizationScheme => ErrorKind::MalformedInput,
            Error::KeyIdMissing
            | Error::JwksFetch { .. }
            | Error::JwksStatus { .. }
            | Error::JwksDecode(_)
            | Error::KeyNotMatchInJwks(_)
            | Error::CertificateMissing(_) => ErrorKind::KeyResolution,
            Error::AlgorithmNotSupported(_)
            | Error::InvalidCertificate(_)
            | Error::NotRsaKey
            | Error::InvalidSignature => ErrorKind::Cryptographic,
            Error::TokenExpired(_)
            | Error::WrongIssuer(_)
            | Error::InvalidAudience
            | Error::ScopesClaimMissing(_)
            | Error::ScopesClaimMalformed(_)
            | Error::ScopeNotGranted(_) => ErrorKind::Claim,
            Error::GrantRequest(_)
            | Error::GrantStatus { .. }
            | Error::GrantDecode(_)
            | Error::InvalidTokenUrl(_)
            | Error::MissingGrantParameter(_) => ErrorKind::Grant,
            Error::MissingEnv(_) | Error::HttpClient(_) | Error::NoRuntime => {
                ErrorKind::Configuration
            }
        }
    }
}

pub(crate) fn header_encoding_error(source: base64::DecodeError) -> Error {
    Error::SegmentEncoding {
        segment: "header",
        source,
    }
}

pub(crate) fn payload_encoding_error(source: base64::DecodeError) -> Error {
    Error::SegmentEncoding {
        segment: "payload",
        source,
    }
}

pub(crate) fn signature_encoding_error(source: base64::DecodeError) -> Error {
    Error::SegmentEncoding {
        segment: "signature",
        source,
    }
}
