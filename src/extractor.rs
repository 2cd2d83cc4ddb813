use crate::error::Error;
use crate::error::Result;

/// Extract the token from an `Authorization` header value of the form `Bearer <token>`
///
/// The scheme is matched case-insensitively and the value must consist of exactly
/// the scheme and the token separated by a single space.
pub fn extract_bearer(header_value: &str) -> Result<&str> {
    if header_value.is_empty() {
        return Err(Error::MissingAuthorizationHeader);
    }

    let segments: Vec<&str> = header_value.split(' ').collect();
    let [scheme, token] = segments[..] else {
        return Err(Error::MalformedAuthorizationHeader);
    };

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(Error::UnsupportedAuthorizationScheme);
    }

    Ok(token)
}
