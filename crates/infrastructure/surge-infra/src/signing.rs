use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 digest of the request body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("webhook secret must not be empty")]
    EmptySecret,
    #[error("auth token must not be empty")]
    EmptyToken,
    #[error("signing key rejected: {0}")]
    Key(String),
    #[error("credential is not a valid header value: {0}")]
    Header(String),
}

/// Hex HMAC-SHA256 of `body` under `secret`.
///
/// The caller must pass the exact byte sequence that will be transmitted;
/// any re-serialization on the way out invalidates the signature.
pub fn signature_hex(body: &[u8], secret: &str) -> Result<String, SignError> {
    if secret.is_empty() {
        return Err(SignError::EmptySecret);
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignError::Key(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Delivery headers for one signed webhook request: bearer credential,
/// body signature, content type.
pub fn webhook_headers(body: &[u8], secret: &str, token: &str) -> Result<HeaderMap, SignError> {
    if token.is_empty() {
        return Err(SignError::EmptyToken);
    }
    let signature = signature_hex(body, secret)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| SignError::Header(e.to_string()))?,
    );
    headers.insert(
        SIGNATURE_HEADER,
        HeaderValue::from_str(&signature).map_err(|e| SignError::Header(e.to_string()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_yield_identical_signatures() {
        let a = signature_hex(b"{\"k\":1}", "secret").unwrap();
        let b = signature_hex(b"{\"k\":1}", "secret").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn one_byte_change_changes_the_signature() {
        let base = signature_hex(b"{\"k\":1}", "secret").unwrap();
        assert_ne!(base, signature_hex(b"{\"k\":2}", "secret").unwrap());
        assert_ne!(base, signature_hex(b"{\"k\":1} ", "secret").unwrap());
        assert_ne!(base, signature_hex(b"{\"k\":1}", "secret2").unwrap());
    }

    #[test]
    fn empty_credentials_are_configuration_errors() {
        assert!(matches!(
            signature_hex(b"body", ""),
            Err(SignError::EmptySecret)
        ));
        assert!(matches!(
            webhook_headers(b"body", "secret", ""),
            Err(SignError::EmptyToken)
        ));
        assert!(matches!(
            webhook_headers(b"body", "", "token"),
            Err(SignError::EmptySecret)
        ));
    }

    #[test]
    fn header_map_carries_the_delivery_contract() {
        let headers = webhook_headers(b"payload", "secret", "token-01").unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer token-01");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        let sig = headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
        assert_eq!(sig, signature_hex(b"payload", "secret").unwrap());
    }
}
