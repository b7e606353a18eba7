//! Webhook signature verification.
//!
//! Mercado Pago signs each notification with an `x-signature` header of the
//! form `ts=<unix>,v1=<hex hmac>`. The HMAC-SHA256 is computed over the
//! manifest `id:<data.id>;request-id:<x-request-id>;ts:<ts>;` using the
//! webhook secret from the Mercado Pago dashboard.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("x-signature header is malformed")]
    Malformed,

    #[error("signature is not valid hex")]
    InvalidHex,

    #[error("signature mismatch")]
    Mismatch,
}

/// Builds the signed manifest.
///
/// Alphanumeric data ids are lowercased, as the gateway does when signing.
pub fn signature_manifest(data_id: &str, request_id: &str, ts: &str) -> String {
    let data_id = if data_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        data_id.to_ascii_lowercase()
    } else {
        data_id.to_string()
    };
    format!("id:{data_id};request-id:{request_id};ts:{ts};")
}

/// Verifies an `x-signature` header.
///
/// ```rust
/// use optica_api::gateway::signature::{verify_webhook_signature, SignatureError};
///
/// let err = verify_webhook_signature("garbage", "req-1", "123", "secret").unwrap_err();
/// assert_eq!(err, SignatureError::Malformed);
/// ```
pub fn verify_webhook_signature(
    x_signature: &str,
    x_request_id: &str,
    data_id: &str,
    secret: &str,
) -> Result<(), SignatureError> {
    let mut ts = "";
    let mut v1 = "";
    for part in x_signature.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim() {
            "ts" => ts = value.trim(),
            "v1" => v1 = value.trim(),
            _ => {}
        }
    }

    if ts.is_empty() || v1.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let expected = hex::decode(v1).map_err(|_| SignatureError::InvalidHex)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(signature_manifest(data_id, x_request_id, ts).as_bytes());
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Computes the `x-signature` header for a notification.
pub fn sign(data_id: &str, request_id: &str, ts: &str, secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(signature_manifest(data_id, request_id, ts).as_bytes());
    format!("ts={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "webhook-secret";

    #[test]
    fn test_manifest_format() {
        assert_eq!(
            signature_manifest("ABC123", "req-9", "1700000000"),
            "id:abc123;request-id:req-9;ts:1700000000;"
        );
        assert_eq!(
            signature_manifest("12-34", "req-9", "1"),
            "id:12-34;request-id:req-9;ts:1;"
        );
    }

    #[test]
    fn test_valid_signature() {
        let header = sign("123456", "req-1", "1700000000", SECRET);
        assert!(verify_webhook_signature(&header, "req-1", "123456", SECRET).is_ok());

        // Whitespace around parts is tolerated
        let spaced = header.replace(',', ", ");
        assert!(verify_webhook_signature(&spaced, "req-1", "123456", SECRET).is_ok());
    }

    #[test]
    fn test_tampered_signature() {
        let header = sign("123456", "req-1", "1700000000", SECRET);

        assert_eq!(
            verify_webhook_signature(&header, "req-1", "999999", SECRET),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_webhook_signature(&header, "req-2", "123456", SECRET),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_webhook_signature(&header, "req-1", "123456", "other-secret"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_malformed_header() {
        assert_eq!(
            verify_webhook_signature("ts=1", "r", "1", SECRET),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_webhook_signature("ts=1,v1=zz", "r", "1", SECRET),
            Err(SignatureError::InvalidHex)
        );
    }
}
