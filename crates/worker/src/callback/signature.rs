//! HMAC signing of outbound callback payloads.
//!
//! The signature is computed over the canonical JSON encoding of the payload
//! (object keys sorted) and attached as the `hmac` field by the publisher.
//! Verification is the receiver's job; nothing is verified here.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the canonical encoding of `payload`, hex-encoded.
///
/// `serde_json` maps are BTreeMap-backed, so serialization already emits
/// object keys in sorted order; the encoding is canonical without extra work.
pub fn sign(payload: &Value, secret: &str) -> Result<String> {
    let canonical = serde_json::to_vec(payload).context("failed to encode callback payload")?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).context("invalid HMAC secret")?;
    mac.update(&canonical);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signature_is_hex_sha256_sized() {
        let signature = sign(&json!({"jobId": "t1", "mark": "Correct"}), "secret").unwrap();

        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_is_deterministic_and_key_order_independent() {
        let a = json!({"jobId": "t1", "mark": "Correct", "confidence": 90});
        let b = json!({"confidence": 90, "mark": "Correct", "jobId": "t1"});

        assert_eq!(sign(&a, "secret").unwrap(), sign(&b, "secret").unwrap());
    }

    #[test]
    fn different_secret_means_different_signature() {
        let payload = json!({"jobId": "t1"});

        assert_ne!(
            sign(&payload, "secret-a").unwrap(),
            sign(&payload, "secret-b").unwrap()
        );
    }

    #[test]
    fn different_payload_means_different_signature() {
        assert_ne!(
            sign(&json!({"jobId": "t1"}), "secret").unwrap(),
            sign(&json!({"jobId": "t2"}), "secret").unwrap()
        );
    }
}
