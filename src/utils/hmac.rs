use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

fn new_mac(key: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(key.as_bytes())
        .expect("HMAC can take key of any size")
}

pub fn compute_hmac_sha256(input: &[u8], key: &str) -> String {
    let mut mac = new_mac(key);
    mac.update(input);
    hex::encode(mac.finalize().into_bytes())
}

/// Signature in the `X-Hub-Signature-256` header format: `sha256=<hex>`.
pub fn sign_payload(input: &[u8], key: &str) -> String {
    format!("{}{}", SIGNATURE_PREFIX, compute_hmac_sha256(input, key))
}

/// Checks a `sha256=<hex>` signature against the payload in constant time.
pub fn verify_signature(input: &[u8], signature: &str, key: &str) -> Result<(), WebhookError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(WebhookError::MissingSignature);
    }

    let signature_hex = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| WebhookError::MalformedSignature("expected sha256= prefix".to_string()))?;
    let expected = hex::decode(signature_hex)
        .map_err(|e| WebhookError::MalformedSignature(e.to_string()))?;

    let mut mac = new_mac(key);
    mac.update(input);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hmac_sha256() {
        // Example from GitHub's webhook validation docs.
        let result = compute_hmac_sha256(b"Hello, World!", "It's a Secret to Everybody");
        assert_eq!(
            result,
            "757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn test_verify_signature_accepts_own_signature() {
        let body = br#"{"zen":"Keep it logically awesome."}"#;
        let signature = sign_payload(body, "secret");
        assert!(signature.starts_with("sha256="));
        assert!(verify_signature(body, &signature, "secret").is_ok());
    }

    #[test]
    fn test_verify_signature_rejects_wrong_secret() {
        let body = b"payload";
        let signature = sign_payload(body, "secret");
        assert!(matches!(
            verify_signature(body, &signature, "other"),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_verify_signature_rejects_bad_format() {
        assert!(matches!(
            verify_signature(b"payload", "", "secret"),
            Err(WebhookError::MissingSignature)
        ));
        assert!(matches!(
            verify_signature(b"payload", "sha1=abcdef", "secret"),
            Err(WebhookError::MalformedSignature(_))
        ));
        assert!(matches!(
            verify_signature(b"payload", "sha256=not-hex", "secret"),
            Err(WebhookError::MalformedSignature(_))
        ));
    }
}
