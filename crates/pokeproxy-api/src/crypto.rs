//! HMAC-SHA256 request signatures.
//!
//! Senders sign the raw request body with a shared secret and put the
//! lowercase hex digest in `X-Grd-Signature`. The secret is configured as
//! standard base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Signature generation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The secret is empty or not valid base64.
    #[error("invalid secret key")]
    InvalidSecret,
}

/// Verifies a hex HMAC-SHA256 signature over `body`.
///
/// Returns `false` for any malformed input: empty or non-base64 secret,
/// signature that is not 64 hex characters, or a digest mismatch. The
/// digest comparison runs in constant time.
///
/// # Example
///
/// ```
/// use pokeproxy_api::crypto::{sign_payload, verify_signature};
///
/// let secret = "c2VjcmV0";
/// let signature = sign_payload(b"payload", secret).unwrap();
///
/// assert!(verify_signature(&signature, b"payload", secret));
/// assert!(!verify_signature(&signature, b"tampered", secret));
/// ```
pub fn verify_signature(signature_hex: &str, body: &[u8], secret_b64: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    if provided.len() != 32 {
        return false;
    }
    let Ok(expected) = compute_mac(body, secret_b64) else {
        return false;
    };

    expected.ct_eq(&provided).into()
}

/// Computes the lowercase hex HMAC-SHA256 of `body`.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret is empty or not
/// valid base64.
pub fn sign_payload(body: &[u8], secret_b64: &str) -> Result<String, SignatureError> {
    compute_mac(body, secret_b64).map(hex::encode)
}

fn compute_mac(body: &[u8], secret_b64: &str) -> Result<Vec<u8>, SignatureError> {
    let key = STANDARD.decode(secret_b64.trim()).map_err(|_| SignatureError::InvalidSecret)?;
    if key.is_empty() {
        return Err(SignatureError::InvalidSecret);
    }

    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}
