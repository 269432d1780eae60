//! Webhook signature primitives shared by the gateway adapters.
//!
//! Both supported gateways sign webhook deliveries the same way: an
//! HMAC-SHA512 over the exact raw request body, keyed with the merchant's
//! provider secret, hex-encoded into a request header.
//!
//! ```text
//! x-paystack-signature: {hex(HMAC-SHA512(raw_body, paystack_secret_key))}
//! monnify-signature:    {hex(HMAC-SHA512(raw_body, monnify_client_secret))}
//! ```
//!
//! Verification goes through [`ring::hmac::verify`], which compares in
//! constant time.

/// Header carrying the Paystack webhook signature.
pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Header carrying the Monnify webhook signature.
pub const MONNIFY_SIGNATURE_HEADER: &str = "monnify-signature";

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature")]
    Missing,
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("invalid signature")]
    SignatureMismatch,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Compute `hex(HMAC-SHA512(body, key))`.
pub fn sign_sha512_hex(body: &[u8], key: &[u8]) -> String {
    let tag = ring::hmac::sign(&ring::hmac::Key::new(ring::hmac::HMAC_SHA512, key), body);
    hex::encode(tag.as_ref())
}

/// Verify a hex-encoded HMAC-SHA512 signature over `body`.
///
/// Surrounding whitespace in the header value is ignored; the hex digits
/// themselves are case-insensitive.
pub fn verify_sha512_hex(body: &[u8], signature: &str, key: &[u8]) -> Result<(), SignatureError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(SignatureError::Missing);
    }
    let signature_bytes = hex::decode(signature).map_err(|_| SignatureError::InvalidHex)?;
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA512, key),
        body,
        &signature_bytes,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"sk_test_0123456789";
    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"REF_1"}}"#;

    #[test]
    fn signed_body_verifies() {
        let sig = sign_sha512_hex(BODY, KEY);
        assert_eq!(sig.len(), 128);
        assert!(verify_sha512_hex(BODY, &sig, KEY).is_ok());
        assert!(verify_sha512_hex(BODY, &sig.to_uppercase(), KEY).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let sig = sign_sha512_hex(BODY, KEY);
        let tampered = br#"{"event":"charge.success","data":{"reference":"REF_2"}}"#;
        assert!(matches!(
            verify_sha512_hex(tampered, &sig, KEY),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let sig = sign_sha512_hex(BODY, b"another-secret");
        assert!(matches!(
            verify_sha512_hex(BODY, &sig, KEY),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn malformed_header_values() {
        assert!(matches!(
            verify_sha512_hex(BODY, "   ", KEY),
            Err(SignatureError::Missing)
        ));
        assert!(matches!(
            verify_sha512_hex(BODY, "not-hex", KEY),
            Err(SignatureError::InvalidHex)
        ));
    }
}
