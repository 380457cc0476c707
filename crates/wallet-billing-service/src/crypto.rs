//! Cryptographic utilities for payment verification.
//!
//! Razorpay signs a completed checkout as
//! `hex(HMAC_SHA256(key_secret, order_id + "|" + payment_id))`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 and return the hex-encoded result (64 characters).
///
/// Returns `None` only if the MAC rejects the key, which HMAC never does for
/// any key length.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Verify a Razorpay checkout signature.
///
/// The comparison is case-insensitive on the hex digits and runs in constant
/// time for equal-length inputs.
#[must_use]
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Some(expected) = hmac_sha256_hex(key_secret, &format!("{order_id}|{payment_id}")) else {
        return false;
    };
    constant_time_eq(&expected, &signature.trim().to_ascii_lowercase())
}
