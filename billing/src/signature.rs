use hmac::{Hmac, Mac};
use painscout_core::BillingError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

/// Hex HMAC-SHA256 of the raw request body.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks the provider signature over the exact bytes received.
pub fn verify_signature(
    body: &[u8],
    signature: Option<&str>,
    secret: &str,
) -> Result<(), BillingError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(BillingError::MissingSignature)?;

    let expected = sign(body, secret);
    if expected.is_empty()
        || !constant_time_eq(signature.to_ascii_lowercase().as_bytes(), expected.as_bytes())
    {
        return Err(BillingError::InvalidSignature);
    }
    Ok(())
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
