//! HMAC-SHA256 signatures on provider webhook bodies.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::ProviderError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Signature header value for `body`, as the provider sends it.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ProviderError::Config("unusable webhook secret".to_string()))?;
    mac.update(body);
    Ok(format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
}

/// Check `signature` (`sha256=<hex>` or bare hex) against the raw body.
///
/// The comparison is constant time.
pub fn verify(secret: Option<&str>, body: &[u8], signature: Option<&str>) -> Result<(), ProviderError> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(ProviderError::InvalidSignature("webhook secret not configured"))?;
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ProviderError::InvalidSignature("missing signature"))?;

    let encoded = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    let provided = hex::decode(encoded).map_err(|_| ProviderError::InvalidSignature("signature is not hex"))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ProviderError::InvalidSignature("unusable webhook secret"))?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| ProviderError::InvalidSignature("signature mismatch"))
}
