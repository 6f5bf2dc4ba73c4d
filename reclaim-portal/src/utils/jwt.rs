use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;

/// Decode JWT claims without validation
///
/// Only for tokens this process obtained itself over an authenticated
/// channel (cloud session tokens), where the claims are read for the tenancy
/// and expiry. ID tokens from the identity provider are always verified
/// against the JWKS instead.
pub fn decode_claims_unverified<T: DeserializeOwned>(token: &str) -> Result<T> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    // Decode the payload (second part)
    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: T = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}
