//! Claim extraction from already-verified upstream identity tokens.
//!
//! # Notes
//! The broker consumes tokens that an external layer has already verified
//! against the tenant's identity provider; it never re-validates signatures
//! or expiry here. What it needs from the encoded token are the `sub`, `iss`,
//! and `exp` claims.
use crate::auth::error::AuthResult;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// The upstream claims the broker depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamClaims {
    pub sub: String,
    pub iss: String,
    /// Unix seconds; caps every session and token derived from this assertion.
    pub exp: i64,
}

/// Decode `sub`/`iss`/`exp` from an encoded JWT without verifying it.
pub fn decode_claims(token: &str) -> AuthResult<UpstreamClaims> {
    let header = jsonwebtoken::decode_header(token)?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    // The key is unused with signature validation disabled.
    let data = jsonwebtoken::decode::<UpstreamClaims>(
        token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )?;
    Ok(data.claims)
}
