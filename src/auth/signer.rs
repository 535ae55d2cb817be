//! Access-token signing.
//!
//! # Purpose
//! Produces the signed, time-bounded access token embedding resolved roles
//! and scope. Pure apart from the current time and the current signing key,
//! which is read from the key store at the moment of signing rather than held
//! as process-global state.
//!
//! # Architectural role
//! Single source of issued-token semantics: every access token the broker
//! hands out, on authorize and on refresh, is minted here with the same
//! claim set and lifetime bounding.
//!
//! # Callers / consumers
//! - [`crate::broker::AuthorizationBroker`] on both issuance paths.
//! - Relying clients verify the output against the published public keys.
//!
//! # Key invariants
//! - Tokens are RS256 and carry the active key's `kid` in the header.
//! - `exp - iat` never exceeds the configured maximum lifetime, and never
//!   exceeds the remaining upstream/session lifetime supplied by the caller.
//! - An empty key store is a fatal configuration error, not a per-request
//!   recoverable one; bootstrap must have run first.
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::now_epoch_seconds;
use crate::config::BrokerConfig;
use crate::store::BrokerStore;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Claims carried by broker-issued access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// The broker's own canonical URL.
    pub iss: String,
    pub sub: String,
    /// Authorized party: the requesting client identifier.
    pub azp: String,
    /// Space-joined qualified role names.
    pub roles: String,
    /// Space-joined granted permission names.
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub subject: &'a str,
    pub authorized_party: &'a str,
    pub roles: &'a str,
    pub scope: &'a str,
    /// Remaining upstream/session lifetime in seconds; the issued token must
    /// never outlive the assertion it derives from.
    pub lifetime_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    /// Actual bounded lifetime of the token in seconds.
    pub expires_in: u64,
    pub kid: String,
}

/// Sign an access token with the most recently created key.
pub async fn sign(
    store: &dyn BrokerStore,
    config: &BrokerConfig,
    request: &SignRequest<'_>,
) -> AuthResult<SignedToken> {
    let key = store
        .current_key()
        .await?
        .ok_or_else(|| AuthError::ConfigurationFault("no signing key available".to_string()))?;

    let lifetime = request.lifetime_secs.min(config.max_token_lifetime_secs);
    let now = now_epoch_seconds();
    let claims = AccessClaims {
        iss: config.issuer_url.clone(),
        sub: request.subject.to_string(),
        azp: request.authorized_party.to_string(),
        roles: request.roles.to_string(),
        scope: request.scope.to_string(),
        iat: now,
        exp: now + lifetime as i64,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid.clone());
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key_pem.as_bytes())
        .map_err(|err| AuthError::ConfigurationFault(format!("unusable signing key: {err}")))?;
    let token = jsonwebtoken::encode(&header, &claims, &encoding_key)?;
    Ok(SignedToken {
        token,
        expires_in: lifetime,
        kid: key.kid,
    })
}
