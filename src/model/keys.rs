//! Signing key records.
use serde::Serialize;

/// An asymmetric signing key pair held by the key store.
///
/// Multiple keys may coexist for rotation; the most recently created is the
/// current signing key. The private PEM must never be logged or serialized
/// outside storage.
#[derive(Debug, Clone)]
pub struct SigningKeyRecord {
    pub kid: String,
    pub public_key_pem: String,
    pub private_key_pem: String,
    /// Unix seconds at creation; newest wins selection.
    pub created_at: i64,
}

/// Public half of a signing key, safe to publish.
#[derive(Debug, Clone, Serialize)]
pub struct PublicKeyRecord {
    pub kid: String,
    pub public_key_pem: String,
}
