//! Tenant model definitions.
use serde::{Deserialize, Serialize};

/// An organizational boundary tied to one upstream identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Tenant {
    /// Unique tenant name.
    pub name: String,
    /// Issuer identifier (`iss`) of the tenant's identity provider.
    pub issuer: String,
    /// Location of the identity provider's JWKS document.
    pub jwks_uri: String,
}
