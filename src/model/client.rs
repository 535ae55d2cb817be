//! Client application model definitions.
use serde::{Deserialize, Serialize};

/// A registered application that can request tokens. Owns roles and
/// permissions; associated with tenants many-to-many.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Client {
    /// Unique client identifier, also the `azp` value in issued tokens.
    pub client_id: String,
    pub display_name: String,
    pub description: String,
    /// Shared secret for the excluded client-authentication surface.
    pub secret: String,
}
