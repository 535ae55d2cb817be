//! Session model definitions.
use crate::model::PersonaKey;
use serde::{Deserialize, Serialize};

/// A live authorization session; at most one exists per persona.
///
/// The session's lifetime is capped by the upstream token's expiration as
/// recorded at creation time and is never extended by refresh operations.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    pub persona: PersonaKey,
    /// Opaque refresh handle; stable across re-authorizations of the persona.
    pub event_id: String,
    /// Unix seconds at which the session was created or last re-authorized.
    pub authorization_time: i64,
    /// Unix seconds at which the upstream identity assertion expires.
    pub idp_expiration_time: i64,
    /// The narrowing scope accepted at authorization, space-joined. `None`
    /// when the grant was never narrowed; a narrowing that matched nothing
    /// stays `Some` so refresh cannot widen it back to the full set.
    pub scope: Option<String>,
    /// Encoded copy of the original upstream token.
    pub upstream_token: String,
}
