//! Session lifecycle bound to the upstream identity assertion.
//!
//! # Purpose
//! Maintains at most one active session per persona, binds the session to the
//! upstream token's expiration, and hands out the opaque refresh handle that
//! stands in for a live upstream session.
//!
//! # Architectural role
//! Owns the mapping between refresh handles and live sessions; resolution
//! and signing never see a handle, only the identity and scope this module
//! recovers from one.
//!
//! # Callers / consumers
//! - [`crate::broker::AuthorizationBroker`] for authorize, refresh, logout.
//! - Tests that assert handle stability and lazy expiry.
//!
//! # Key invariants
//! - The refresh handle is stable across re-authorizations of one persona.
//! - A session never outlives the `idp_expiration_time` recorded when it was
//!   created; expiry is computed on read and triggers deletion (no persisted
//!   "expired" state).
//! - The session records the narrowing state of its grant, `None` for
//!   unrestricted; refresh replays it exactly, so a grant narrowed to
//!   nothing stays empty.
//! - Handles carry 256 bits of CSPRNG output; guessing one is infeasible.
//!
//! # Concurrency model
//! Stateless over an async store; the store's atomic upsert is what makes
//! concurrent create-or-refresh calls for one persona converge on a single
//! session and handle.
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::{now_epoch_seconds, upstream};
use crate::model::Session;
use crate::store::BrokerStore;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

const HANDLE_BYTES: usize = 32;

/// The identity triple naming one persona.
#[derive(Debug, Clone, Copy)]
pub struct SessionIdentity<'a> {
    pub subject: &'a str,
    pub user_context: &'a str,
    pub issuer: &'a str,
}

/// Fields re-recorded on every authorization of a persona.
#[derive(Debug, Clone, Copy)]
pub struct SessionUpdate<'a> {
    /// Accepted narrowing scope, space-joined; `None` for an unrestricted
    /// grant. An empty narrowing outcome is still `Some`.
    pub scope: Option<&'a str>,
    /// Encoded upstream token as presented by the caller.
    pub upstream_token: &'a str,
    /// Unix seconds at which the upstream assertion expires.
    pub idp_expiration_time: i64,
}

/// What a valid refresh handle resolves to.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    /// Subject claim decoded from the stored upstream token.
    pub subject: String,
    /// Issuer claim decoded from the stored upstream token.
    pub issuer: String,
    pub user_context: String,
    /// The narrowing recorded on the session, if the grant was narrowed.
    pub scope: Option<String>,
    /// Seconds until the upstream assertion expires; bounds the next token.
    pub remaining_lifetime_secs: u64,
}

/// Generate an opaque refresh handle: 32 random bytes, base64url.
pub fn generate_refresh_handle() -> String {
    let mut bytes = [0u8; HANDLE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Create the persona's session or refresh it in place.
///
/// Returns the session's refresh handle. A fresh handle is generated for the
/// insert path only; when a session already exists the store keeps the
/// existing handle and this returns it unchanged.
pub async fn create_or_refresh(
    store: &dyn BrokerStore,
    identity: &SessionIdentity<'_>,
    update: SessionUpdate<'_>,
) -> AuthResult<String> {
    let persona = store
        .lookup_persona(identity.subject, identity.user_context, identity.issuer)
        .await?;
    let candidate = Session {
        persona,
        event_id: generate_refresh_handle(),
        authorization_time: now_epoch_seconds(),
        idp_expiration_time: update.idp_expiration_time,
        scope: update.scope.map(str::to_string),
        upstream_token: update.upstream_token.to_string(),
    };
    let stored = store.upsert_session(candidate).await?;
    tracing::debug!(
        subject = identity.subject,
        issuer = identity.issuer,
        idp_expiration_time = stored.idp_expiration_time,
        "session created or refreshed"
    );
    Ok(stored.event_id)
}

/// Resolve a refresh handle to its session, enforcing lazy expiry.
///
/// An expired session is deleted and reported as [`AuthError::Expired`]; a
/// later attempt with the same handle sees [`AuthError::NotFound`].
pub async fn refresh_by_handle(store: &dyn BrokerStore, handle: &str) -> AuthResult<RefreshGrant> {
    let session = store.get_session_by_handle(handle).await?;
    let remaining = session.idp_expiration_time - now_epoch_seconds();
    if remaining <= 0 {
        store.delete_session(&session.persona).await?;
        tracing::info!(
            subject = session.persona.subject,
            tenant = session.persona.tenant,
            "session past upstream expiration, deleted"
        );
        return Err(AuthError::Expired);
    }
    let claims = upstream::decode_claims(&session.upstream_token)?;
    Ok(RefreshGrant {
        subject: claims.sub,
        issuer: claims.iss,
        user_context: session.persona.user_context,
        scope: session.scope,
        remaining_lifetime_secs: remaining as u64,
    })
}

/// Delete the persona's session, if any. Explicit logout / revocation.
pub async fn invalidate(store: &dyn BrokerStore, identity: &SessionIdentity<'_>) -> AuthResult<()> {
    let persona = store
        .lookup_persona(identity.subject, identity.user_context, identity.issuer)
        .await?;
    store.delete_session(&persona).await?;
    tracing::debug!(subject = identity.subject, "session invalidated");
    Ok(())
}
