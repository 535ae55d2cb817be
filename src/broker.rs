//! Top-level broker orchestration.
//!
//! # Purpose
//! Composes the resolution engine, session manager, and token signer into the
//! three operations the embedding service exposes: authorize an upstream
//! assertion, refresh by handle, and logout. The HTTP layer owns request
//! validation and timeouts; this module owns the core flow.
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::resolution::{self, ResolutionRequest};
use crate::auth::session::{self, SessionIdentity, SessionUpdate};
use crate::auth::signer::{self, SignRequest};
use crate::auth::{keys, now_epoch_seconds, upstream};
use crate::config::BrokerConfig;
use crate::store::{BrokerStore, ClientScope};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthorizationBroker {
    store: Arc<dyn BrokerStore>,
    config: BrokerConfig,
}

#[derive(Debug, Clone)]
pub struct AuthorizeRequest<'a> {
    /// Encoded upstream token, already verified by the caller.
    pub upstream_token: &'a str,
    /// Optional persona disambiguator; defaults to the empty string.
    pub user_context: Option<&'a str>,
    pub client_scope: ClientScope,
    /// Space-separated permission names to narrow the grant, if any.
    pub requested_scope: Option<&'a str>,
    /// Client identifier placed in the token's `azp` claim.
    pub authorized_party: &'a str,
}

/// Result of a successful authorize or refresh call.
#[derive(Debug, Clone)]
pub struct IssuedAccess {
    pub access_token: String,
    pub refresh_handle: String,
    /// Bounded lifetime of `access_token` in seconds.
    pub expires_in: u64,
    pub roles: BTreeSet<String>,
    pub scope: BTreeSet<String>,
    pub accepted_scope: Option<String>,
}

impl AuthorizationBroker {
    pub fn new(store: Arc<dyn BrokerStore>, config: BrokerConfig) -> Self {
        Self { store, config }
    }

    /// Run the key store bootstrap contract. Must complete before the first
    /// signing request is served.
    pub async fn bootstrap(&self) -> AuthResult<()> {
        keys::bootstrap_keys(self.store.as_ref()).await?;
        Ok(())
    }

    /// Exchange an upstream identity assertion for a narrowed local token and
    /// a refresh handle bound to the assertion's lifetime.
    pub async fn authorize(&self, request: &AuthorizeRequest<'_>) -> AuthResult<IssuedAccess> {
        let claims = upstream::decode_claims(request.upstream_token)?;
        let remaining = claims.exp - now_epoch_seconds();
        if remaining <= 0 {
            // A session created from this assertion would be born expired.
            return Err(AuthError::Expired);
        }
        let user_context = request.user_context.unwrap_or("");

        let resolved = resolution::resolve(
            self.store.as_ref(),
            &ResolutionRequest {
                subject: &claims.sub,
                user_context,
                issuer: &claims.iss,
                client_scope: request.client_scope.clone(),
                requested_scope: request.requested_scope,
            },
        )
        .await?;
        let scope = resolved.scope_string();
        let roles = resolved.roles_string();

        let identity = SessionIdentity {
            subject: &claims.sub,
            user_context,
            issuer: &claims.iss,
        };
        let handle = session::create_or_refresh(
            self.store.as_ref(),
            &identity,
            SessionUpdate {
                // The narrowing state, not the resolved set: an empty outcome
                // of a narrowing must survive as a narrowing.
                scope: resolved.accepted_scope.as_deref(),
                upstream_token: request.upstream_token,
                idp_expiration_time: claims.exp,
            },
        )
        .await?;

        let signed = signer::sign(
            self.store.as_ref(),
            &self.config,
            &SignRequest {
                subject: &claims.sub,
                authorized_party: request.authorized_party,
                roles: &roles,
                scope: &scope,
                lifetime_secs: remaining as u64,
            },
        )
        .await?;

        Ok(IssuedAccess {
            access_token: signed.token,
            refresh_handle: handle,
            expires_in: signed.expires_in,
            roles: resolved.roles,
            scope: resolved.permissions,
            accepted_scope: resolved.accepted_scope,
        })
    }

    /// Mint a new access token from a refresh handle, without the original
    /// upstream token. Entitlements are re-resolved under the narrowing the
    /// session recorded, so revoked grants fall out of the refreshed token
    /// and a narrowed grant can never widen back to the full entitled set.
    pub async fn refresh(
        &self,
        handle: &str,
        authorized_party: &str,
        client_scope: ClientScope,
    ) -> AuthResult<IssuedAccess> {
        let grant = session::refresh_by_handle(self.store.as_ref(), handle).await?;

        let resolved = resolution::resolve(
            self.store.as_ref(),
            &ResolutionRequest {
                subject: &grant.subject,
                user_context: &grant.user_context,
                issuer: &grant.issuer,
                client_scope,
                requested_scope: grant.scope.as_deref(),
            },
        )
        .await?;
        let scope = resolved.scope_string();
        let roles = resolved.roles_string();

        let signed = signer::sign(
            self.store.as_ref(),
            &self.config,
            &SignRequest {
                subject: &grant.subject,
                authorized_party,
                roles: &roles,
                scope: &scope,
                lifetime_secs: grant.remaining_lifetime_secs,
            },
        )
        .await?;

        Ok(IssuedAccess {
            access_token: signed.token,
            refresh_handle: handle.to_string(),
            expires_in: signed.expires_in,
            roles: resolved.roles,
            scope: resolved.permissions,
            accepted_scope: resolved.accepted_scope,
        })
    }

    /// Explicit logout: drop the persona's session so its handle dies.
    pub async fn logout(&self, identity: &SessionIdentity<'_>) -> AuthResult<()> {
        session::invalidate(self.store.as_ref(), identity).await
    }
}
