//! Typed error taxonomy for the authorization core.
//!
//! # Notes
//! The embedding HTTP layer maps these variants to protocol responses
//! (`NotFound`/`Expired` to 404-class, `ConfigurationFault` to 500-class).
//! The core never swallows a `NotFound` or `Expired` condition.
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Persona, session, or key absent when required. Never retried.
    #[error("not found: {0}")]
    NotFound(String),
    /// The session's bound upstream lifetime has elapsed; the session row has
    /// already been deleted as a side effect.
    #[error("session expired")]
    Expired,
    /// A grant spans a tenant other than the persona's.
    #[error("cross-tenant grant: {0}")]
    CrossTenant(String),
    /// No signing key available, or key material unusable. Fatal per request.
    #[error("configuration fault: {0}")]
    ConfigurationFault(String),
    /// Duplicate-write race; recoverable by retrying as an update.
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(message) => AuthError::NotFound(message),
            StoreError::Conflict(message) => AuthError::Conflict(message),
            StoreError::InvalidGrant(message) => AuthError::CrossTenant(message),
            StoreError::Unexpected(err) => AuthError::Unexpected(err),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
