//! Store contracts consumed by the authorization core.
//!
//! # Purpose
//! The broker reaches its relational backing store only through these traits.
//! [`EntitlementStore`] covers the persona/role/permission graph plus the
//! write surface its invariants require, [`SessionStore`] the per-persona
//! session row, and [`KeyStore`] the signing key pairs. [`memory`] provides
//! the in-process reference implementation used by tests and local runs;
//! durable backends live with the embedding service.
//!
//! # Key invariants
//! - Cross-tenant grants are rejected at write time, never filtered later.
//! - At most one session exists per persona; `upsert_session` is atomic.
//! - Entitlement lookups filter to the persona's tenant inside the query.
use crate::model::{
    Client, Group, Permission, PersonaKey, PublicKeyRecord, Role, Session, SigningKeyRecord,
    Tenant,
};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid grant: {0}")]
    InvalidGrant(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which clients an entitlement lookup spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientScope {
    /// A single registered client.
    Client(String),
    /// Every client associated with the persona's tenant. Merges per-client
    /// permission namespaces into one flat set; permission names are only
    /// unique per client, so callers must not conflate equal names across
    /// clients.
    AnyClient,
}

impl ClientScope {
    pub fn client(client_id: impl Into<String>) -> Self {
        Self::Client(client_id.into())
    }

    pub fn matches(&self, client_id: &str) -> bool {
        match self {
            Self::Client(wanted) => wanted == client_id,
            Self::AnyClient => true,
        }
    }
}

/// One row of the role-derived entitlement lookup. The permission's owning
/// client always matches the role's owning client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementRow {
    pub role: String,
    pub permission: String,
    pub client_id: String,
}

/// One row of the direct persona-permission lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectGrantRow {
    pub permission: String,
    pub client_id: String,
}

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    // Write surface. The admin CRUD service fronts richer endpoints; this is
    // the minimum the broker's write-time invariants are enforced through.
    async fn create_tenant(&self, tenant: Tenant) -> StoreResult<Tenant>;
    async fn create_client(&self, client: Client) -> StoreResult<Client>;
    async fn associate_client(&self, tenant: &str, client_id: &str) -> StoreResult<()>;
    async fn create_persona(&self, persona: PersonaKey) -> StoreResult<PersonaKey>;
    async fn delete_persona(&self, persona: &PersonaKey) -> StoreResult<()>;
    async fn create_role(&self, role: Role) -> StoreResult<Role>;
    async fn create_permission(&self, permission: Permission) -> StoreResult<Permission>;
    async fn create_group(&self, group: Group) -> StoreResult<Group>;
    async fn assign_role(&self, persona: &PersonaKey, role: &Role) -> StoreResult<()>;
    async fn attach_permission(&self, role: &Role, permission: &Permission) -> StoreResult<()>;
    async fn grant_permission(
        &self,
        persona: &PersonaKey,
        permission: &Permission,
    ) -> StoreResult<()>;

    // Read surface used by resolution.
    async fn lookup_persona(
        &self,
        subject: &str,
        user_context: &str,
        issuer: &str,
    ) -> StoreResult<PersonaKey>;
    async fn lookup_role_entitlements(
        &self,
        subject: &str,
        user_context: &str,
        issuer: &str,
        scope: &ClientScope,
    ) -> StoreResult<Vec<EntitlementRow>>;
    async fn lookup_direct_grants(
        &self,
        subject: &str,
        user_context: &str,
        issuer: &str,
        scope: &ClientScope,
    ) -> StoreResult<Vec<DirectGrantRow>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, persona: &PersonaKey) -> StoreResult<Session>;
    async fn get_session_by_handle(&self, event_id: &str) -> StoreResult<Session>;
    /// Atomic insert-on-conflict-update keyed on the persona. On update the
    /// stored `event_id` is retained and every other field is replaced; the
    /// resulting row is returned.
    async fn upsert_session(&self, session: Session) -> StoreResult<Session>;
    async fn delete_session(&self, persona: &PersonaKey) -> StoreResult<()>;
}

#[async_trait]
pub trait KeyStore: Send + Sync {
    /// The most recently created key, if any.
    async fn current_key(&self) -> StoreResult<Option<SigningKeyRecord>>;
    async fn all_keys(&self) -> StoreResult<Vec<PublicKeyRecord>>;
    async fn insert_key(&self, key: SigningKeyRecord) -> StoreResult<SigningKeyRecord>;
}

/// Umbrella trait the broker holds as `Arc<dyn BrokerStore>`.
pub trait BrokerStore: EntitlementStore + SessionStore + KeyStore {}

impl<T: EntitlementStore + SessionStore + KeyStore> BrokerStore for T {}
