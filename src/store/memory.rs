//! In-memory implementation of the broker store.
//!
//! # Purpose
//! Implements the store traits entirely in memory using `HashMap`s guarded by
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - as the reference for durable backends (same invariants, same errors)
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: write locks for mutations, read locks
//!   for reads. `upsert_session` performs lookup and write under one write
//!   lock, which is what makes concurrent create-or-refresh for the same
//!   persona safe, and it holds the persona read lock across the write so a
//!   racing persona delete cannot orphan a session row.
//!
//! # Cascading deletes
//! Deleting a persona removes its role assignments, direct grants, and
//! session by scanning keys. Durable backends should implement the cascade
//! via foreign-key constraints.
use super::{
    ClientScope, DirectGrantRow, EntitlementRow, EntitlementStore, KeyStore, SessionStore,
    StoreError, StoreResult,
};
use crate::model::{
    Client, Group, Permission, PersonaKey, PublicKeyRecord, Role, Session, SigningKeyRecord,
    Tenant,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

type RoleKey = (String, String);
type PermissionKey = (String, String);

/// In-memory broker store. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    /// Tenants keyed by name.
    tenants: Arc<RwLock<HashMap<String, Tenant>>>,
    /// Clients keyed by client_id.
    clients: Arc<RwLock<HashMap<String, Client>>>,
    /// Tenant↔client association pairs (tenant name, client_id).
    tenant_clients: Arc<RwLock<HashSet<(String, String)>>>,
    /// Persona identity triples.
    personas: Arc<RwLock<HashSet<PersonaKey>>>,
    /// Roles keyed by (client_id, name).
    roles: Arc<RwLock<HashSet<RoleKey>>>,
    /// Permissions keyed by (client_id, name).
    permissions: Arc<RwLock<HashSet<PermissionKey>>>,
    /// Groups keyed by name. Inert for resolution, kept for the bridge model.
    groups: Arc<RwLock<HashMap<String, Group>>>,
    /// Role assignments per persona.
    persona_roles: Arc<RwLock<HashMap<PersonaKey, HashSet<RoleKey>>>>,
    /// Permissions attached to each role; owning client matches the role's.
    role_permissions: Arc<RwLock<HashMap<RoleKey, HashSet<String>>>>,
    /// Direct persona grants, bypassing roles.
    persona_permissions: Arc<RwLock<HashMap<PersonaKey, HashSet<PermissionKey>>>>,
    /// At most one session per persona.
    sessions: Arc<RwLock<HashMap<PersonaKey, Session>>>,
    /// Signing keys in insertion order; selection is by `created_at`.
    keys: Arc<RwLock<Vec<SigningKeyRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clients associated with a tenant that also fall within `scope`.
    async fn scoped_clients(&self, tenant: &str, scope: &ClientScope) -> HashSet<String> {
        self.tenant_clients
            .read()
            .await
            .iter()
            .filter(|(tenant_name, client_id)| tenant_name == tenant && scope.matches(client_id))
            .map(|(_, client_id)| client_id.clone())
            .collect()
    }

    async fn find_persona(
        &self,
        subject: &str,
        user_context: &str,
        issuer: &str,
    ) -> StoreResult<PersonaKey> {
        let tenant = self
            .tenants
            .read()
            .await
            .values()
            .find(|tenant| tenant.issuer == issuer)
            .map(|tenant| tenant.name.clone())
            .ok_or_else(|| StoreError::NotFound(format!("tenant for issuer {issuer}")))?;
        let key = PersonaKey {
            tenant,
            subject: subject.to_string(),
            user_context: user_context.to_string(),
        };
        if self.personas.read().await.contains(&key) {
            Ok(key)
        } else {
            Err(StoreError::NotFound(format!("persona {subject}")))
        }
    }
}

#[async_trait]
impl EntitlementStore for InMemoryStore {
    async fn create_tenant(&self, tenant: Tenant) -> StoreResult<Tenant> {
        let mut tenants = self.tenants.write().await;
        if tenants.contains_key(&tenant.name) {
            return Err(StoreError::Conflict(format!("tenant {}", tenant.name)));
        }
        tenants.insert(tenant.name.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn create_client(&self, client: Client) -> StoreResult<Client> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.client_id) {
            return Err(StoreError::Conflict(format!("client {}", client.client_id)));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(client)
    }

    async fn associate_client(&self, tenant: &str, client_id: &str) -> StoreResult<()> {
        if !self.tenants.read().await.contains_key(tenant) {
            return Err(StoreError::NotFound(format!("tenant {tenant}")));
        }
        if !self.clients.read().await.contains_key(client_id) {
            return Err(StoreError::NotFound(format!("client {client_id}")));
        }
        self.tenant_clients
            .write()
            .await
            .insert((tenant.to_string(), client_id.to_string()));
        Ok(())
    }

    async fn create_persona(&self, persona: PersonaKey) -> StoreResult<PersonaKey> {
        if !self.tenants.read().await.contains_key(&persona.tenant) {
            return Err(StoreError::NotFound(format!("tenant {}", persona.tenant)));
        }
        let mut personas = self.personas.write().await;
        if !personas.insert(persona.clone()) {
            return Err(StoreError::Conflict(format!(
                "persona {} in tenant {}",
                persona.subject, persona.tenant
            )));
        }
        Ok(persona)
    }

    async fn delete_persona(&self, persona: &PersonaKey) -> StoreResult<()> {
        if !self.personas.write().await.remove(persona) {
            return Err(StoreError::NotFound(format!("persona {}", persona.subject)));
        }
        self.persona_roles.write().await.remove(persona);
        self.persona_permissions.write().await.remove(persona);
        // Session rows are exclusively owned by their persona; cascade.
        self.sessions.write().await.remove(persona);
        Ok(())
    }

    async fn create_role(&self, role: Role) -> StoreResult<Role> {
        if !self.clients.read().await.contains_key(&role.client_id) {
            return Err(StoreError::NotFound(format!("client {}", role.client_id)));
        }
        let key = (role.client_id.clone(), role.name.clone());
        if !self.roles.write().await.insert(key) {
            return Err(StoreError::Conflict(format!("role {}", role.qualified_name())));
        }
        Ok(role)
    }

    async fn create_permission(&self, permission: Permission) -> StoreResult<Permission> {
        if !self.clients.read().await.contains_key(&permission.client_id) {
            return Err(StoreError::NotFound(format!(
                "client {}",
                permission.client_id
            )));
        }
        let key = (permission.client_id.clone(), permission.name.clone());
        if !self.permissions.write().await.insert(key) {
            // Unique per client only; an equal name under another client is fine.
            return Err(StoreError::Conflict(format!(
                "permission {} on client {}",
                permission.name, permission.client_id
            )));
        }
        Ok(permission)
    }

    async fn create_group(&self, group: Group) -> StoreResult<Group> {
        let roles = self.roles.read().await;
        for role in &group.roles {
            if !roles.contains(&(role.client_id.clone(), role.name.clone())) {
                return Err(StoreError::NotFound(format!("role {}", role.qualified_name())));
            }
        }
        drop(roles);
        let mut groups = self.groups.write().await;
        if groups.contains_key(&group.name) {
            return Err(StoreError::Conflict(format!("group {}", group.name)));
        }
        groups.insert(group.name.clone(), group.clone());
        Ok(group)
    }

    async fn assign_role(&self, persona: &PersonaKey, role: &Role) -> StoreResult<()> {
        if !self.personas.read().await.contains(persona) {
            return Err(StoreError::NotFound(format!("persona {}", persona.subject)));
        }
        let key = (role.client_id.clone(), role.name.clone());
        if !self.roles.read().await.contains(&key) {
            return Err(StoreError::NotFound(format!("role {}", role.qualified_name())));
        }
        // Cross-tenant grants are invalid and rejected here, at write time.
        let associated = self
            .tenant_clients
            .read()
            .await
            .contains(&(persona.tenant.clone(), role.client_id.clone()));
        if !associated {
            return Err(StoreError::InvalidGrant(format!(
                "role {} belongs to a client outside tenant {}",
                role.qualified_name(),
                persona.tenant
            )));
        }
        self.persona_roles
            .write()
            .await
            .entry(persona.clone())
            .or_default()
            .insert(key);
        Ok(())
    }

    async fn attach_permission(&self, role: &Role, permission: &Permission) -> StoreResult<()> {
        if role.client_id != permission.client_id {
            return Err(StoreError::InvalidGrant(format!(
                "permission {} is owned by client {}, not {}",
                permission.name, permission.client_id, role.client_id
            )));
        }
        let role_key = (role.client_id.clone(), role.name.clone());
        if !self.roles.read().await.contains(&role_key) {
            return Err(StoreError::NotFound(format!("role {}", role.qualified_name())));
        }
        let permission_key = (permission.client_id.clone(), permission.name.clone());
        if !self.permissions.read().await.contains(&permission_key) {
            return Err(StoreError::NotFound(format!("permission {}", permission.name)));
        }
        self.role_permissions
            .write()
            .await
            .entry(role_key)
            .or_default()
            .insert(permission.name.clone());
        Ok(())
    }

    async fn grant_permission(
        &self,
        persona: &PersonaKey,
        permission: &Permission,
    ) -> StoreResult<()> {
        if !self.personas.read().await.contains(persona) {
            return Err(StoreError::NotFound(format!("persona {}", persona.subject)));
        }
        let key = (permission.client_id.clone(), permission.name.clone());
        if !self.permissions.read().await.contains(&key) {
            return Err(StoreError::NotFound(format!("permission {}", permission.name)));
        }
        let associated = self
            .tenant_clients
            .read()
            .await
            .contains(&(persona.tenant.clone(), permission.client_id.clone()));
        if !associated {
            return Err(StoreError::InvalidGrant(format!(
                "permission {} belongs to a client outside tenant {}",
                permission.name, persona.tenant
            )));
        }
        self.persona_permissions
            .write()
            .await
            .entry(persona.clone())
            .or_default()
            .insert(key);
        Ok(())
    }

    async fn lookup_persona(
        &self,
        subject: &str,
        user_context: &str,
        issuer: &str,
    ) -> StoreResult<PersonaKey> {
        self.find_persona(subject, user_context, issuer).await
    }

    async fn lookup_role_entitlements(
        &self,
        subject: &str,
        user_context: &str,
        issuer: &str,
        scope: &ClientScope,
    ) -> StoreResult<Vec<EntitlementRow>> {
        let persona = self.find_persona(subject, user_context, issuer).await?;
        // Tenant filtering happens here, inside the lookup: only clients
        // associated with the persona's tenant can contribute rows.
        let allowed = self.scoped_clients(&persona.tenant, scope).await;
        let persona_roles = self.persona_roles.read().await;
        let role_permissions = self.role_permissions.read().await;
        let mut rows = Vec::new();
        if let Some(assigned) = persona_roles.get(&persona) {
            for role_key in assigned {
                let (client_id, role_name) = role_key;
                if !allowed.contains(client_id) {
                    continue;
                }
                if let Some(names) = role_permissions.get(role_key) {
                    for permission in names {
                        rows.push(EntitlementRow {
                            role: role_name.clone(),
                            permission: permission.clone(),
                            client_id: client_id.clone(),
                        });
                    }
                }
            }
        }
        Ok(rows)
    }

    async fn lookup_direct_grants(
        &self,
        subject: &str,
        user_context: &str,
        issuer: &str,
        scope: &ClientScope,
    ) -> StoreResult<Vec<DirectGrantRow>> {
        let persona = self.find_persona(subject, user_context, issuer).await?;
        let allowed = self.scoped_clients(&persona.tenant, scope).await;
        let persona_permissions = self.persona_permissions.read().await;
        let mut rows = Vec::new();
        if let Some(granted) = persona_permissions.get(&persona) {
            for (client_id, permission) in granted {
                if !allowed.contains(client_id) {
                    continue;
                }
                rows.push(DirectGrantRow {
                    permission: permission.clone(),
                    client_id: client_id.clone(),
                });
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get_session(&self, persona: &PersonaKey) -> StoreResult<Session> {
        self.sessions
            .read()
            .await
            .get(persona)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("session for {}", persona.subject)))
    }

    async fn get_session_by_handle(&self, event_id: &str) -> StoreResult<Session> {
        self.sessions
            .read()
            .await
            .values()
            .find(|session| session.event_id == event_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("session for handle".to_string()))
    }

    async fn upsert_session(&self, session: Session) -> StoreResult<Session> {
        // Sessions are exclusively owned by their persona: the persona read
        // lock is held across the write so a concurrent persona delete cannot
        // leave an orphan, still-refreshable row behind.
        let personas = self.personas.read().await;
        if !personas.contains(&session.persona) {
            return Err(StoreError::NotFound(format!(
                "persona {}",
                session.persona.subject
            )));
        }
        // Single write lock covers lookup and write, so there is no
        // check-then-act window between concurrent calls for one persona.
        let mut sessions = self.sessions.write().await;
        let stored = match sessions.get_mut(&session.persona) {
            Some(existing) => {
                // The refresh handle is stable across re-authorizations.
                existing.authorization_time = session.authorization_time;
                existing.idp_expiration_time = session.idp_expiration_time;
                existing.scope = session.scope;
                existing.upstream_token = session.upstream_token;
                existing.clone()
            }
            None => {
                sessions.insert(session.persona.clone(), session.clone());
                session
            }
        };
        Ok(stored)
    }

    async fn delete_session(&self, persona: &PersonaKey) -> StoreResult<()> {
        self.sessions
            .write()
            .await
            .remove(persona)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("session for {}", persona.subject)))
    }
}

#[async_trait]
impl KeyStore for InMemoryStore {
    async fn current_key(&self) -> StoreResult<Option<SigningKeyRecord>> {
        // Newest by creation time; later insertion wins ties.
        let keys = self.keys.read().await;
        let mut current: Option<&SigningKeyRecord> = None;
        for key in keys.iter() {
            if current.is_none_or(|found| key.created_at >= found.created_at) {
                current = Some(key);
            }
        }
        Ok(current.cloned())
    }

    async fn all_keys(&self) -> StoreResult<Vec<PublicKeyRecord>> {
        Ok(self
            .keys
            .read()
            .await
            .iter()
            .map(|key| PublicKeyRecord {
                kid: key.kid.clone(),
                public_key_pem: key.public_key_pem.clone(),
            })
            .collect())
    }

    async fn insert_key(&self, key: SigningKeyRecord) -> StoreResult<SigningKeyRecord> {
        let mut keys = self.keys.write().await;
        if keys.iter().any(|existing| existing.kid == key.kid) {
            return Err(StoreError::Conflict(format!("signing key {}", key.kid)));
        }
        keys.push(key.clone());
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(name: &str, issuer: &str) -> Tenant {
        Tenant {
            name: name.to_string(),
            issuer: issuer.to_string(),
            jwks_uri: format!("{issuer}/.well-known/jwks.json"),
        }
    }

    fn client(client_id: &str) -> Client {
        Client {
            client_id: client_id.to_string(),
            display_name: client_id.to_string(),
            description: String::new(),
            secret: "s3cret".to_string(),
        }
    }

    fn key(kid: &str, created_at: i64) -> SigningKeyRecord {
        SigningKeyRecord {
            kid: kid.to_string(),
            public_key_pem: "pub".to_string(),
            private_key_pem: "priv".to_string(),
            created_at,
        }
    }

    fn session(persona: &PersonaKey, event_id: &str) -> Session {
        Session {
            persona: persona.clone(),
            event_id: event_id.to_string(),
            authorization_time: 100,
            idp_expiration_time: 200,
            scope: Some("p1".to_string()),
            upstream_token: "token".to_string(),
        }
    }

    async fn store_with_persona() -> (InMemoryStore, PersonaKey) {
        let store = InMemoryStore::new();
        store
            .create_tenant(tenant("t1", "https://idp.example"))
            .await
            .expect("tenant");
        let persona = store
            .create_persona(PersonaKey::new("t1", "user-1"))
            .await
            .expect("persona");
        (store, persona)
    }

    #[tokio::test]
    async fn duplicate_persona_conflicts() {
        let store = InMemoryStore::new();
        store
            .create_tenant(tenant("t1", "https://idp.example"))
            .await
            .expect("tenant");
        let persona = PersonaKey::new("t1", "user-1");
        store.create_persona(persona.clone()).await.expect("persona");
        assert!(matches!(
            store.create_persona(persona).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn cross_tenant_role_assignment_rejected() {
        let store = InMemoryStore::new();
        store
            .create_tenant(tenant("t1", "https://idp-one.example"))
            .await
            .expect("tenant");
        store
            .create_tenant(tenant("t2", "https://idp-two.example"))
            .await
            .expect("tenant");
        store.create_client(client("c2")).await.expect("client");
        store.associate_client("t2", "c2").await.expect("associate");
        let role = Role::new("c2", "admin");
        store.create_role(role.clone()).await.expect("role");
        let persona = store
            .create_persona(PersonaKey::new("t1", "user-1"))
            .await
            .expect("persona");
        assert!(matches!(
            store.assign_role(&persona, &role).await,
            Err(StoreError::InvalidGrant(_))
        ));
    }

    #[tokio::test]
    async fn attach_permission_requires_same_client() {
        let store = InMemoryStore::new();
        store
            .create_tenant(tenant("t1", "https://idp.example"))
            .await
            .expect("tenant");
        store.create_client(client("c1")).await.expect("client");
        store.create_client(client("c2")).await.expect("client");
        let role = store.create_role(Role::new("c1", "admin")).await.expect("role");
        let permission = store
            .create_permission(Permission::new("c2", "read"))
            .await
            .expect("permission");
        assert!(matches!(
            store.attach_permission(&role, &permission).await,
            Err(StoreError::InvalidGrant(_))
        ));
    }

    #[tokio::test]
    async fn upsert_preserves_event_id() {
        let (store, persona) = store_with_persona().await;
        let first = store
            .upsert_session(session(&persona, "handle-1"))
            .await
            .expect("insert");
        let mut second = session(&persona, "handle-2");
        second.idp_expiration_time = 300;
        second.scope = Some("p2".to_string());
        let stored = store.upsert_session(second).await.expect("update");
        assert_eq!(stored.event_id, first.event_id);
        assert_eq!(stored.idp_expiration_time, 300);
        assert_eq!(stored.scope.as_deref(), Some("p2"));
        let by_handle = store.get_session_by_handle("handle-1").await.expect("get");
        assert_eq!(by_handle.persona, persona);
        assert!(matches!(
            store.get_session_by_handle("handle-2").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn persona_delete_cascades_session() {
        let (store, persona) = store_with_persona().await;
        store
            .upsert_session(session(&persona, "handle-1"))
            .await
            .expect("session");
        store.delete_persona(&persona).await.expect("delete");
        assert!(matches!(
            store.get_session(&persona).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn upsert_requires_a_live_persona() {
        let (store, persona) = store_with_persona().await;
        store.delete_persona(&persona).await.expect("delete");
        // A write racing a persona delete must not recreate the session.
        assert!(matches!(
            store.upsert_session(session(&persona, "handle-1")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_session(&persona).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn current_key_is_newest() {
        let store = InMemoryStore::new();
        store.insert_key(key("k1", 100)).await.expect("k1");
        store.insert_key(key("k2", 200)).await.expect("k2");
        store.insert_key(key("k3", 150)).await.expect("k3");
        let current = store.current_key().await.expect("query").expect("key");
        assert_eq!(current.kid, "k2");
        // Rotation keeps every public half available to verifiers.
        let published = store.all_keys().await.expect("all");
        assert_eq!(published.len(), 3);
        assert!(published.iter().all(|entry| entry.public_key_pem == "pub"));
    }

    #[tokio::test]
    async fn group_creation_requires_existing_roles() {
        let store = InMemoryStore::new();
        store
            .create_tenant(tenant("t1", "https://idp.example"))
            .await
            .expect("tenant");
        store.create_client(client("c1")).await.expect("client");
        let role = store.create_role(Role::new("c1", "admin")).await.expect("role");
        assert!(matches!(
            store
                .create_group(Group {
                    name: "ops".to_string(),
                    roles: vec![Role::new("c1", "missing")],
                })
                .await,
            Err(StoreError::NotFound(_))
        ));
        store
            .create_group(Group {
                name: "ops".to_string(),
                roles: vec![role],
            })
            .await
            .expect("group");
    }

    #[tokio::test]
    async fn permission_names_are_per_client() {
        let store = InMemoryStore::new();
        store
            .create_tenant(tenant("t1", "https://idp.example"))
            .await
            .expect("tenant");
        store.create_client(client("c1")).await.expect("client");
        store.create_client(client("c2")).await.expect("client");
        store
            .create_permission(Permission::new("c1", "read"))
            .await
            .expect("first");
        // Same name under another client is not a conflict.
        store
            .create_permission(Permission::new("c2", "read"))
            .await
            .expect("second");
        assert!(matches!(
            store.create_permission(Permission::new("c1", "read")).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
