//! Entitlement resolution for a persona within a tenant/client scope.
//!
//! # Purpose
//! Computes the entitled permission set from two independent sources, narrows
//! it against a caller-requested scope, and re-derives the minimal role set
//! that justifies the result.
//!
//! # Architectural role
//! The authorization decision point: everything a token asserts about roles
//! and scope originates here, and nothing downstream re-derives or widens it.
//!
//! # Callers / consumers
//! - [`crate::broker::AuthorizationBroker`] on authorize and on refresh,
//!   where the session's recorded narrowing is replayed as the request.
//!
//! # Concurrency model
//! The two store lookups run concurrently and join before any set logic;
//! the narrowing itself is pure and shares no state.
//!
//! # Key invariants
//! - Role-derived and direct grants union into one de-duplicated set; there
//!   is no precedence between the sources.
//! - A requested scope is a filter, never a validation gate: unknown or
//!   unentitled names silently narrow the result.
//! - No role appears in the output without at least one of its permissions
//!   surviving narrowing, keeping the `roles` claim consistent with `scope`.
//! - Tenant filtering happens inside the store lookups; nothing cross-tenant
//!   can reach this module.
use crate::auth::error::AuthResult;
use crate::store::{BrokerStore, ClientScope, DirectGrantRow, EntitlementRow};
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone)]
pub struct ResolutionRequest<'a> {
    pub subject: &'a str,
    pub user_context: &'a str,
    pub issuer: &'a str,
    pub client_scope: ClientScope,
    /// Space-separated permission names to narrow against, if any.
    pub requested_scope: Option<&'a str>,
}

/// Resolved entitlements for one persona and client scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccess {
    /// Qualified `client_id:name` role names justifying the permission set.
    pub roles: BTreeSet<String>,
    /// Granted permission names, possibly narrowed.
    pub permissions: BTreeSet<String>,
    /// Echo of the originally-requested scope string, when one was supplied.
    pub accepted_scope: Option<String>,
}

impl ResolvedAccess {
    pub fn scope_string(&self) -> String {
        join_spaced(&self.permissions)
    }

    pub fn roles_string(&self) -> String {
        join_spaced(&self.roles)
    }
}

fn join_spaced(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(" ")
}

/// Resolve the entitled roles and permissions for a persona.
///
/// The two entitlement lookups are independent and issued concurrently; both
/// must complete before the union and narrowing steps run. Under the
/// wildcard client scope, permissions from multiple clients merge into one
/// flat set even though names are only unique per client.
pub async fn resolve(
    store: &dyn BrokerStore,
    request: &ResolutionRequest<'_>,
) -> AuthResult<ResolvedAccess> {
    let (role_rows, direct_rows) = tokio::join!(
        store.lookup_role_entitlements(
            request.subject,
            request.user_context,
            request.issuer,
            &request.client_scope,
        ),
        store.lookup_direct_grants(
            request.subject,
            request.user_context,
            request.issuer,
            &request.client_scope,
        ),
    );
    Ok(narrow(&role_rows?, &direct_rows?, request.requested_scope))
}

/// Union, narrow, and re-derive. Pure; separated from the store round trips
/// so the set semantics are testable in isolation.
fn narrow(
    role_rows: &[EntitlementRow],
    direct_rows: &[DirectGrantRow],
    requested_scope: Option<&str>,
) -> ResolvedAccess {
    // Group membership is a declared entitlement source but contributes
    // nothing yet; only the two lookups below feed the union.
    let mut entitled: BTreeSet<String> = role_rows
        .iter()
        .map(|row| row.permission.clone())
        .collect();
    entitled.extend(direct_rows.iter().map(|row| row.permission.clone()));

    let (permissions, accepted_scope) = match requested_scope.filter(|s| !s.trim().is_empty()) {
        None => (entitled, None),
        Some(requested) => {
            let wanted: HashSet<&str> = requested.split_whitespace().collect();
            let granted = entitled
                .into_iter()
                .filter(|permission| wanted.contains(permission.as_str()))
                .collect();
            (granted, Some(requested.to_string()))
        }
    };

    // Re-derive the role set from the final permission set: a role that
    // contributed no surviving permission is excluded.
    let roles = role_rows
        .iter()
        .filter(|row| permissions.contains(&row.permission))
        .map(|row| format!("{}:{}", row.client_id, row.role))
        .collect();

    ResolvedAccess {
        roles,
        permissions,
        accepted_scope,
    }
}
