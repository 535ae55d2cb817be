//! Role, permission, and group model definitions.
//!
//! # Notes
//! Permission names are unique only within their owning client's namespace,
//! never globally. Resolution output uses the qualified `client_id:name` form
//! for roles to stay unambiguous under a wildcard client scope.
use serde::{Deserialize, Serialize};

/// A named role owned by exactly one client; unique per (client, name).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Role {
    pub client_id: String,
    pub name: String,
}

impl Role {
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
        }
    }

    /// Qualified display form carried in the token's `roles` claim.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.client_id, self.name)
    }
}

/// A named permission owned by exactly one client; unique per (client, name).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    pub client_id: String,
    pub name: String,
}

impl Permission {
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
        }
    }
}

/// A named collection of roles. Declared as an entitlement source but not yet
/// consulted by resolution.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Group {
    pub name: String,
    pub roles: Vec<Role>,
}
