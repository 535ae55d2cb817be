//! Persona identity key.
use serde::{Deserialize, Serialize};

/// Identifies an end-user subject within exactly one tenant.
///
/// The `(tenant, subject, user_context)` triple is unique; `user_context` is
/// an optional disambiguator defaulting to the empty string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct PersonaKey {
    pub tenant: String,
    pub subject: String,
    pub user_context: String,
}

impl PersonaKey {
    pub fn new(tenant: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            subject: subject.into(),
            user_context: String::new(),
        }
    }

    pub fn with_context(mut self, user_context: impl Into<String>) -> Self {
        self.user_context = user_context.into();
        self
    }
}
