//! Broker data model module.
//!
//! # Purpose
//! Re-exports the tenant/client/persona/access/session/key models shared by
//! the store traits and the authorization core.
mod access;
mod client;
mod keys;
mod persona;
mod session;
mod tenant;

pub use access::{Group, Permission, Role};
pub use client::Client;
pub use keys::{PublicKeyRecord, SigningKeyRecord};
pub use persona::PersonaKey;
pub use session::Session;
pub use tenant::Tenant;
