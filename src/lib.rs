//! Warden authorization broker library crate.
//!
//! # Purpose
//! Sits between external identity providers and registered client
//! applications: resolves the roles and permissions a persona is entitled to
//! for a tenant/client scope, binds a refresh handle to the lifetime of the
//! upstream identity assertion, and mints narrowed, locally-signed access
//! tokens.
//!
//! # Notes
//! The HTTP surface, admin CRUD endpoints, and durable storage backends are
//! external collaborators; their contracts live in [`store`] as traits.
pub mod auth;
pub mod broker;
pub mod config;
pub mod model;
pub mod observability;
pub mod store;
