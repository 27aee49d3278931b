//! admigrate core library.
//!
//! This crate implements the one-time migration of Active Directory
//! principal identifiers from their Distinguished Name form to the stable
//! objectGUID form (and back): configuration, the management API client,
//! directory lookups, resource collection and indexing, and the
//! rename/update engine.

pub mod api;
pub mod collector;
pub mod config;
pub mod errors;
pub mod guid;
pub mod ldap;
pub mod migrate;
pub mod models;
pub mod principal;
pub mod report;
pub mod resources;

// Re-exports for convenience.
pub use api::{ManagementApi, RestApi};
pub use config::AppConfig;
pub use errors::CoreError;
pub use guid::Guid;
pub use ldap::{DirectoryLookup, LdapDirectory, LdapSettings};
pub use migrate::Migrator;
pub use principal::PrincipalId;
pub use resources::{MigratableResource, MigratableResources};
