//! Wire records for the management API.
//!
//! These mirror the Kubernetes-style JSON the backing store serves: a
//! `metadata` object carrying name/namespace/resourceVersion, camelCase
//! spec fields at the top level, and `{ "items": [...] }` list envelopes.
//! Unknown fields are preserved through an `extra` flatten map so that
//! delete-then-recreate keeps fields this tool does not model (labels, role
//! template references, annotations, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::principal::PrincipalId;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Kubernetes-style object metadata (only the fields this tool touches).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,

    /// Everything else (labels, annotations, uid, ...), carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Identity records
// ---------------------------------------------------------------------------

/// A user account. May hold several principal IDs; at most one carries the
/// Active Directory scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub principal_ids: Vec<PrincipalId>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Binding records
// ---------------------------------------------------------------------------

/// A project-scoped role binding. The principal reference is immutable after
/// creation, forcing delete-then-recreate on rename.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRoleTemplateBinding {
    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub user_principal_name: String,

    #[serde(default)]
    pub role_template_name: String,

    #[serde(default)]
    pub project_name: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A cluster-scoped role binding. Same immutability constraint as
/// [`ProjectRoleTemplateBinding`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleTemplateBinding {
    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub user_principal_name: String,

    #[serde(default)]
    pub role_template_name: String,

    #[serde(default)]
    pub cluster_name: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Token records
// ---------------------------------------------------------------------------

/// A session credential. Its principal reference is mutable in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub user_principal_id: String,

    #[serde(default)]
    pub auth_provider: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Auth config
// ---------------------------------------------------------------------------

/// The `activedirectory` auth-config record, read once to obtain the
/// directory connection parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDirectoryConfig {
    #[serde(default)]
    pub servers: Vec<String>,

    #[serde(default = "default_ldap_port")]
    pub port: u16,

    #[serde(default)]
    pub tls: bool,

    #[serde(default)]
    pub start_tls: bool,

    /// PEM bundle appended to the system trust roots.
    #[serde(default)]
    pub certificate: String,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    #[serde(default)]
    pub service_account_username: String,

    /// Either the literal password or a `namespace:name` secret reference.
    #[serde(default)]
    pub service_account_password: String,

    #[serde(default)]
    pub default_login_domain: String,

    #[serde(default)]
    pub user_search_base: String,

    #[serde(default = "default_user_object_class")]
    pub user_object_class: String,

    #[serde(default = "default_user_login_attribute")]
    pub user_login_attribute: String,

    #[serde(default = "default_user_name_attribute")]
    pub user_name_attribute: String,

    #[serde(default = "default_user_enabled_attribute")]
    pub user_enabled_attribute: String,
}

fn default_ldap_port() -> u16 {
    389
}
fn default_connection_timeout() -> u64 {
    5000
}
fn default_user_object_class() -> String {
    "person".into()
}
fn default_user_login_attribute() -> String {
    "sAMAccountName".into()
}
fn default_user_name_attribute() -> String {
    "name".into()
}
fn default_user_enabled_attribute() -> String {
    "userAccountControl".into()
}

impl ActiveDirectoryConfig {
    /// Attributes requested on every user search: the configured user
    /// attributes plus the extras the caller needs.
    pub fn user_search_attributes(&self, extras: &[&str]) -> Vec<String> {
        let mut attrs = vec![
            self.user_login_attribute.clone(),
            self.user_name_attribute.clone(),
            self.user_enabled_attribute.clone(),
        ];
        attrs.extend(extras.iter().map(|a| a.to_string()));
        attrs
    }
}

// ---------------------------------------------------------------------------
// List envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}
