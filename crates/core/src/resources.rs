//! Migratable resources and the merged index.
//!
//! A [`MigratableResource`] groups everything sharing one principal ID: at
//! most one user record plus any number of role bindings and tokens. The
//! index ([`MigratableResources`]) owns the merged groups outright and hands
//! out deterministically ordered views: DN-form entries (forward-migration
//! candidates, sorted by resolved DN) and GUID-form entries (rollback
//! candidates, sorted by GUID text).

use std::collections::BTreeMap;

use crate::guid::Guid;
use crate::models::{ClusterRoleTemplateBinding, ProjectRoleTemplateBinding, Token, User};
use crate::principal::PrincipalId;

// ---------------------------------------------------------------------------
// Principal-bearing resources
// ---------------------------------------------------------------------------

/// Kind discriminator for [`PrincipalResource`], used by reporting and by
/// per-kind filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ProjectBinding,
    ClusterBinding,
    Token,
}

impl ResourceKind {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::ProjectBinding => "ProjectRoleTemplateBinding",
            Self::ClusterBinding => "ClusterRoleTemplateBinding",
            Self::Token => "Token",
        }
    }
}

/// A record holding a single principal reference.
///
/// Bindings are immutable in their principal field after creation and must
/// be recreated on rename; tokens are updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalResource {
    Project(ProjectRoleTemplateBinding),
    Cluster(ClusterRoleTemplateBinding),
    Token(Token),
}

impl PrincipalResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Project(_) => ResourceKind::ProjectBinding,
            Self::Cluster(_) => ResourceKind::ClusterBinding,
            Self::Token(_) => ResourceKind::Token,
        }
    }

    /// The principal reference carried by this record.
    pub fn principal_id(&self) -> &str {
        match self {
            Self::Project(b) => &b.user_principal_name,
            Self::Cluster(b) => &b.user_principal_name,
            Self::Token(t) => &t.user_principal_id,
        }
    }

    pub fn set_principal_id(&mut self, id: &PrincipalId) {
        match self {
            Self::Project(b) => b.user_principal_name = id.as_str().to_string(),
            Self::Cluster(b) => b.user_principal_name = id.as_str().to_string(),
            Self::Token(t) => t.user_principal_id = id.as_str().to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Project(b) => &b.metadata.name,
            Self::Cluster(b) => &b.metadata.name,
            Self::Token(t) => &t.metadata.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Migratable resource
// ---------------------------------------------------------------------------

/// The unit of migration: one principal ID and every record referencing it.
///
/// `dn` and `guid` are both populated by the index build regardless of which
/// form the principal ID started as, keeping the rename path uniform. A
/// group with resources but no user is orphaned but still migratable.
#[derive(Debug, Clone)]
pub struct MigratableResource {
    pub principal_id: PrincipalId,
    pub user: Option<User>,
    pub resources: Vec<PrincipalResource>,
    pub dn: String,
    pub guid: Option<Guid>,
}

impl MigratableResource {
    pub fn new(principal_id: PrincipalId) -> Self {
        Self {
            principal_id,
            user: None,
            resources: Vec::new(),
            dn: String::new(),
            guid: None,
        }
    }

    /// All grouped resources of one kind, in collection order.
    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &PrincipalResource> {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.resources_of(kind).count()
    }

    /// Replace the exact matching entry in the user's principal ID set.
    /// Returns `false` (a no-op, treated as already consistent) when no
    /// entry matches.
    pub fn update_user_principal(&mut self, new_id: &PrincipalId) -> bool {
        let Some(user) = self.user.as_mut() else {
            return false;
        };
        for principal in user.principal_ids.iter_mut() {
            if *principal == self.principal_id {
                *principal = new_id.clone();
                return true;
            }
        }
        false
    }

    /// The user record name, when the group is not orphaned.
    pub fn user_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.metadata.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// The merged index, keyed by principal ID.
#[derive(Debug, Clone, Default)]
pub struct MigratableResources {
    entries: BTreeMap<PrincipalId, MigratableResource>,
}

impl MigratableResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &PrincipalId) -> Option<&MigratableResource> {
        self.entries.get(id)
    }

    /// Insert or fetch the group for `id`.
    pub fn entry(&mut self, id: PrincipalId) -> &mut MigratableResource {
        self.entries
            .entry(id.clone())
            .or_insert_with(|| MigratableResource::new(id))
    }

    /// Remove a group, handing ownership to the caller.
    pub fn take(&mut self, id: &PrincipalId) -> Option<MigratableResource> {
        self.entries.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MigratableResource> {
        self.entries.values()
    }

    /// DN-form entries, sorted ascending by resolved DN. The forward
    /// migration candidate set.
    pub fn with_dn_form(&self) -> Vec<&MigratableResource> {
        let mut dns: Vec<&MigratableResource> = self
            .entries
            .values()
            .filter(|r| !r.principal_id.is_guid_form())
            .collect();
        dns.sort_by(|a, b| a.dn.cmp(&b.dn));
        dns
    }

    /// GUID-form entries, sorted ascending by GUID text. The rollback
    /// candidate set.
    pub fn with_guid_form(&self) -> Vec<&MigratableResource> {
        let mut guids: Vec<&MigratableResource> = self
            .entries
            .values()
            .filter(|r| r.principal_id.is_guid_form())
            .collect();
        guids.sort_by_key(|r| r.guid.map(|g| g.to_string()).unwrap_or_default());
        guids
    }
}

impl FromIterator<MigratableResource> for MigratableResources {
    fn from_iter<I: IntoIterator<Item = MigratableResource>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|r| (r.principal_id.clone(), r))
                .collect(),
        }
    }
}
