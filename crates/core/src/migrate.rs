//! Index build and the rename/update engine.
//!
//! The migration is a linear sequence: collect identity and binding records,
//! merge them into the principal-keyed index, resolve the counterpart form
//! of every principal up front (DN -> GUID and GUID -> DN), then walk the
//! ordered candidate set and apply the rename one resource group at a time.
//!
//! Mutations are not transactional. A persistence failure aborts the run and
//! leaves already-processed groups migrated; rollback is a distinct,
//! symmetric run, not an undo log.

use tracing::{debug, info, instrument};

use crate::api::ManagementApi;
use crate::collector::{collect_bindings, collect_identities};
use crate::errors::{ApiError, CoreError, LookupError, MigrationError};
use crate::guid::Guid;
use crate::ldap::DirectoryLookup;
use crate::principal::PrincipalId;
use crate::report::{self, ReportSink};
use crate::resources::{MigratableResource, MigratableResources, PrincipalResource, ResourceKind};

// ---------------------------------------------------------------------------
// Index build
// ---------------------------------------------------------------------------

/// Merge the identity and binding indices and resolve the counterpart form
/// of every principal.
///
/// The union of keys is taken: a group may carry a user with no resources,
/// or resources with no user (the orphan case). Any directory failure
/// aborts the whole build.
#[instrument(skip_all)]
pub async fn build_index(
    api: &dyn ManagementApi,
    dir: &mut dyn DirectoryLookup,
) -> Result<MigratableResources, CoreError> {
    let identities = collect_identities(api).await?;
    let bindings = collect_bindings(api).await?;

    let mut index = MigratableResources::new();
    for (principal, user) in identities {
        index.entry(principal).user = Some(user);
    }
    for (principal, resources) in bindings {
        index.entry(principal).resources = resources;
    }

    // Resolve both forms for every group, in deterministic key order.
    let keys: Vec<PrincipalId> = index.iter().map(|r| r.principal_id.clone()).collect();
    for key in keys {
        let (dn, guid) = resolve_counterpart(dir, &key).await.map_err(MigrationError::BuildFailed)?;
        let entry = index.entry(key);
        entry.dn = dn;
        entry.guid = Some(guid);
    }

    debug!(groups = index.len(), "built migratable-resource index");
    Ok(index)
}

/// Resolve the missing form for one principal: DN-form IDs get their GUID
/// looked up, GUID-form IDs get their DN looked up.
async fn resolve_counterpart(
    dir: &mut dyn DirectoryLookup,
    principal: &PrincipalId,
) -> Result<(String, Guid), LookupError> {
    if principal.is_guid_form() {
        let text = principal
            .guid_text()
            .ok_or_else(|| LookupError::InvalidGuid(principal.to_string()))?;
        let guid = Guid::parse(text)?;
        let dn = dir.resolve_dn(&guid).await?;
        Ok((dn, guid))
    } else {
        let dn = principal
            .dn()
            .ok_or_else(|| LookupError::NotFound {
                subject: principal.to_string(),
            })?
            .to_string();
        let guid = dir.resolve_guid(&dn).await?;
        Ok((dn, guid))
    }
}

/// The new principal ID for a group: the GUID form when the current ID is
/// DN-form, the DN form otherwise. Self-inverse under resolution.
pub fn new_principal_id(resource: &MigratableResource) -> Result<PrincipalId, MigrationError> {
    if resource.principal_id.is_guid_form() {
        if resource.dn.is_empty() {
            return Err(MigrationError::Unresolved(resource.principal_id.to_string()));
        }
        Ok(PrincipalId::from_dn(&resource.dn))
    } else {
        let guid = resource
            .guid
            .as_ref()
            .ok_or_else(|| MigrationError::Unresolved(resource.principal_id.to_string()))?;
        Ok(PrincipalId::from_guid(guid))
    }
}

// ---------------------------------------------------------------------------
// Migrator
// ---------------------------------------------------------------------------

/// Drives check, migrate and rollback over a built index.
pub struct Migrator<'a> {
    api: &'a dyn ManagementApi,
    report: &'a mut dyn ReportSink,
}

impl<'a> Migrator<'a> {
    pub fn new(api: &'a dyn ManagementApi, report: &'a mut dyn ReportSink) -> Self {
        Self { api, report }
    }

    /// Dry-run report: both candidate sets with their resolved identifiers
    /// and per-kind resource counts. Performs no mutation.
    pub async fn check(&mut self, dir: &mut dyn DirectoryLookup) -> Result<(), CoreError> {
        let index = build_index(self.api, dir).await?;

        let candidates = index.with_dn_form();
        self.report
            .line(&format!("Found {} users to migrate:", candidates.len()));
        for resource in &candidates {
            self.describe(resource, &resource.dn, &guid_text(resource));
        }

        let migrated = index.with_guid_form();
        self.report.line(&format!(
            "Found {} migrated users (rollback candidates):",
            migrated.len()
        ));
        for resource in &migrated {
            self.describe(resource, &guid_text(resource), &resource.dn);
        }

        Ok(())
    }

    /// Forward migration: DN-form groups, in DN order, optionally restricted
    /// to the given user names or principal IDs.
    pub async fn migrate(
        &mut self,
        dir: &mut dyn DirectoryLookup,
        selection: &[String],
    ) -> Result<(), CoreError> {
        self.report.line("Start migration");
        let index = build_index(self.api, dir).await?;
        let order: Vec<PrincipalId> = index
            .with_dn_form()
            .iter()
            .map(|r| r.principal_id.clone())
            .collect();
        self.run(index, order, selection).await
    }

    /// Rollback: GUID-form groups, in GUID order, with the same selection
    /// semantics as [`Migrator::migrate`].
    pub async fn rollback(
        &mut self,
        dir: &mut dyn DirectoryLookup,
        selection: &[String],
    ) -> Result<(), CoreError> {
        self.report.line("Start rollback");
        let index = build_index(self.api, dir).await?;
        let order: Vec<PrincipalId> = index
            .with_guid_form()
            .iter()
            .map(|r| r.principal_id.clone())
            .collect();
        self.run(index, order, selection).await
    }

    async fn run(
        &mut self,
        mut index: MigratableResources,
        order: Vec<PrincipalId>,
        selection: &[String],
    ) -> Result<(), CoreError> {
        for key in order {
            let Some(resource) = index.take(&key) else {
                continue;
            };
            if !selected(&resource, selection) {
                continue;
            }

            let new_id = new_principal_id(&resource)?;
            self.apply_rename(resource, new_id).await?;
        }
        Ok(())
    }

    /// Apply one rename: user principal set in place, bindings recreated
    /// (create before delete), tokens updated in place.
    #[instrument(skip_all, fields(principal = %resource.principal_id))]
    async fn apply_rename(
        &mut self,
        mut resource: MigratableResource,
        new_id: PrincipalId,
    ) -> Result<(), CoreError> {
        let principal = resource.principal_id.clone();
        let fail = |source: ApiError| MigrationError::RenameFailed {
            principal: principal.to_string(),
            source,
        };

        match resource.user_name() {
            Some(name) => {
                let display = resource
                    .user
                    .as_ref()
                    .map(|u| u.display_name.clone())
                    .unwrap_or_default();
                self.report
                    .line(&format!("Renaming user {display:?} ({name:?})"));
            }
            None => self.report.line(&format!(
                "Renaming orphaned resources of principal {}",
                resource.principal_id
            )),
        }
        self.report.line(&format!(
            "\t{}\n\t{}",
            report::old(principal.as_str()),
            report::new(new_id.as_str())
        ));

        // 1. The user record, in place. Persisted even when the exact match
        //    is gone (already consistent).
        resource.update_user_principal(&new_id);
        if let Some(ref user) = resource.user {
            self.api.update_user(user).await.map_err(fail)?;
            info!(user = %user.metadata.name, "updated user principal set");
        }

        // 2 + 3. Bindings and tokens.
        let mut resources = std::mem::take(&mut resource.resources);
        for record in resources.iter_mut() {
            record.set_principal_id(&new_id);
            match record {
                PrincipalResource::Project(binding) => {
                    let old_name = binding.metadata.name.clone();
                    let namespace = binding.metadata.namespace.clone().unwrap_or_default();
                    binding.metadata.name = String::new();
                    binding.metadata.resource_version = String::new();

                    self.report.line(&format!(
                        "\tCreating new ProjectRoleTemplateBinding in namespace {}",
                        report::namespace(&namespace)
                    ));
                    let created = self
                        .api
                        .create_project_binding(&namespace, binding)
                        .await
                        .map_err(fail)?;
                    self.report.line(&format!(
                        "\tNew ProjectRoleTemplateBinding created ({}), deleting old one ({})",
                        report::new(&created.metadata.name),
                        report::old(&old_name)
                    ));

                    self.api
                        .delete_project_binding(&namespace, &old_name)
                        .await
                        .map_err(fail)?;
                    self.report.line(&format!(
                        "\tOld ProjectRoleTemplateBinding deleted ({})",
                        report::old(&old_name)
                    ));
                }
                PrincipalResource::Cluster(binding) => {
                    let old_name = binding.metadata.name.clone();
                    let namespace = binding.metadata.namespace.clone().unwrap_or_default();
                    binding.metadata.name = String::new();
                    binding.metadata.resource_version = String::new();

                    self.report.line(&format!(
                        "\tCreating new ClusterRoleTemplateBinding in namespace {}",
                        report::namespace(&namespace)
                    ));
                    let created = self
                        .api
                        .create_cluster_binding(&namespace, binding)
                        .await
                        .map_err(fail)?;
                    self.report.line(&format!(
                        "\tNew ClusterRoleTemplateBinding created ({}), deleting old one ({})",
                        report::new(&created.metadata.name),
                        report::old(&old_name)
                    ));

                    self.api
                        .delete_cluster_binding(&namespace, &old_name)
                        .await
                        .map_err(fail)?;
                    self.report.line(&format!(
                        "\tOld ClusterRoleTemplateBinding deleted ({})",
                        report::old(&old_name)
                    ));
                }
                PrincipalResource::Token(token) => {
                    self.api.update_token(token).await.map_err(fail)?;
                    self.report.line(&format!(
                        "\tToken updated ({})",
                        report::new(&token.metadata.name)
                    ));
                }
            }
        }

        Ok(())
    }

    fn describe(&mut self, resource: &MigratableResource, from: &str, to: &str) {
        let (name, display) = match resource.user {
            Some(ref user) => (user.metadata.name.as_str(), user.display_name.as_str()),
            None => ("-", "(orphaned)"),
        };
        self.report.line(&format!(
            "- {name:<15?} {display:<20?} - {from:<55} -> {to}"
        ));
        self.report.line(&format!(
            "\tResources: {} PRTB, {} CRTB, {} Token",
            resource.count_of(ResourceKind::ProjectBinding),
            resource.count_of(ResourceKind::ClusterBinding),
            resource.count_of(ResourceKind::Token),
        ));
    }
}

fn guid_text(resource: &MigratableResource) -> String {
    resource.guid.map(|g| g.to_string()).unwrap_or_default()
}

/// Whether a group is selected by the explicit subset filter. An empty
/// filter selects everything; otherwise an entry matches on its user record
/// name or on the full principal ID string.
fn selected(resource: &MigratableResource, selection: &[String]) -> bool {
    if selection.is_empty() {
        return true;
    }
    if let Some(name) = resource.user_name() {
        if selection.iter().any(|s| s == name) {
            return true;
        }
    }
    selection.iter().any(|s| s == resource.principal_id.as_str())
}

/// Candidate user names for shell completion: un-migrated (DN-form) names,
/// or already-migrated (GUID-form) names when `migrated` is set.
pub async fn candidate_names(
    api: &dyn ManagementApi,
    migrated: bool,
) -> Result<Vec<String>, ApiError> {
    let identities = collect_identities(api).await?;

    let mut names: Vec<String> = identities
        .iter()
        .filter(|(principal, _)| principal.is_guid_form() == migrated)
        .map(|(_, user)| user.metadata.name.clone())
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_principal_id_both_directions() {
        let guid = Guid::parse("04030201-0605-0807-090a-0b0c0d0e0f10").unwrap();

        let mut dn_form = MigratableResource::new(PrincipalId::from_dn("CN=jdoe,DC=example"));
        dn_form.dn = "CN=jdoe,DC=example".into();
        dn_form.guid = Some(guid);
        assert_eq!(
            new_principal_id(&dn_form).unwrap(),
            PrincipalId::from_guid(&guid)
        );

        let mut guid_form = MigratableResource::new(PrincipalId::from_guid(&guid));
        guid_form.dn = "CN=jdoe,DC=example".into();
        guid_form.guid = Some(guid);
        assert_eq!(
            new_principal_id(&guid_form).unwrap(),
            PrincipalId::from_dn("CN=jdoe,DC=example")
        );
    }

    #[test]
    fn test_new_principal_id_round_trip() {
        let guid = Guid::parse("04030201-0605-0807-090a-0b0c0d0e0f10").unwrap();
        let original = PrincipalId::from_dn("CN=jdoe,DC=example");

        let mut forward = MigratableResource::new(original.clone());
        forward.dn = "CN=jdoe,DC=example".into();
        forward.guid = Some(guid);
        let migrated_id = new_principal_id(&forward).unwrap();

        // The rollback of the migrated group restores the original exactly.
        let mut backward = MigratableResource::new(migrated_id);
        backward.dn = "CN=jdoe,DC=example".into();
        backward.guid = Some(guid);
        assert_eq!(new_principal_id(&backward).unwrap(), original);
    }

    #[test]
    fn test_new_principal_id_requires_resolution() {
        let unresolved = MigratableResource::new(PrincipalId::from_dn("CN=jdoe,DC=example"));
        assert!(matches!(
            new_principal_id(&unresolved),
            Err(MigrationError::Unresolved(_))
        ));
    }

    #[test]
    fn test_selection_filter() {
        let mut resource = MigratableResource::new(PrincipalId::from_dn("CN=jdoe,DC=example"));
        assert!(selected(&resource, &[]));
        assert!(!selected(&resource, &["u-other".into()]));
        // Orphans are addressable by principal ID.
        assert!(selected(
            &resource,
            &["activedirectory_user://CN=jdoe,DC=example".into()]
        ));

        resource.user = Some(crate::models::User {
            metadata: crate::models::Metadata {
                name: "u-abcde".into(),
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(selected(&resource, &["u-abcde".into()]));
        assert!(!selected(&resource, &["u-other".into()]));
    }
}
