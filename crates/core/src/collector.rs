//! Resource collection.
//!
//! Pure reads against the management API, producing in-memory indices keyed
//! by principal ID. Only Active-Directory-scoped principals qualify; DN-form
//! principals whose DN fails validation are skipped (not fatal).

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::api::ManagementApi;
use crate::errors::ApiError;
use crate::models::User;
use crate::principal::{dn_is_migratable, PrincipalId};
use crate::resources::PrincipalResource;

/// Whether a principal qualifies for migration handling: AD-scoped, and in
/// DN form the DN must validate.
fn qualifies(principal: &PrincipalId) -> bool {
    if !principal.is_ad_scoped() {
        return false;
    }
    if principal.is_guid_form() {
        return true;
    }
    match principal.dn() {
        Some(dn) => dn_is_migratable(dn),
        None => false,
    }
}

/// Index every user under each of its qualifying AD-scoped principal IDs.
///
/// A user with several qualifying principals appears under each of them;
/// collisions between users on the same ID are last-write-wins (accepted,
/// not corrected).
pub async fn collect_identities(
    api: &dyn ManagementApi,
) -> Result<HashMap<PrincipalId, User>, ApiError> {
    let users = api.list_users().await?;

    let mut index = HashMap::new();
    for user in users {
        for principal in &user.principal_ids {
            if qualifies(principal) {
                if index.insert(principal.clone(), user.clone()).is_some() {
                    warn!(
                        principal = %principal,
                        user = %user.metadata.name,
                        "principal claimed by more than one user, keeping the last"
                    );
                }
            }
        }
    }

    debug!(count = index.len(), "collected identity records");
    Ok(index)
}

/// Group project bindings, cluster bindings and tokens by their AD-scoped
/// principal reference.
pub async fn collect_bindings(
    api: &dyn ManagementApi,
) -> Result<HashMap<PrincipalId, Vec<PrincipalResource>>, ApiError> {
    let mut resources: Vec<PrincipalResource> = Vec::new();

    resources.extend(
        api.list_project_bindings()
            .await?
            .into_iter()
            .map(PrincipalResource::Project),
    );
    resources.extend(
        api.list_cluster_bindings()
            .await?
            .into_iter()
            .map(PrincipalResource::Cluster),
    );
    resources.extend(api.list_tokens().await?.into_iter().map(PrincipalResource::Token));

    let mut index: HashMap<PrincipalId, Vec<PrincipalResource>> = HashMap::new();
    for resource in resources {
        let principal = PrincipalId::new(resource.principal_id());
        if qualifies(&principal) {
            index.entry(principal).or_default().push(resource);
        }
    }

    debug!(groups = index.len(), "collected principal-bearing resources");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;

    #[test]
    fn test_qualifies() {
        assert!(qualifies(&PrincipalId::from_dn(
            "CN=jdoe,OU=Users,DC=example,DC=com"
        )));
        let guid = Guid::parse("04030201-0605-0807-090a-0b0c0d0e0f10").unwrap();
        assert!(qualifies(&PrincipalId::from_guid(&guid)));

        // Wrong scope.
        assert!(!qualifies(&PrincipalId::new("local://u-abcde")));
        assert!(!qualifies(&PrincipalId::new(
            "openldap_user://CN=jdoe,DC=example"
        )));

        // Malformed or CN-less DN is skipped.
        assert!(!qualifies(&PrincipalId::from_dn("OU=Users,DC=example")));
        assert!(!qualifies(&PrincipalId::from_dn("garbage")));
    }
}
