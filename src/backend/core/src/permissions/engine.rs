//! The permission engine: role resolution and membership mutation.
//!
//! Membership mutations are read-modify-write over the whole organization
//! document; the store writes the document atomically, so the role list and
//! the derived flat projection can never be observed out of sync. Concurrent
//! edits to the same organization are last-write-wins — the engine does not
//! serialize them.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{CourierError, Result};
use crate::store::OrganizationStore;

use super::models::MemberEntry;
use super::role::Role;

/// Resolves effective roles and enforces minimum-role requirements.
///
/// Roles are never cached: every check re-reads the organization so it
/// reflects the latest membership state. The store is injected, never a
/// process-wide handle.
#[derive(Clone)]
pub struct PermissionEngine {
    store: Arc<dyn OrganizationStore>,
}

impl PermissionEngine {
    pub fn new(store: Arc<dyn OrganizationStore>) -> Self {
        Self { store }
    }

    /// Resolve a user's effective role within an organization.
    ///
    /// The owner is admin unconditionally — this check precedes the stored
    /// membership list, so a stale entry for the owner is ignored. Users on
    /// the legacy flat list without a role entry default to `edit`; that is
    /// a data-migration gap, not a policy choice.
    pub async fn resolve_role(&self, user_id: &str, org_id: &str) -> Result<Role> {
        let org = self
            .store
            .find_organization(org_id)
            .await?
            .ok_or_else(|| CourierError::not_found("Organization", org_id))?;

        org.role_of(user_id)
            .ok_or_else(|| CourierError::forbidden("User not in organization"))
    }

    /// Resolve the user's role and fail with `Forbidden` unless it is at
    /// least `minimum`. Returns the resolved role so callers don't need a
    /// second lookup.
    pub async fn require_role(&self, user_id: &str, org_id: &str, minimum: Role) -> Result<Role> {
        let role = self.resolve_role(user_id, org_id).await?;

        if role.level() < minimum.level() {
            debug!(
                user_id,
                org_id,
                required = %minimum,
                resolved = %role,
                "Insufficient role"
            );
            return Err(CourierError::forbidden(format!(
                "Insufficient permissions. Required: {}, you have: {}",
                minimum, role
            )));
        }

        Ok(role)
    }

    /// Add a member with the given role.
    ///
    /// Fails with `Conflict` if the user is the owner or already has a role
    /// entry. The new entry and the derived flat projection land in one
    /// document write.
    pub async fn add_member(&self, org_id: &str, user_id: &str, role: Role) -> Result<()> {
        let mut org = self
            .store
            .find_organization(org_id)
            .await?
            .ok_or_else(|| CourierError::not_found("Organization", org_id))?;

        if org.owner_id == user_id || org.member_entry(user_id).is_some() {
            return Err(CourierError::conflict("User already in organization"));
        }

        org.member_roles.push(MemberEntry {
            user_id: user_id.to_string(),
            role,
            added_at: Utc::now(),
        });
        // An explicit entry supersedes any legacy listing.
        org.legacy_members.retain(|m| m != user_id);

        self.store.update_organization(&org).await?;
        debug!(org_id, user_id, role = %role, "Member added");
        Ok(())
    }

    /// Remove a member. The owner cannot be removed.
    pub async fn remove_member(&self, org_id: &str, user_id: &str) -> Result<()> {
        let mut org = self
            .store
            .find_organization(org_id)
            .await?
            .ok_or_else(|| CourierError::not_found("Organization", org_id))?;

        if org.owner_id == user_id {
            return Err(CourierError::invalid_argument(
                "Cannot remove organization owner",
            ));
        }

        org.member_roles.retain(|m| m.user_id != user_id);
        org.legacy_members.retain(|m| m != user_id);

        self.store.update_organization(&org).await?;
        debug!(org_id, user_id, "Member removed");
        Ok(())
    }

    /// Change a member's role in place, preserving its position in the
    /// membership sequence. The owner's role cannot be changed.
    pub async fn update_member_role(&self, org_id: &str, user_id: &str, role: Role) -> Result<()> {
        let mut org = self
            .store
            .find_organization(org_id)
            .await?
            .ok_or_else(|| CourierError::not_found("Organization", org_id))?;

        if org.owner_id == user_id {
            return Err(CourierError::invalid_argument(
                "Cannot change organization owner's role",
            ));
        }

        let entry = org
            .member_roles
            .iter_mut()
            .find(|m| m.user_id == user_id)
            .ok_or_else(|| CourierError::not_found("Member", user_id))?;
        entry.role = role;

        self.store.update_organization(&org).await?;
        debug!(org_id, user_id, role = %role, "Member role updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::permissions::{Organization, OrgType};
    use crate::store::MemoryOrganizationStore;

    fn engine_with(orgs: Vec<Organization>) -> PermissionEngine {
        let store = MemoryOrganizationStore::default();
        for org in orgs {
            store.insert(org);
        }
        PermissionEngine::new(Arc::new(store))
    }

    fn team_org(owner: &str) -> Organization {
        Organization::new("Team", OrgType::Team, owner)
    }

    #[tokio::test]
    async fn test_owner_is_always_admin() {
        let org = team_org("user_owner");
        let org_id = org.org_id.clone();
        let engine = engine_with(vec![org]);

        let role = engine.resolve_role("user_owner", &org_id).await.unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[tokio::test]
    async fn test_missing_org_is_not_found() {
        let engine = engine_with(vec![]);
        let err = engine.resolve_role("user_x", "org_missing").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_non_member_is_forbidden() {
        let org = team_org("user_owner");
        let org_id = org.org_id.clone();
        let engine = engine_with(vec![org]);

        let err = engine.resolve_role("user_stranger", &org_id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_require_role_gate() {
        let mut org = team_org("user_owner");
        org.member_roles.push(MemberEntry {
            user_id: "user_viewer".into(),
            role: Role::View,
            added_at: Utc::now(),
        });
        let org_id = org.org_id.clone();
        let engine = engine_with(vec![org]);

        assert!(engine
            .require_role("user_viewer", &org_id, Role::View)
            .await
            .is_ok());
        let err = engine
            .require_role("user_viewer", &org_id, Role::Edit)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_add_member_twice_conflicts() {
        let org = team_org("user_owner");
        let org_id = org.org_id.clone();
        let engine = engine_with(vec![org]);

        engine
            .add_member(&org_id, "user_new", Role::Edit)
            .await
            .unwrap();
        let err = engine
            .add_member(&org_id, "user_new", Role::View)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_remove_owner_is_invalid() {
        let org = team_org("user_owner");
        let org_id = org.org_id.clone();
        let engine = engine_with(vec![org]);

        let err = engine
            .remove_member(&org_id, "user_owner")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
}
