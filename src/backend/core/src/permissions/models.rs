//! Organization data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;
use crate::error::{CourierError, Result};

/// Whether an organization is a user's implicit personal workspace or an
/// explicitly created team workspace. Personal workspaces cannot be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgType {
    Personal,
    Team,
}

/// A membership record: one user, one role, within one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub user_id: String,
    pub role: Role,
    pub added_at: DateTime<Utc>,
}

/// An organization (workspace) owning collections, requests, environments,
/// and history.
///
/// `member_roles` is the single source of truth for membership. The owner
/// never appears in it — ownership implies admin. `legacy_members` holds
/// user ids inherited from the pre-role flat membership list that never
/// received an explicit role entry; role resolution defaults them to
/// [`Role::Edit`]. The flat `members` set consumers used to read is now a
/// derived projection, see [`Organization::member_ids`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub org_id: String,
    pub name: String,
    pub org_type: OrgType,
    pub owner_id: String,
    pub member_roles: Vec<MemberEntry>,
    #[serde(default)]
    pub legacy_members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization with a generated id and no members
    /// besides the implicit owner.
    pub fn new(name: impl Into<String>, org_type: OrgType, owner_id: impl Into<String>) -> Self {
        Self {
            org_id: generate_org_id(),
            name: name.into(),
            org_type,
            owner_id: owner_id.into(),
            member_roles: Vec::new(),
            legacy_members: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_personal(&self) -> bool {
        self.org_type == OrgType::Personal
    }

    /// Find the membership entry for a user, if any.
    pub fn member_entry(&self, user_id: &str) -> Option<&MemberEntry> {
        self.member_roles.iter().find(|m| m.user_id == user_id)
    }

    /// Derived flat member-id projection: owner, then explicit members in
    /// insertion order, then legacy ids without a role entry.
    pub fn member_ids(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(1 + self.member_roles.len() + self.legacy_members.len());
        ids.push(self.owner_id.clone());
        for entry in &self.member_roles {
            if !ids.contains(&entry.user_id) {
                ids.push(entry.user_id.clone());
            }
        }
        for legacy in &self.legacy_members {
            if !ids.contains(legacy) {
                ids.push(legacy.clone());
            }
        }
        ids
    }

    /// Deletion guard: only the owner may delete, and personal workspaces
    /// are permanent.
    pub fn check_deletable_by(&self, user_id: &str) -> Result<()> {
        if self.owner_id != user_id {
            return Err(CourierError::forbidden(
                "Only the organization owner can delete it",
            ));
        }
        if self.is_personal() {
            return Err(CourierError::invalid_argument(
                "Cannot delete personal organization",
            ));
        }
        Ok(())
    }

    /// The user's role in this organization, if they belong to it.
    ///
    /// Ownership wins over any stored entry; legacy flat-list members
    /// without a role entry resolve to [`Role::Edit`].
    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        if self.owner_id == user_id {
            return Some(Role::Admin);
        }
        if let Some(entry) = self.member_entry(user_id) {
            return Some(entry.role);
        }
        if self.legacy_members.iter().any(|m| m == user_id) {
            return Some(Role::Edit);
        }
        None
    }

    /// Whether the user appears anywhere in the membership projection.
    pub fn has_member(&self, user_id: &str) -> bool {
        self.owner_id == user_id
            || self.member_entry(user_id).is_some()
            || self.legacy_members.iter().any(|m| m == user_id)
    }
}

fn generate_org_id() -> String {
    format!("org_{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_org_has_no_explicit_members() {
        let org = Organization::new("Team", OrgType::Team, "user_1");
        assert!(org.member_roles.is_empty());
        assert_eq!(org.member_ids(), vec!["user_1".to_string()]);
        assert!(org.has_member("user_1"));
        assert!(!org.has_member("user_2"));
    }

    #[test]
    fn test_member_ids_projection_order_and_dedup() {
        let mut org = Organization::new("Team", OrgType::Team, "user_owner");
        org.member_roles.push(MemberEntry {
            user_id: "user_a".into(),
            role: Role::Edit,
            added_at: Utc::now(),
        });
        org.legacy_members.push("user_b".into());
        // Stale legacy id that also has a role entry must not duplicate.
        org.legacy_members.push("user_a".into());

        assert_eq!(
            org.member_ids(),
            vec![
                "user_owner".to_string(),
                "user_a".to_string(),
                "user_b".to_string()
            ]
        );
    }

    #[test]
    fn test_org_id_format() {
        let org = Organization::new("x", OrgType::Team, "u");
        assert!(org.org_id.starts_with("org_"));
        assert_eq!(org.org_id.len(), 16);
    }
}
