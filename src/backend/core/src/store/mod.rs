//! Storage abstraction for organizations.
//!
//! The permission engine depends on this trait rather than on a concrete
//! database handle, so tests can run against [`MemoryOrganizationStore`]
//! and production against the sqlx-backed [`crate::db::Database`].
//!
//! `update_organization` must write the whole membership state in one
//! atomic step: a reader must never observe the role list and the derived
//! flat projection out of sync.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::permissions::Organization;

/// Read-then-write access to organization documents.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Look up an organization by id.
    async fn find_organization(&self, org_id: &str) -> Result<Option<Organization>>;

    /// Insert a new organization.
    async fn insert_organization(&self, org: &Organization) -> Result<()>;

    /// Replace an organization document. Atomic at the document level.
    async fn update_organization(&self, org: &Organization) -> Result<()>;

    /// Delete an organization and its scoped resources.
    async fn delete_organization(&self, org_id: &str) -> Result<()>;

    /// All organizations the user belongs to (owner, explicit, or legacy).
    async fn organizations_for_user(&self, user_id: &str) -> Result<Vec<Organization>>;
}

/// In-memory store used by unit and integration tests.
#[derive(Default)]
pub struct MemoryOrganizationStore {
    orgs: RwLock<HashMap<String, Organization>>,
}

impl MemoryOrganizationStore {
    /// Seed an organization directly, bypassing the trait.
    pub fn insert(&self, org: Organization) {
        self.orgs.write().insert(org.org_id.clone(), org);
    }
}

#[async_trait]
impl OrganizationStore for MemoryOrganizationStore {
    async fn find_organization(&self, org_id: &str) -> Result<Option<Organization>> {
        Ok(self.orgs.read().get(org_id).cloned())
    }

    async fn insert_organization(&self, org: &Organization) -> Result<()> {
        self.orgs.write().insert(org.org_id.clone(), org.clone());
        Ok(())
    }

    async fn update_organization(&self, org: &Organization) -> Result<()> {
        self.orgs.write().insert(org.org_id.clone(), org.clone());
        Ok(())
    }

    async fn delete_organization(&self, org_id: &str) -> Result<()> {
        self.orgs.write().remove(org_id);
        Ok(())
    }

    async fn organizations_for_user(&self, user_id: &str) -> Result<Vec<Organization>> {
        Ok(self
            .orgs
            .read()
            .values()
            .filter(|org| org.has_member(user_id))
            .cloned()
            .collect())
    }
}
