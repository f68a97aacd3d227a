//! Integration tests for the permission engine.

use std::sync::Arc;

use chrono::Utc;
use courier_core::error::ErrorCode;
use courier_core::permissions::{MemberEntry, Organization, OrgType, PermissionEngine, Role};
use courier_core::store::{MemoryOrganizationStore, OrganizationStore};

fn engine_over(store: &Arc<MemoryOrganizationStore>) -> PermissionEngine {
    PermissionEngine::new(store.clone())
}

fn entry(user_id: &str, role: Role) -> MemberEntry {
    MemberEntry {
        user_id: user_id.to_string(),
        role,
        added_at: Utc::now(),
    }
}

fn seeded_org(store: &MemoryOrganizationStore, entries: Vec<MemberEntry>) -> String {
    let mut org = Organization::new("Acme", OrgType::Team, "user_owner");
    org.member_roles = entries;
    let org_id = org.org_id.clone();
    store.insert(org);
    org_id
}

#[tokio::test]
async fn owner_is_admin_even_with_stale_demoting_entry() {
    let store = Arc::new(MemoryOrganizationStore::default());
    // A stale entry claiming the owner is only a viewer must be ignored.
    let org_id = seeded_org(&store, vec![entry("user_owner", Role::View)]);
    let engine = engine_over(&store);

    let role = engine.resolve_role("user_owner", &org_id).await.unwrap();
    assert_eq!(role, Role::Admin);
}

#[tokio::test]
async fn non_member_is_forbidden_and_missing_org_is_not_found() {
    let store = Arc::new(MemoryOrganizationStore::default());
    let org_id = seeded_org(&store, vec![]);
    let engine = engine_over(&store);

    let err = engine.resolve_role("user_stranger", &org_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let err = engine.resolve_role("user_stranger", "org_missing").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn require_role_enforces_the_hierarchy() {
    let store = Arc::new(MemoryOrganizationStore::default());
    let org_id = seeded_org(
        &store,
        vec![entry("user_viewer", Role::View), entry("user_editor", Role::Edit)],
    );
    let engine = engine_over(&store);

    // A viewer can view but not edit or administer.
    assert!(engine.require_role("user_viewer", &org_id, Role::View).await.is_ok());
    assert_eq!(
        engine
            .require_role("user_viewer", &org_id, Role::Edit)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::Forbidden
    );

    // An editor can view and edit but not administer.
    assert!(engine.require_role("user_editor", &org_id, Role::View).await.is_ok());
    assert!(engine.require_role("user_editor", &org_id, Role::Edit).await.is_ok());
    assert_eq!(
        engine
            .require_role("user_editor", &org_id, Role::Admin)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::Forbidden
    );

    // The owner clears every bar.
    assert!(engine.require_role("user_owner", &org_id, Role::Admin).await.is_ok());
}

#[tokio::test]
async fn legacy_member_defaults_to_edit() {
    let store = Arc::new(MemoryOrganizationStore::default());
    let mut org = Organization::new("Acme", OrgType::Team, "user_owner");
    org.legacy_members.push("user_legacy".to_string());
    let org_id = org.org_id.clone();
    store.insert(org);
    let engine = engine_over(&store);

    let role = engine.resolve_role("user_legacy", &org_id).await.unwrap();
    assert_eq!(role, Role::Edit);

    // An explicit entry wins over the legacy default.
    engine
        .update_member_role(&org_id, "user_legacy", Role::View)
        .await
        .unwrap_err(); // no role entry yet, so NotFound
    engine.remove_member(&org_id, "user_legacy").await.unwrap();
    assert_eq!(
        engine
            .resolve_role("user_legacy", &org_id)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::Forbidden
    );
}

#[tokio::test]
async fn add_member_conflicts_and_upgrades_legacy_listing() {
    let store = Arc::new(MemoryOrganizationStore::default());
    let mut org = Organization::new("Acme", OrgType::Team, "user_owner");
    org.legacy_members.push("user_legacy".to_string());
    let org_id = org.org_id.clone();
    store.insert(org);
    let engine = engine_over(&store);

    // Duplicate adds conflict, including for the implicit owner.
    engine.add_member(&org_id, "user_a", Role::View).await.unwrap();
    assert_eq!(
        engine
            .add_member(&org_id, "user_a", Role::Edit)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::Conflict
    );

    // Across both calls the membership grew by exactly one, and the
    // rejected role never took effect.
    let org = store.find_organization(&org_id).await.unwrap().unwrap();
    assert_eq!(org.member_roles.len(), 1);
    assert_eq!(org.member_entry("user_a").unwrap().role, Role::View);
    assert_eq!(
        engine
            .add_member(&org_id, "user_owner", Role::Admin)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::Conflict
    );

    // Giving a legacy member an explicit role clears the legacy listing.
    engine.add_member(&org_id, "user_legacy", Role::View).await.unwrap();
    let org = store.find_organization(&org_id).await.unwrap().unwrap();
    assert!(org.legacy_members.is_empty());
    assert_eq!(
        engine.resolve_role("user_legacy", &org_id).await.unwrap(),
        Role::View
    );
}

#[tokio::test]
async fn owner_cannot_be_removed_or_demoted() {
    let store = Arc::new(MemoryOrganizationStore::default());
    let org_id = seeded_org(&store, vec![entry("user_a", Role::Edit)]);
    let engine = engine_over(&store);

    assert_eq!(
        engine
            .remove_member(&org_id, "user_owner")
            .await
            .unwrap_err()
            .code(),
        ErrorCode::InvalidArgument
    );
    assert_eq!(
        engine
            .update_member_role(&org_id, "user_owner", Role::View)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::InvalidArgument
    );

    // A failed removal must not disturb existing membership.
    let org = store.find_organization(&org_id).await.unwrap().unwrap();
    assert_eq!(org.member_roles.len(), 1);
    assert_eq!(org.owner_id, "user_owner");
}

#[tokio::test]
async fn role_update_preserves_membership_order() {
    let store = Arc::new(MemoryOrganizationStore::default());
    let org_id = seeded_org(
        &store,
        vec![
            entry("user_a", Role::View),
            entry("user_b", Role::View),
            entry("user_c", Role::View),
        ],
    );
    let engine = engine_over(&store);

    engine
        .update_member_role(&org_id, "user_b", Role::Admin)
        .await
        .unwrap();

    let org = store.find_organization(&org_id).await.unwrap().unwrap();
    let ids: Vec<&str> = org.member_roles.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(ids, vec!["user_a", "user_b", "user_c"]);
    assert_eq!(org.member_entry("user_b").unwrap().role, Role::Admin);

    // Updating an unknown member reports the member, not the organization.
    let err = engine
        .update_member_role(&org_id, "user_zz", Role::View)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn removal_clears_both_membership_lists() {
    let store = Arc::new(MemoryOrganizationStore::default());
    let mut org = Organization::new("Acme", OrgType::Team, "user_owner");
    org.member_roles.push(entry("user_a", Role::Edit));
    org.legacy_members.push("user_a".to_string());
    let org_id = org.org_id.clone();
    store.insert(org);
    let engine = engine_over(&store);

    engine.remove_member(&org_id, "user_a").await.unwrap();

    let org = store.find_organization(&org_id).await.unwrap().unwrap();
    assert!(org.member_roles.is_empty());
    assert!(org.legacy_members.is_empty());
    assert_eq!(
        engine
            .resolve_role("user_a", &org_id)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::Forbidden
    );
}

#[test]
fn delete_guard_requires_owner_and_team_type() {
    let team = Organization::new("Acme", OrgType::Team, "user_owner");
    assert!(team.check_deletable_by("user_owner").is_ok());
    assert_eq!(
        team.check_deletable_by("user_other").unwrap_err().code(),
        ErrorCode::Forbidden
    );

    let personal = Organization::new("My Workspace", OrgType::Personal, "user_owner");
    assert_eq!(
        personal.check_deletable_by("user_owner").unwrap_err().code(),
        ErrorCode::InvalidArgument
    );
}

#[test]
fn role_ordering_and_parsing() {
    assert!(Role::View < Role::Edit);
    assert!(Role::Edit < Role::Admin);
    assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    assert_eq!(
        "superuser".parse::<Role>().unwrap_err().code(),
        ErrorCode::InvalidArgument
    );
}
