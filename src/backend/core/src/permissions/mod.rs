//! Role-based permissions for organization workspaces.
//!
//! Every mutating organization-scoped operation funnels through
//! [`PermissionEngine::require_role`], which resolves the caller's
//! effective role and compares it against the operation's minimum.
//!
//! Roles form a total order (`view < edit < admin`); the organization
//! owner is implicitly admin and never appears in the membership list.

mod engine;
mod models;
mod role;

pub use engine::PermissionEngine;
pub use models::{MemberEntry, Organization, OrgType};
pub use role::Role;
