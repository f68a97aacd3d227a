//! # Courier Core
//!
//! Backend for Courier, a collaborative API testing workspace.
//!
//! ## Architecture
//!
//! - **Permission Engine**: Hierarchical role checks (`view < edit < admin`)
//!   over organization membership, with the owner always admin
//! - **Request Execution Proxy**: Executes user-described HTTP requests
//!   server-side and returns a uniform outcome envelope
//! - **Workspace Data**: Organizations, collections, saved requests,
//!   environments, and execution history in PostgreSQL
//! - **Auth**: Opaque-token sessions minted from an external identity
//!   exchange service

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod observability;
pub mod permissions;
pub mod proxy;
pub mod store;

pub use error::{CourierError, ErrorCode, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, ApiResponse, AppState};
    pub use crate::auth::{CurrentUser, IdentityClient};
    pub use crate::db::Database;
    pub use crate::error::{CourierError, ErrorCode, Result};
    pub use crate::models::{Collection, Environment, HistoryEntry, SavedRequest, Session, User};
    pub use crate::permissions::{MemberEntry, Organization, OrgType, PermissionEngine, Role};
    pub use crate::proxy::{ExecutionResult, RequestExecutor, RequestSpec};
    pub use crate::store::OrganizationStore;
}
