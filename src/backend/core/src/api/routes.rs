//! API route table.
//!
//! # Endpoints
//!
//! ## Auth
//! - `POST /api/auth/session` - Exchange a session id for a login cookie
//! - `GET /api/auth/me` - Current user profile
//! - `POST /api/auth/logout` - Delete the current session
//!
//! ## Organizations
//! - `GET /api/organizations` - Organizations the caller belongs to
//! - `POST /api/organizations` - Create a team organization
//! - `GET /api/organizations/:id` - Organization detail with caller's role
//! - `PUT /api/organizations/:id` - Rename (admin)
//! - `DELETE /api/organizations/:id` - Delete (owner, non-personal)
//!
//! ## Members
//! - `GET /api/organizations/:id/members` - Member list with roles (viewer)
//! - `POST /api/organizations/:id/members` - Add member by email (admin)
//! - `PUT /api/organizations/:id/members/:user_id` - Change a member's role (admin)
//! - `DELETE /api/organizations/:id/members/:user_id` - Remove a member (admin)
//!
//! ## Collections and requests
//! - `GET /api/organizations/:id/collections` - List collections (viewer)
//! - `POST /api/organizations/:id/collections` - Create collection (editor)
//! - `GET /api/collections/:id` / `PUT` / `DELETE`
//! - `GET /api/organizations/:id/requests` - List saved requests (viewer)
//! - `POST /api/requests` - Save a request (editor)
//! - `GET /api/requests/:id` / `PUT` / `DELETE`
//!
//! ## Execution
//! - `POST /api/requests/execute` - Proxy a request to its target
//! - `GET /api/organizations/:id/history` - Recent executions (viewer)
//!
//! ## Environments
//! - `GET /api/organizations/:id/environments` - List environments (viewer)
//! - `POST /api/organizations/:id/environments` - Create environment (editor)

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::{handlers, AppState};

pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/session", post(handlers::create_session))
        .route("/auth/me", get(handlers::current_user))
        .route("/auth/logout", post(handlers::logout))
        // Organizations
        .route("/organizations", get(handlers::list_organizations))
        .route("/organizations", post(handlers::create_organization))
        .route("/organizations/:id", get(handlers::get_organization))
        .route("/organizations/:id", put(handlers::update_organization))
        .route("/organizations/:id", delete(handlers::delete_organization))
        // Members
        .route("/organizations/:id/members", get(handlers::list_members))
        .route("/organizations/:id/members", post(handlers::add_member))
        .route(
            "/organizations/:id/members/:user_id",
            put(handlers::update_member_role),
        )
        .route(
            "/organizations/:id/members/:user_id",
            delete(handlers::remove_member),
        )
        // Collections
        .route(
            "/organizations/:id/collections",
            get(handlers::list_collections),
        )
        .route(
            "/organizations/:id/collections",
            post(handlers::create_collection),
        )
        .route("/collections/:id", get(handlers::get_collection))
        .route("/collections/:id", put(handlers::update_collection))
        .route("/collections/:id", delete(handlers::delete_collection))
        // Saved requests
        .route("/organizations/:id/requests", get(handlers::list_requests))
        .route("/requests", post(handlers::create_request))
        .route("/requests/execute", post(handlers::execute_request))
        .route("/requests/:id", get(handlers::get_request))
        .route("/requests/:id", put(handlers::update_request))
        .route("/requests/:id", delete(handlers::delete_request))
        // History
        .route("/organizations/:id/history", get(handlers::list_history))
        // Environments
        .route(
            "/organizations/:id/environments",
            get(handlers::list_environments),
        )
        .route(
            "/organizations/:id/environments",
            post(handlers::create_environment),
        )
}
