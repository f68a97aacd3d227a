//! HTTP API layer for Courier.
//!
//! All routes live under `/api` and return the [`ApiResponse`] envelope.
//! Errors are converted to their HTTP form by the `IntoResponse`
//! implementation on `CourierError`.

mod handlers;
mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::IdentityClient;
use crate::db::Database;
use crate::permissions::PermissionEngine;
use crate::proxy::RequestExecutor;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub permissions: PermissionEngine,
    pub executor: RequestExecutor,
    pub identity: IdentityClient,
}

impl AppState {
    pub fn new(db: Arc<Database>, executor: RequestExecutor, identity: IdentityClient) -> Self {
        let permissions = PermissionEngine::new(db.clone());
        Self {
            db,
            permissions,
            executor,
            identity,
        }
    }
}

/// Build the application router.
///
/// The frontend runs on a different origin and authenticates with a
/// cross-site cookie, so CORS is wide open here and tightened at the
/// ingress.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", routes::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Success envelope for API responses. Failures render through
/// [`crate::error::ErrorResponse`] instead.
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, Some("test data"));
    }

    #[test]
    fn test_api_response_envelope_shape() {
        let response = ApiResponse::success(42);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 42}));
    }
}
