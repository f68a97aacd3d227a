//! Session handling.
//!
//! Login delegates identity to an external session-exchange service: the
//! client sends an opaque session id, we trade it for a profile, then mint
//! our own 7-day session token. Handlers get the caller through the
//! [`CurrentUser`] extractor, which accepts the `session_token` cookie or an
//! `Authorization: Bearer` header.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::error::{CourierError, ErrorCode, Result};
use crate::models::{Session, User};
use crate::permissions::{Organization, OrgType};
use crate::store::OrganizationStore;

/// Profile returned by the identity service for a valid session id.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProfile {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    pub session_token: String,
}

/// Client for the external session-exchange endpoint.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    exchange_url: String,
}

impl IdentityClient {
    pub fn new(exchange_url: String, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, exchange_url }
    }

    /// Exchange an opaque session id for an identity profile.
    pub async fn exchange_session(&self, session_id: &str) -> Result<IdentityProfile> {
        let response = self
            .client
            .get(&self.exchange_url)
            .header("X-Session-ID", session_id)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CourierError::new(
                ErrorCode::Unauthenticated,
                "Invalid session ID",
            ));
        }

        let profile = response.json::<IdentityProfile>().await?;
        Ok(profile)
    }
}

/// Complete a login: upsert the user, ensure their personal workspace
/// exists, and persist the session token from the identity service.
pub async fn login(state: &AppState, profile: IdentityProfile) -> Result<(User, Session)> {
    let user = match state.db.find_user_by_email(&profile.email).await? {
        Some(existing) => {
            state
                .db
                .update_user_profile(&existing.user_id, &profile.name, profile.picture.as_deref())
                .await?;
            User {
                name: profile.name,
                picture: profile.picture,
                ..existing
            }
        }
        None => {
            let user = User::new(profile.email, profile.name, profile.picture);
            state.db.insert_user(&user).await?;

            let workspace = Organization::new(
                "My Workspace".to_string(),
                OrgType::Personal,
                user.user_id.clone(),
            );
            state.db.insert_organization(&workspace).await?;
            debug!(user_id = %user.user_id, org_id = %workspace.org_id, "created personal workspace");

            user
        }
    };

    let session = Session::new(user.user_id.clone(), profile.session_token);
    state.db.insert_session(&session).await?;

    Ok((user, session))
}

/// Pull the bearer token for the request, cookie first.
pub(crate) fn extract_token(headers: &header::HeaderMap) -> Option<String> {
    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        for pair in cookies.split(';') {
            let mut it = pair.trim().splitn(2, '=');
            if it.next() == Some("session_token") {
                if let Some(value) = it.next() {
                    return Some(value.to_string());
                }
            }
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

/// Authenticated caller, resolved from the session token.
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = CourierError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| CourierError::unauthenticated("Not authenticated"))?;

        let session = state
            .db
            .find_session(&token)
            .await?
            .ok_or_else(|| CourierError::unauthenticated("Invalid session"))?;

        if session.is_expired() {
            warn!(user_id = %session.user_id, "expired session presented");
            state.db.delete_session(&token).await?;
            return Err(CourierError::new(ErrorCode::SessionExpired, "Session expired"));
        }

        let user = state
            .db
            .find_user(&session.user_id)
            .await?
            .ok_or_else(|| CourierError::unauthenticated("Invalid session"))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn headers_with(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(name.clone(), value.parse().unwrap());
        }
        headers
    }

    #[test]
    fn token_from_cookie() {
        let headers = headers_with(&[(header::COOKIE, "theme=dark; session_token=abc123")]);
        assert_eq!(extract_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn token_from_bearer_header() {
        let headers = headers_with(&[(header::AUTHORIZATION, "Bearer tok-42")]);
        assert_eq!(extract_token(&headers), Some("tok-42".to_string()));
    }

    #[test]
    fn cookie_takes_precedence() {
        let headers = headers_with(&[
            (header::COOKIE, "session_token=from-cookie"),
            (header::AUTHORIZATION, "Bearer from-header"),
        ]);
        assert_eq!(extract_token(&headers), Some("from-cookie".to_string()));
    }

    #[test]
    fn missing_token() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
