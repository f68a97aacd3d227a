//! Domain models shared by the API and storage layers.
//!
//! Organization and role types live in [`crate::permissions`]; request
//! specification types in [`crate::proxy`]. Everything here is plain CRUD
//! data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::proxy::{KeyValue, RequestAuth, RequestBody};

fn short_id(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>, picture: Option<String>) -> Self {
        Self {
            user_id: short_id("user"),
            email: email.into(),
            name: name.into(),
            picture,
        }
    }
}

/// A stored session token. Sessions expire seven days after creation.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub const LIFETIME_DAYS: i64 = 7;

    pub fn new(user_id: impl Into<String>, session_token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_token: session_token.into(),
            user_id: user_id.into(),
            expires_at: now + chrono::Duration::days(Self::LIFETIME_DAYS),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// A named group of saved requests within an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub collection_id: String,
    pub org_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_COLLECTION_COLOR: &str = "#3B82F6";

impl Collection {
    pub fn new(
        org_id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        color: Option<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            collection_id: short_id("col"),
            org_id: org_id.into(),
            name: name.into(),
            description,
            color: color.unwrap_or_else(|| DEFAULT_COLLECTION_COLOR.to_string()),
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }
}

/// A saved request definition, keyed to an organization and optionally
/// filed under a collection. The script fields are stored for the client;
/// the backend never evaluates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRequest {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    pub org_id: String,
    pub name: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<KeyValue>,
    pub params: Vec<KeyValue>,
    pub body: RequestBody,
    pub auth: RequestAuth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_request_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_request_script: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A set of variables scoped to an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub env_id: String,
    pub org_id: String,
    pub name: String,
    pub variables: Vec<KeyValue>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Environment {
    pub fn new(
        org_id: impl Into<String>,
        name: impl Into<String>,
        variables: Vec<KeyValue>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            env_id: short_id("env"),
            org_id: org_id.into(),
            name: name.into(),
            variables,
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }
}

/// One executed request, as recorded for an organization's history view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub history_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub user_id: String,
    pub org_id: String,
    pub method: String,
    pub url: String,
    pub status: i32,
    pub time: i64,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        request_id: Option<String>,
        user_id: impl Into<String>,
        org_id: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        status: i32,
        time: i64,
    ) -> Self {
        Self {
            history_id: short_id("hist"),
            request_id,
            user_id: user_id.into(),
            org_id: org_id.into(),
            method: method.into(),
            url: url.into(),
            status,
            time,
            timestamp: Utc::now(),
        }
    }
}

/// Generate a new request id. Public so handlers can mint ids without
/// constructing the full struct first.
pub fn generate_request_id() -> String {
    short_id("req")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_shapes() {
        let user = User::new("a@b.c", "A", None);
        assert!(user.user_id.starts_with("user_"));

        let coll = Collection::new("org_x", "c", None, None, "user_x");
        assert!(coll.collection_id.starts_with("col_"));
        assert_eq!(coll.color, DEFAULT_COLLECTION_COLOR);
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new("user_1", "tok");
        assert!(!session.is_expired());
        session.expires_at = Utc::now() - chrono::Duration::minutes(1);
        assert!(session.is_expired());
    }
}
