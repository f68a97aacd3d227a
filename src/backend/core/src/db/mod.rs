//! Database layer for Courier.
//!
//! Uses PostgreSQL for persistent storage with sqlx. Membership lives in a
//! single JSONB column on `organizations`, so [`OrganizationStore`]'s
//! atomic-document-write contract holds at the row level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::{CourierError, Result};
use crate::models::{Collection, Environment, HistoryEntry, SavedRequest, Session, User};
use crate::permissions::{MemberEntry, Organization, OrgType};
use crate::store::OrganizationStore;

/// Database connection and operations.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn new(database_url: &str, max_connections: u32, min_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CourierError::internal(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // User Operations
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, name, picture)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.picture)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, email, name, picture
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, email, name, picture
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Refresh profile fields on login.
    pub async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        picture: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, picture = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(picture)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Session Operations
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_token, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_token) DO UPDATE SET expires_at = $3
            "#,
        )
        .bind(&session.session_token)
        .bind(&session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_session(&self, session_token: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_token, user_id, expires_at, created_at
            FROM sessions
            WHERE session_token = $1
            "#,
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Session::from))
    }

    pub async fn delete_session(&self, session_token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_token = $1")
            .bind(session_token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Collection Operations
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn insert_collection(&self, collection: &Collection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collections (collection_id, org_id, name, description, color, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&collection.collection_id)
        .bind(&collection.org_id)
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(&collection.color)
        .bind(&collection.created_by)
        .bind(collection.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_collection(&self, collection_id: &str) -> Result<Option<Collection>> {
        let row = sqlx::query_as::<_, CollectionRow>(
            r#"
            SELECT collection_id, org_id, name, description, color, created_by, created_at
            FROM collections
            WHERE collection_id = $1
            "#,
        )
        .bind(collection_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Collection::from))
    }

    pub async fn collections_for_org(&self, org_id: &str) -> Result<Vec<Collection>> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            r#"
            SELECT collection_id, org_id, name, description, color, created_by, created_at
            FROM collections
            WHERE org_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Collection::from).collect())
    }

    pub async fn update_collection(&self, collection: &Collection) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE collections
            SET name = $2, description = $3, color = $4
            WHERE collection_id = $1
            "#,
        )
        .bind(&collection.collection_id)
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(&collection.color)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_collection(&self, collection_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM collections WHERE collection_id = $1")
            .bind(collection_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Saved Request Operations
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn insert_request(&self, request: &SavedRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO requests
                (request_id, collection_id, org_id, name, method, url,
                 headers, params, body, auth, pre_request_script,
                 post_request_script, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&request.request_id)
        .bind(&request.collection_id)
        .bind(&request.org_id)
        .bind(&request.name)
        .bind(&request.method)
        .bind(&request.url)
        .bind(serde_json::to_value(&request.headers)?)
        .bind(serde_json::to_value(&request.params)?)
        .bind(serde_json::to_value(&request.body)?)
        .bind(serde_json::to_value(&request.auth)?)
        .bind(&request.pre_request_script)
        .bind(&request.post_request_script)
        .bind(&request.created_by)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_request(&self, request_id: &str) -> Result<Option<SavedRequest>> {
        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT request_id, collection_id, org_id, name, method, url,
                   headers, params, body, auth, pre_request_script,
                   post_request_script, created_by, created_at, updated_at
            FROM requests
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SavedRequest::try_from).transpose()
    }

    pub async fn requests_for_org(&self, org_id: &str) -> Result<Vec<SavedRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT request_id, collection_id, org_id, name, method, url,
                   headers, params, body, auth, pre_request_script,
                   post_request_script, created_by, created_at, updated_at
            FROM requests
            WHERE org_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SavedRequest::try_from).collect()
    }

    pub async fn update_request(&self, request: &SavedRequest) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE requests
            SET collection_id = $2, name = $3, method = $4, url = $5,
                headers = $6, params = $7, body = $8, auth = $9,
                pre_request_script = $10, post_request_script = $11, updated_at = $12
            WHERE request_id = $1
            "#,
        )
        .bind(&request.request_id)
        .bind(&request.collection_id)
        .bind(&request.name)
        .bind(&request.method)
        .bind(&request.url)
        .bind(serde_json::to_value(&request.headers)?)
        .bind(serde_json::to_value(&request.params)?)
        .bind(serde_json::to_value(&request.body)?)
        .bind(serde_json::to_value(&request.auth)?)
        .bind(&request.pre_request_script)
        .bind(&request.post_request_script)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_request(&self, request_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM requests WHERE request_id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Environment Operations
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn insert_environment(&self, env: &Environment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO environments (env_id, org_id, name, variables, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&env.env_id)
        .bind(&env.org_id)
        .bind(&env.name)
        .bind(serde_json::to_value(&env.variables)?)
        .bind(&env.created_by)
        .bind(env.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn environments_for_org(&self, org_id: &str) -> Result<Vec<Environment>> {
        let rows = sqlx::query_as::<_, EnvironmentRow>(
            r#"
            SELECT env_id, org_id, name, variables, created_by, created_at
            FROM environments
            WHERE org_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Environment::try_from).collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // History Operations
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn insert_history(&self, entry: &HistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO request_history
                (history_id, request_id, user_id, org_id, method, url, status, time_ms, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&entry.history_id)
        .bind(&entry.request_id)
        .bind(&entry.user_id)
        .bind(&entry.org_id)
        .bind(&entry.method)
        .bind(&entry.url)
        .bind(entry.status)
        .bind(entry.time)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The most recent 100 entries for an organization, newest first.
    pub async fn history_for_org(&self, org_id: &str) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT history_id, request_id, user_id, org_id, method, url, status, time_ms, timestamp
            FROM request_history
            WHERE org_id = $1
            ORDER BY timestamp DESC
            LIMIT 100
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Organization Store
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl OrganizationStore for Database {
    async fn find_organization(&self, org_id: &str) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT org_id, name, org_type, owner_id, member_roles, legacy_members, created_at
            FROM organizations
            WHERE org_id = $1
            "#,
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Organization::try_from).transpose()
    }

    async fn insert_organization(&self, org: &Organization) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations
                (org_id, name, org_type, owner_id, member_roles, legacy_members, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&org.org_id)
        .bind(&org.name)
        .bind(org_type_str(org.org_type))
        .bind(&org.owner_id)
        .bind(serde_json::to_value(&org.member_roles)?)
        .bind(serde_json::to_value(&org.legacy_members)?)
        .bind(org.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_organization(&self, org: &Organization) -> Result<()> {
        // Single-row UPDATE: name and the full membership state move
        // together atomically.
        sqlx::query(
            r#"
            UPDATE organizations
            SET name = $2, org_type = $3, member_roles = $4, legacy_members = $5
            WHERE org_id = $1
            "#,
        )
        .bind(&org.org_id)
        .bind(&org.name)
        .bind(org_type_str(org.org_type))
        .bind(serde_json::to_value(&org.member_roles)?)
        .bind(serde_json::to_value(&org.legacy_members)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_organization(&self, org_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM organizations WHERE org_id = $1")
            .bind(org_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn organizations_for_user(&self, user_id: &str) -> Result<Vec<Organization>> {
        let rows = sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT org_id, name, org_type, owner_id, member_roles, legacy_members, created_at
            FROM organizations
            WHERE owner_id = $1
               OR EXISTS (
                    SELECT 1 FROM jsonb_array_elements(member_roles) m
                    WHERE m->>'user_id' = $1
               )
               OR legacy_members @> to_jsonb($1::text)
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Organization::try_from).collect()
    }
}

fn org_type_str(org_type: OrgType) -> &'static str {
    match org_type {
        OrgType::Personal => "personal",
        OrgType::Team => "team",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    email: String,
    name: String,
    picture: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            name: row.name,
            picture: row.picture,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_token: String,
    user_id: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            session_token: row.session_token,
            user_id: row.user_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    org_id: String,
    name: String,
    org_type: String,
    owner_id: String,
    member_roles: serde_json::Value,
    legacy_members: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = CourierError;

    fn try_from(row: OrganizationRow) -> Result<Self> {
        let member_roles: Vec<MemberEntry> = serde_json::from_value(row.member_roles)?;
        let legacy_members: Vec<String> = serde_json::from_value(row.legacy_members)?;
        let org_type = match row.org_type.as_str() {
            "personal" => OrgType::Personal,
            _ => OrgType::Team,
        };

        Ok(Self {
            org_id: row.org_id,
            name: row.name,
            org_type,
            owner_id: row.owner_id,
            member_roles,
            legacy_members,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    collection_id: String,
    org_id: String,
    name: String,
    description: Option<String>,
    color: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Self {
            collection_id: row.collection_id,
            org_id: row.org_id,
            name: row.name,
            description: row.description,
            color: row.color,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    request_id: String,
    collection_id: Option<String>,
    org_id: String,
    name: String,
    method: String,
    url: String,
    headers: serde_json::Value,
    params: serde_json::Value,
    body: serde_json::Value,
    auth: serde_json::Value,
    pre_request_script: Option<String>,
    post_request_script: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for SavedRequest {
    type Error = CourierError;

    fn try_from(row: RequestRow) -> Result<Self> {
        Ok(Self {
            request_id: row.request_id,
            collection_id: row.collection_id,
            org_id: row.org_id,
            name: row.name,
            method: row.method,
            url: row.url,
            headers: serde_json::from_value(row.headers)?,
            params: serde_json::from_value(row.params)?,
            body: serde_json::from_value(row.body)?,
            auth: serde_json::from_value(row.auth)?,
            pre_request_script: row.pre_request_script,
            post_request_script: row.post_request_script,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EnvironmentRow {
    env_id: String,
    org_id: String,
    name: String,
    variables: serde_json::Value,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<EnvironmentRow> for Environment {
    type Error = CourierError;

    fn try_from(row: EnvironmentRow) -> Result<Self> {
        Ok(Self {
            env_id: row.env_id,
            org_id: row.org_id,
            name: row.name,
            variables: serde_json::from_value(row.variables)?,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    history_id: String,
    request_id: Option<String>,
    user_id: String,
    org_id: String,
    method: String,
    url: String,
    status: i32,
    time_ms: i64,
    timestamp: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            history_id: row.history_id,
            request_id: row.request_id,
            user_id: row.user_id,
            org_id: row.org_id,
            method: row.method,
            url: row.url,
            status: row.status,
            time: row.time_ms,
            timestamp: row.timestamp,
        }
    }
}
