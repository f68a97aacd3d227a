//! API request handlers with proper error propagation.
//!
//! All handlers return `Result<impl IntoResponse, CourierError>` so that
//! errors are automatically converted to the HTTP envelope via the
//! `IntoResponse` implementation on `CourierError`.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ApiResponse, AppState};
use crate::auth::{self, CurrentUser};
use crate::error::CourierError;
use crate::models::{Collection, Environment, HistoryEntry, SavedRequest, User};
use crate::permissions::{Organization, OrgType, Role};
use crate::proxy::{KeyValue, RequestAuth, RequestBody, RequestSpec};
use crate::store::OrganizationStore;

const SESSION_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

// ═══════════════════════════════════════════════════════════════════════════════
// Auth Handlers
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub session_id: String,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, CourierError> {
    let profile = state.identity.exchange_session(&req.session_id).await?;
    let (user, session) = auth::login(&state, profile).await?;

    info!(user_id = %user.user_id, "user logged in");

    let cookie = format!(
        "session_token={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=None",
        session.session_token, SESSION_MAX_AGE_SECS
    );

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(ApiResponse::success(user)),
    ))
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(ApiResponse::success(user))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, CourierError> {
    if let Some(token) = auth::extract_token(&headers) {
        state.db.delete_session(&token).await?;
    }

    let clear = "session_token=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=None".to_string();
    Ok((
        AppendHeaders([(header::SET_COOKIE, clear)]),
        Json(ApiResponse::success(serde_json::json!({"message": "Logged out"}))),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Organization Handlers
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct OrganizationResponse {
    pub org_id: String,
    pub name: String,
    pub org_type: OrgType,
    pub owner_id: String,
    pub members: Vec<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl OrganizationResponse {
    fn from_org(org: &Organization, role: Role) -> Self {
        Self {
            org_id: org.org_id.clone(),
            name: org.name.clone(),
            org_type: org.org_type,
            owner_id: org.owner_id.clone(),
            members: org.member_ids(),
            role,
            created_at: org.created_at,
        }
    }
}

pub async fn list_organizations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, CourierError> {
    let orgs = state.db.organizations_for_user(&user.user_id).await?;

    let response: Vec<OrganizationResponse> = orgs
        .iter()
        .filter_map(|org| {
            org.role_of(&user.user_id)
                .map(|role| OrganizationResponse::from_org(org, role))
        })
        .collect();

    Ok(Json(ApiResponse::success(response)))
}

#[derive(Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
}

pub async fn create_organization(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, CourierError> {
    if req.name.trim().is_empty() {
        return Err(CourierError::invalid_argument(
            "Organization name cannot be empty",
        ));
    }

    let org = Organization::new(req.name.trim(), OrgType::Team, user.user_id.clone());
    state.db.insert_organization(&org).await?;
    info!(org_id = %org.org_id, owner = %user.user_id, "organization created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(OrganizationResponse::from_org(
            &org,
            Role::Admin,
        ))),
    ))
}

pub async fn get_organization(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    let role = state.permissions.resolve_role(&user.user_id, &org_id).await?;
    let org = state
        .db
        .find_organization(&org_id)
        .await?
        .ok_or_else(|| CourierError::not_found("Organization", &org_id))?;

    Ok(Json(ApiResponse::success(OrganizationResponse::from_org(
        &org, role,
    ))))
}

#[derive(Deserialize)]
pub struct UpdateOrganizationRequest {
    pub name: String,
}

pub async fn update_organization(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<impl IntoResponse, CourierError> {
    let role = state
        .permissions
        .require_role(&user.user_id, &org_id, Role::Admin)
        .await?;

    if req.name.trim().is_empty() {
        return Err(CourierError::invalid_argument(
            "Organization name cannot be empty",
        ));
    }

    let mut org = state
        .db
        .find_organization(&org_id)
        .await?
        .ok_or_else(|| CourierError::not_found("Organization", &org_id))?;
    org.name = req.name.trim().to_string();
    state.db.update_organization(&org).await?;

    Ok(Json(ApiResponse::success(OrganizationResponse::from_org(
        &org, role,
    ))))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    let org = state
        .db
        .find_organization(&org_id)
        .await?
        .ok_or_else(|| CourierError::not_found("Organization", &org_id))?;

    org.check_deletable_by(&user.user_id)?;

    state.db.delete_organization(&org_id).await?;
    info!(%org_id, "organization deleted");

    Ok(Json(ApiResponse::success(
        serde_json::json!({"message": "Organization deleted"}),
    )))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Member Handlers
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct MemberResponse {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub role: Role,
    pub is_owner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl MemberResponse {
    fn new(user_id: &str, profile: Option<User>, role: Role, is_owner: bool) -> Self {
        let (email, name, picture) = match profile {
            Some(u) => (Some(u.email), Some(u.name), u.picture),
            None => (None, None, None),
        };
        Self {
            user_id: user_id.to_string(),
            email,
            name,
            picture,
            role,
            is_owner,
            added_at: None,
        }
    }
}

pub async fn list_members(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::View)
        .await?;

    let org = state
        .db
        .find_organization(&org_id)
        .await?
        .ok_or_else(|| CourierError::not_found("Organization", &org_id))?;

    let mut members = Vec::with_capacity(1 + org.member_roles.len() + org.legacy_members.len());

    let owner_profile = state.db.find_user(&org.owner_id).await?;
    members.push(MemberResponse::new(
        &org.owner_id,
        owner_profile,
        Role::Admin,
        true,
    ));

    for entry in &org.member_roles {
        let profile = state.db.find_user(&entry.user_id).await?;
        let mut member = MemberResponse::new(&entry.user_id, profile, entry.role, false);
        member.added_at = Some(entry.added_at);
        members.push(member);
    }

    for legacy in &org.legacy_members {
        if legacy == &org.owner_id || org.member_entry(legacy).is_some() {
            continue;
        }
        let profile = state.db.find_user(legacy).await?;
        members.push(MemberResponse::new(legacy, profile, Role::Edit, false));
    }

    Ok(Json(ApiResponse::success(members)))
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
    #[serde(default = "default_member_role")]
    pub role: String,
}

fn default_member_role() -> String {
    "view".to_string()
}

pub async fn add_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::Admin)
        .await?;

    let role: Role = req.role.parse()?;
    let target = state
        .db
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(|| CourierError::not_found("User", &req.email))?;

    state
        .permissions
        .add_member(&org_id, &target.user_id, role)
        .await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({"user_id": target.user_id, "role": role}),
    )))
}

#[derive(Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: String,
}

pub async fn update_member_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((org_id, member_id)): Path<(String, String)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::Admin)
        .await?;

    let role: Role = req.role.parse()?;
    state
        .permissions
        .update_member_role(&org_id, &member_id, role)
        .await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({"user_id": member_id, "role": role}),
    )))
}

pub async fn remove_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((org_id, member_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::Admin)
        .await?;

    state.permissions.remove_member(&org_id, &member_id).await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({"message": "Member removed"}),
    )))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Collection Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_collections(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::View)
        .await?;

    let collections = state.db.collections_for_org(&org_id).await?;
    Ok(Json(ApiResponse::success(collections)))
}

#[derive(Deserialize)]
pub struct CreateCollectionRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

pub async fn create_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::Edit)
        .await?;

    if req.name.trim().is_empty() {
        return Err(CourierError::invalid_argument(
            "Collection name cannot be empty",
        ));
    }

    let collection = Collection::new(
        org_id,
        req.name.trim(),
        req.description,
        req.color,
        user.user_id,
    );
    state.db.insert_collection(&collection).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(collection))))
}

/// Fetch a collection and check the caller holds `minimum` in its org.
async fn collection_for(
    state: &AppState,
    user_id: &str,
    collection_id: &str,
    minimum: Role,
) -> Result<Collection, CourierError> {
    let collection = state
        .db
        .find_collection(collection_id)
        .await?
        .ok_or_else(|| CourierError::not_found("Collection", collection_id))?;

    state
        .permissions
        .require_role(user_id, &collection.org_id, minimum)
        .await?;

    Ok(collection)
}

pub async fn get_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(collection_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    let collection = collection_for(&state, &user.user_id, &collection_id, Role::View).await?;
    Ok(Json(ApiResponse::success(collection)))
}

#[derive(Deserialize)]
pub struct UpdateCollectionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

pub async fn update_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(collection_id): Path<String>,
    Json(req): Json<UpdateCollectionRequest>,
) -> Result<impl IntoResponse, CourierError> {
    let mut collection = collection_for(&state, &user.user_id, &collection_id, Role::Edit).await?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(CourierError::invalid_argument(
                "Collection name cannot be empty",
            ));
        }
        collection.name = name.trim().to_string();
    }
    if let Some(description) = req.description {
        collection.description = Some(description);
    }
    if let Some(color) = req.color {
        collection.color = color;
    }

    state.db.update_collection(&collection).await?;
    Ok(Json(ApiResponse::success(collection)))
}

pub async fn delete_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(collection_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    let collection = collection_for(&state, &user.user_id, &collection_id, Role::Edit).await?;
    state.db.delete_collection(&collection.collection_id).await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({"message": "Collection deleted"}),
    )))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Saved Request Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::View)
        .await?;

    let requests = state.db.requests_for_org(&org_id).await?;
    Ok(Json(ApiResponse::success(requests)))
}

#[derive(Deserialize)]
pub struct CreateRequestRequest {
    pub name: String,
    pub method: String,
    pub url: String,
    pub collection_id: Option<String>,
    pub org_id: Option<String>,
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    #[serde(default)]
    pub params: Vec<KeyValue>,
    #[serde(default)]
    pub body: RequestBody,
    #[serde(default)]
    pub auth: RequestAuth,
    pub pre_request_script: Option<String>,
    pub post_request_script: Option<String>,
}

pub async fn create_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateRequestRequest>,
) -> Result<impl IntoResponse, CourierError> {
    if req.name.trim().is_empty() {
        return Err(CourierError::invalid_argument("Request name cannot be empty"));
    }

    // The owning organization comes from the collection when one is given,
    // from the body otherwise, falling back to the caller's first workspace.
    let org_id = match (&req.collection_id, &req.org_id) {
        (Some(collection_id), _) => {
            let collection = state
                .db
                .find_collection(collection_id)
                .await?
                .ok_or_else(|| CourierError::not_found("Collection", collection_id))?;
            collection.org_id
        }
        (None, Some(org_id)) => org_id.clone(),
        (None, None) => state
            .db
            .organizations_for_user(&user.user_id)
            .await?
            .into_iter()
            .next()
            .map(|org| org.org_id)
            .ok_or_else(|| {
                CourierError::invalid_argument("No organization to save the request in")
            })?,
    };

    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::Edit)
        .await?;

    let now = Utc::now();
    let request = SavedRequest {
        request_id: crate::models::generate_request_id(),
        collection_id: req.collection_id,
        org_id,
        name: req.name.trim().to_string(),
        method: req.method,
        url: req.url,
        headers: req.headers,
        params: req.params,
        body: req.body,
        auth: req.auth,
        pre_request_script: req.pre_request_script,
        post_request_script: req.post_request_script,
        created_by: user.user_id,
        created_at: now,
        updated_at: now,
    };
    state.db.insert_request(&request).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(request))))
}

/// Fetch a saved request and check the caller holds `minimum` in its org.
async fn request_for(
    state: &AppState,
    user_id: &str,
    request_id: &str,
    minimum: Role,
) -> Result<SavedRequest, CourierError> {
    let request = state
        .db
        .find_request(request_id)
        .await?
        .ok_or_else(|| CourierError::not_found("Request", request_id))?;

    state
        .permissions
        .require_role(user_id, &request.org_id, minimum)
        .await?;

    Ok(request)
}

pub async fn get_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    let request = request_for(&state, &user.user_id, &request_id, Role::View).await?;
    Ok(Json(ApiResponse::success(request)))
}

#[derive(Deserialize)]
pub struct UpdateRequestRequest {
    pub name: Option<String>,
    pub method: Option<String>,
    pub url: Option<String>,
    pub collection_id: Option<String>,
    pub headers: Option<Vec<KeyValue>>,
    pub params: Option<Vec<KeyValue>>,
    pub body: Option<RequestBody>,
    pub auth: Option<RequestAuth>,
    pub pre_request_script: Option<String>,
    pub post_request_script: Option<String>,
}

pub async fn update_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<String>,
    Json(req): Json<UpdateRequestRequest>,
) -> Result<impl IntoResponse, CourierError> {
    let mut request = request_for(&state, &user.user_id, &request_id, Role::Edit).await?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(CourierError::invalid_argument("Request name cannot be empty"));
        }
        request.name = name.trim().to_string();
    }
    if let Some(method) = req.method {
        request.method = method;
    }
    if let Some(url) = req.url {
        request.url = url;
    }
    if let Some(collection_id) = req.collection_id {
        request.collection_id = Some(collection_id);
    }
    if let Some(headers) = req.headers {
        request.headers = headers;
    }
    if let Some(params) = req.params {
        request.params = params;
    }
    if let Some(body) = req.body {
        request.body = body;
    }
    if let Some(auth) = req.auth {
        request.auth = auth;
    }
    if let Some(script) = req.pre_request_script {
        request.pre_request_script = Some(script);
    }
    if let Some(script) = req.post_request_script {
        request.post_request_script = Some(script);
    }
    request.updated_at = Utc::now();

    state.db.update_request(&request).await?;
    Ok(Json(ApiResponse::success(request)))
}

pub async fn delete_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    let request = request_for(&state, &user.user_id, &request_id, Role::Edit).await?;
    state.db.delete_request(&request.request_id).await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({"message": "Request deleted"}),
    )))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Execution
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct ExecuteRequestDto {
    #[serde(flatten)]
    pub spec: RequestSpec,
    pub org_id: Option<String>,
    pub request_id: Option<String>,
}

/// Execute a request against its target and return the outcome envelope.
///
/// Execution itself never fails: transport errors come back as a result
/// with `status: 0`. History is recorded only when the caller names an
/// organization they belong to; a failed role check skips the record
/// rather than failing the execution.
pub async fn execute_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ExecuteRequestDto>,
) -> Result<impl IntoResponse, CourierError> {
    let result = state.executor.execute(&req.spec).await;

    if let Some(org_id) = &req.org_id {
        match state.permissions.resolve_role(&user.user_id, org_id).await {
            Ok(_) => {
                let entry = HistoryEntry::new(
                    req.request_id.clone(),
                    user.user_id.clone(),
                    org_id.clone(),
                    req.spec.method.clone(),
                    req.spec.url.clone(),
                    result.status as i32,
                    result.time as i64,
                );
                state.db.insert_history(&entry).await?;
            }
            Err(err) => {
                debug!(%org_id, error = %err, "skipping history record");
            }
        }
    }

    Ok(Json(ApiResponse::success(result)))
}

pub async fn list_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::View)
        .await?;

    let history = state.db.history_for_org(&org_id).await?;
    Ok(Json(ApiResponse::success(history)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Environment Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_environments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::View)
        .await?;

    let environments = state.db.environments_for_org(&org_id).await?;
    Ok(Json(ApiResponse::success(environments)))
}

#[derive(Deserialize)]
pub struct CreateEnvironmentRequest {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<KeyValue>,
}

pub async fn create_environment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(org_id): Path<String>,
    Json(req): Json<CreateEnvironmentRequest>,
) -> Result<impl IntoResponse, CourierError> {
    state
        .permissions
        .require_role(&user.user_id, &org_id, Role::Edit)
        .await?;

    if req.name.trim().is_empty() {
        return Err(CourierError::invalid_argument(
            "Environment name cannot be empty",
        ));
    }

    let environment = Environment::new(org_id, req.name.trim(), req.variables, user.user_id);
    state.db.insert_environment(&environment).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(environment))))
}
