//!
//! warden HTTP server
//! ------------------
//! Axum boundary over the authorization guard. The credential verifier is an
//! upstream collaborator: requests arrive with the authenticated user id in
//! the `x-user-id` header, and this layer only enforces permissions and
//! marshals guard results onto the wire contract:
//! - 201 on grant/assign with `{userId, permissionId|roleId, grantedAt|assignedAt, expiresAt}`
//! - 204 on revoke/remove with empty body
//! - 401 when no identity header is present
//! - 403 `{error, message}` on authorization denial
//! - 404 `{error, message}` when the target user/permission/role is missing

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::cache::PermissionCache;
use crate::error::AppError;
use crate::guard::{AuthorizationGuard, RequireMode};
use crate::model::NewPermission;
use crate::store::PermissionStore;

const IDENTITY_HEADER: &str = "x-user-id";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<AuthorizationGuard>,
}

/// Authenticated caller id from the identity header, if present.
fn caller_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "unauthorized", "message": "no authenticated user identity"})),
    )
        .into_response()
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": "forbidden", "message": message})),
    )
        .into_response()
}

/// Map an `AppError` onto the `{error, message}` wire shape.
fn error_response(e: &AppError) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(target: "warden::server", "request failed: {}", e);
    }
    (status, Json(json!({"error": e.code_str(), "message": e.message()}))).into_response()
}

/// Gate a handler on required permissions, all of which must match.
/// Returns the caller id on success, or the ready-made error response.
async fn require(
    state: &AppState,
    headers: &HeaderMap,
    required: &[&str],
) -> Result<String, Response> {
    let Some(caller) = caller_id(headers) else { return Err(unauthorized()) };
    match state.guard.authorize(&caller, required, RequireMode::All).await {
        Ok(true) => Ok(caller),
        Ok(false) => Err(forbidden("you do not have permission to access this resource")),
        Err(e) => Err(error_response(&e)),
    }
}

/// Self-service or management: a user may read their own grants, anyone
/// else needs `users:manage`.
async fn require_self_or_manage(
    state: &AppState,
    headers: &HeaderMap,
    target_user: &str,
) -> Result<String, Response> {
    let Some(caller) = caller_id(headers) else { return Err(unauthorized()) };
    if caller == target_user {
        return Ok(caller);
    }
    match state.guard.has_permission(&caller, "users:manage").await {
        Ok(true) => Ok(caller),
        Ok(false) => Err(forbidden("you do not have permission to view another user's grants")),
        Err(e) => Err(error_response(&e)),
    }
}

async fn get_user_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Response {
    if let Err(resp) = require_self_or_manage(&state, &headers, &user_id).await {
        return resp;
    }
    match state.guard.user_permissions(&user_id).await {
        Ok(permissions) => {
            let mut sorted: Vec<String> = permissions.into_iter().collect();
            sorted.sort();
            (StatusCode::OK, Json(json!({"userId": user_id, "permissions": sorted}))).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn get_user_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Response {
    if let Err(resp) = require_self_or_manage(&state, &headers, &user_id).await {
        return resp;
    }
    match state.guard.user_roles(&user_id).await {
        Ok(roles) => (StatusCode::OK, Json(json!({"userId": user_id, "roles": roles}))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_user_permission_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Response {
    if let Err(resp) = require_self_or_manage(&state, &headers, &user_id).await {
        return resp;
    }
    match state.guard.permission_detail(&user_id).await {
        Ok(detail) => (StatusCode::OK, Json(json!(detail))).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantPayload {
    user_id: String,
    permission_id: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

async fn grant_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GrantPayload>,
) -> Response {
    let granted_by = match require(&state, &headers, &["users:manage", "permissions:assign"]).await {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    match state
        .guard
        .grant_permission(&payload.user_id, &payload.permission_id, &granted_by, payload.expires_at)
        .await
    {
        Ok(grant) => (
            StatusCode::CREATED,
            Json(json!({
                "userId": grant.user_id,
                "permissionId": grant.permission_id,
                "grantedAt": grant.granted_at,
                "expiresAt": grant.expires_at,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn revoke_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((user_id, permission_id)): Path<(String, String)>,
) -> Response {
    if let Err(resp) = require(&state, &headers, &["users:manage", "permissions:revoke"]).await {
        return resp;
    }
    match state.guard.revoke_permission(&user_id, &permission_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignPayload {
    user_id: String,
    role_id: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

async fn assign_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AssignPayload>,
) -> Response {
    let assigned_by = match require(&state, &headers, &["users:manage", "roles:assign"]).await {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    match state
        .guard
        .assign_role(&payload.user_id, &payload.role_id, &assigned_by, payload.expires_at)
        .await
    {
        Ok(assignment) => (
            StatusCode::CREATED,
            Json(json!({
                "userId": assignment.user_id,
                "roleId": assignment.role_id,
                "assignedAt": assignment.assigned_at,
                "expiresAt": assignment.expires_at,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn remove_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((user_id, role_id)): Path<(String, String)>,
) -> Response {
    if let Err(resp) = require(&state, &headers, &["users:manage", "roles:revoke"]).await {
        return resp;
    }
    match state.guard.remove_role(&user_id, &role_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn create_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewPermission>,
) -> Response {
    if let Err(resp) = require(&state, &headers, &["permissions:create"]).await {
        return resp;
    }
    match state.guard.create_permission(payload).await {
        Ok(permission) => (StatusCode::CREATED, Json(json!(permission))).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRolePayload {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    permission_ids: Vec<String>,
}

async fn create_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRolePayload>,
) -> Response {
    if let Err(resp) = require(&state, &headers, &["roles:create"]).await {
        return resp;
    }
    if payload.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "bad_input", "message": "role name is required"})),
        )
            .into_response();
    }
    match state
        .guard
        .create_role(&payload.name, payload.description, &payload.permission_ids)
        .await
    {
        Ok(role) => (StatusCode::CREATED, Json(json!(role))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_roles(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require(&state, &headers, &["roles:read"]).await {
        return resp;
    }
    match state.guard.active_roles().await {
        Ok(roles) => {
            let body: Vec<serde_json::Value> = roles
                .into_iter()
                .map(|(role, permissions)| json!({"role": role, "permissions": permissions}))
                .collect();
            (StatusCode::OK, Json(json!(body))).into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplacePermissionsPayload {
    permission_ids: Vec<String>,
}

async fn replace_role_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role_id): Path<String>,
    Json(payload): Json<ReplacePermissionsPayload>,
) -> Response {
    if let Err(resp) = require(&state, &headers, &["roles:update"]).await {
        return resp;
    }
    match state.guard.replace_role_permissions(&role_id, &payload.permission_ids).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"roleId": role_id, "permissionCount": payload.permission_ids.len()})),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_role_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role_id): Path<String>,
) -> Response {
    if let Err(resp) = require(&state, &headers, &["roles:read"]).await {
        return resp;
    }
    match state.guard.role_members(&role_id).await {
        Ok(users) => (StatusCode::OK, Json(json!(users))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Mount all routes over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "warden ok" }))
        .route("/users/{user_id}/permissions", get(get_user_permissions))
        .route("/users/{user_id}/permissions/detail", get(get_user_permission_detail))
        .route("/users/{user_id}/roles", get(get_user_roles))
        .route("/users/permissions", post(grant_permission))
        .route("/users/{user_id}/permissions/{permission_id}", delete(revoke_permission))
        .route("/users/roles", post(assign_role))
        .route("/users/{user_id}/roles/{role_id}", delete(remove_role))
        .route("/permissions", post(create_permission))
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/{role_id}/permissions", put(replace_role_permissions))
        .route("/roles/{role_id}/users", get(get_role_members))
        .with_state(state)
}

/// Start the warden HTTP server on the given port over the given store.
///
/// The composition root lives here: one cache (injected clock, default TTL),
/// one guard, both process-wide and handed to handlers through `AppState`.
pub async fn run_with_port(port: u16, store: Arc<dyn PermissionStore>) -> anyhow::Result<()> {
    let cache = Arc::new(PermissionCache::with_defaults());
    let guard = Arc::new(AuthorizationGuard::new(store, cache));
    let state = AppState { guard };

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(target: "warden", "listening on {} (ttl=300s)", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
