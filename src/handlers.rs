use crate::{
    AppState,
    auth::{self, CurrentSession, require_permission},
    gate::{ADMIN_ROOT, LOGIN_PATH},
    models::{
        ActivityLogEntry, CreateRoleRequest, CreateUserRequest, DashboardStats, Document,
        EntityKind, LoginForm, LoginRequest, LoginResponse, NavLink, Permission, Role,
        SessionView, UpdateRoleRequest, UpdateUserRequest, User, UserProfile,
    },
    navigation::{self, AdminShellTemplate},
    policy::has_permission,
    repository::{self, AuditDraft, PersistenceError, Repository},
    session::{AuthError, SessionStore, UserSession},
};
use askama::Template;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

const MIN_PASSWORD_LENGTH: usize = 8;
const DEFAULT_ACTIVITY_LIMIT: i64 = 100;
const MAX_ACTIVITY_LIMIT: i64 = 500;

// --- Query Structs ---

#[derive(Deserialize, Default)]
pub struct LoginPageQuery {
    pub next: Option<String>,
}

#[derive(Deserialize, utoipa::IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ActivityFilter {
    /// Maximum number of entries (1–500, default 100).
    pub limit: Option<i64>,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "login.html")]
struct LoginPageTemplate {
    error: Option<String>,
    next: String,
    username: String,
}

/// Only local admin paths are echoed back into the form.
fn sanitize_next(next: Option<String>) -> String {
    next.filter(|n| n.starts_with(ADMIN_ROOT) && !n.starts_with("//"))
        .unwrap_or_else(|| ADMIN_ROOT.to_string())
}

fn render_login(error: Option<String>, next: Option<String>, username: String) -> Html<String> {
    Html(
        LoginPageTemplate {
            error,
            next: sanitize_next(next),
            username,
        }
        .render()
        .unwrap_or_else(|_| String::from("Error rendering template")),
    )
}

// --- Error Mapping ---

/// Gateway failures become generic responses; details stay in the logs.
fn persistence_status(operation: &str, e: PersistenceError) -> StatusCode {
    match e {
        PersistenceError::Conflict => StatusCode::CONFLICT,
        other => {
            tracing::error!(operation, "persistence failure: {other}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// The activity entry for a mutation made by `session`. Stored in the same
/// write as the mutation itself.
fn audit(session: &UserSession, action: &str, details: impl Into<String>) -> AuditDraft {
    let actor = session
        .actor()
        .unwrap_or_else(|| ("anonymous".to_string(), "anonymous".to_string()));
    AuditDraft::new(actor, action, details)
}

fn into_object(value: Value) -> Result<Map<String, Value>, StatusCode> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StatusCode::UNPROCESSABLE_ENTITY),
    }
}

// --- Authentication Handlers ---

/// login_page
///
/// [Public Route] Renders the login form. `next` is preserved in a hidden field.
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Html<String> {
    render_login(None, query.next, String::new())
}

/// login_form
///
/// [Public Route] Form post from the login page. On success sets the session
/// cookie and redirects to the admin root; otherwise re-renders the form with
/// a generic error and no cookie.
pub async fn login_form(
    State(store): State<SessionStore>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = form.next.clone();
    let username = form.username.clone();
    match store.issue_session(&LoginRequest::from(form)).await {
        Ok(cookie) => (jar.add(cookie), Redirect::to(ADMIN_ROOT)).into_response(),
        Err(e) => {
            tracing::warn!(%username, "login form rejected: {e}");
            (
                StatusCode::UNAUTHORIZED,
                render_login(Some(e.user_message().to_string()), next, username),
            )
                .into_response()
        }
    }
}

/// login
///
/// [Public Route] JSON login. `{success:true}` with the cookie set, or
/// `{success:false, error}` without one.
#[utoipa::path(
    post,
    path = "/admin/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Rejected", body = LoginResponse),
        (status = 503, description = "Login not configured", body = LoginResponse)
    )
)]
pub async fn login(
    State(store): State<SessionStore>,
    jar: CookieJar,
    Json(credentials): Json<LoginRequest>,
) -> (StatusCode, CookieJar, Json<LoginResponse>) {
    match store.issue_session(&credentials).await {
        Ok(cookie) => (
            StatusCode::OK,
            jar.add(cookie),
            Json(LoginResponse {
                success: true,
                error: None,
            }),
        ),
        Err(e) => {
            let status = match &e {
                AuthError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                jar,
                Json(LoginResponse {
                    success: false,
                    error: Some(e.user_message().to_string()),
                }),
            )
        }
    }
}

/// logout
///
/// [Public Route] Removes the session cookie and returns to the login page.
#[utoipa::path(
    post,
    path = "/admin/api/auth/logout",
    responses((status = 303, description = "Redirect to login"))
)]
pub async fn logout(State(store): State<SessionStore>, jar: CookieJar) -> (CookieJar, Redirect) {
    (store.destroy_session(jar), Redirect::to(LOGIN_PATH))
}

/// get_session
///
/// [Public Route] The caller's session as seen by the server.
#[utoipa::path(
    get,
    path = "/admin/api/auth/session",
    responses((status = 200, description = "Current session", body = SessionView))
)]
pub async fn get_session(CurrentSession(session): CurrentSession) -> Json<SessionView> {
    Json(session.view())
}

// --- Admin Shell ---

async fn collect_stats(repo: &dyn Repository) -> Result<DashboardStats, PersistenceError> {
    Ok(DashboardStats {
        articles: repo.list_all(EntityKind::Articles).await?.len(),
        advertisements: repo.list_all(EntityKind::Advertisements).await?.len(),
        gadgets: repo.list_all(EntityKind::Gadgets).await?.len(),
        users: repo.list_all(EntityKind::Users).await?.len(),
        roles: repo.list_all(EntityKind::Roles).await?.len(),
    })
}

/// admin_shell
///
/// [Admin Route] Server-rendered navigation. The dashboard panel is only
/// filled for sessions holding `view_admin_dashboard`.
pub async fn admin_shell(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
) -> Result<Html<String>, StatusCode> {
    let dashboard = if has_permission(Some(&session), Permission::ViewAdminDashboard) {
        Some(
            collect_stats(state.repo.as_ref())
                .await
                .map_err(|e| persistence_status("dashboard", e))?,
        )
    } else {
        None
    };

    let view = session.view();
    let page = AdminShellTemplate {
        username: view.username.unwrap_or_default(),
        is_env_admin: view.is_env_admin,
        links: navigation::visible_items(&session),
        dashboard,
    };
    page.render().map(Html).map_err(|e| {
        tracing::error!("admin shell render failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// get_navigation
///
/// [Admin Route] Navigation entries visible to the caller.
#[utoipa::path(
    get,
    path = "/admin/api/navigation",
    responses((status = 200, description = "Visible navigation", body = [NavLink]))
)]
pub async fn get_navigation(CurrentSession(session): CurrentSession) -> Json<Vec<NavLink>> {
    Json(navigation::visible_items(&session))
}

/// get_dashboard_stats
///
/// [Admin Route] Collection sizes for the dashboard.
#[utoipa::path(
    get,
    path = "/admin/api/dashboard",
    responses((status = 200, description = "Stats", body = DashboardStats))
)]
pub async fn get_dashboard_stats(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, StatusCode> {
    require_permission(&session, Permission::ViewAdminDashboard)?;
    collect_stats(state.repo.as_ref())
        .await
        .map(Json)
        .map_err(|e| persistence_status("dashboard", e))
}

// --- Roles ---

/// Validates permission strings against the closed set and de-duplicates them.
fn normalize_permissions(raw: Vec<String>) -> Result<Vec<String>, StatusCode> {
    let mut set = BTreeSet::new();
    for p in raw {
        let permission: Permission = p.parse().map_err(|e| {
            tracing::debug!("rejecting role payload: {e}");
            StatusCode::UNPROCESSABLE_ENTITY
        })?;
        set.insert(permission);
    }
    Ok(set.into_iter().map(|p| p.as_str().to_string()).collect())
}

fn required_name(name: &str) -> Result<String, StatusCode> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    Ok(trimmed.to_string())
}

/// list_roles
///
/// [Admin Route] All roles. Requires `manage_roles`.
#[utoipa::path(
    get,
    path = "/admin/api/roles",
    responses((status = 200, description = "Roles", body = [Role]))
)]
pub async fn list_roles(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Role>>, StatusCode> {
    require_permission(&session, Permission::ManageRoles)?;
    repository::fetch_all::<Role>(state.repo.as_ref())
        .await
        .map(Json)
        .map_err(|e| persistence_status("list_roles", e))
}

#[utoipa::path(
    get,
    path = "/admin/api/roles/{id}",
    params(("id" = String, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Found", body = Role),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_role(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Role>, StatusCode> {
    require_permission(&session, Permission::ManageRoles)?;
    repository::fetch::<Role>(state.repo.as_ref(), &id)
        .await
        .map_err(|e| persistence_status("get_role", e))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// create_role
///
/// [Admin Route] Unknown permission strings are rejected with 422; a
/// duplicate name with 409.
#[utoipa::path(
    post,
    path = "/admin/api/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Created", body = Role),
        (status = 409, description = "Name taken"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_role(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), StatusCode> {
    require_permission(&session, Permission::ManageRoles)?;
    let repo = state.repo.as_ref();

    let role = Role {
        id: String::new(),
        name: required_name(&payload.name)?,
        description: payload.description,
        permissions: normalize_permissions(payload.permissions)?,
    };

    if repository::find_by::<Role>(repo, "name", &role.name)
        .await
        .map_err(|e| persistence_status("create_role", e))?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    let details = format!("name={} permissions={}", role.name, role.permissions.join(","));
    let created = repository::insert_audited(repo, &role, audit(&session, "create_role", details))
        .await
        .map_err(|e| persistence_status("create_role", e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/admin/api/roles/{id}",
    request_body = UpdateRoleRequest,
    params(("id" = String, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Updated", body = Role),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Name taken"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn update_role(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, StatusCode> {
    require_permission(&session, Permission::ManageRoles)?;
    let repo = state.repo.as_ref();

    let mut patch = Map::new();
    if let Some(name) = payload.name {
        let name = required_name(&name)?;
        let holder = repository::find_by::<Role>(repo, "name", &name)
            .await
            .map_err(|e| persistence_status("update_role", e))?;
        if holder.is_some_and(|r| r.id != id) {
            return Err(StatusCode::CONFLICT);
        }
        patch.insert("name".to_string(), Value::String(name));
    }
    if let Some(description) = payload.description {
        patch.insert("description".to_string(), Value::String(description));
    }
    if let Some(permissions) = payload.permissions {
        let permissions = normalize_permissions(permissions)?;
        patch.insert(
            "permissions".to_string(),
            Value::Array(permissions.into_iter().map(Value::String).collect()),
        );
    }

    let details = format!("fields={}", patch.keys().cloned().collect::<Vec<_>>().join(","));
    let updated = repo
        .update_audited(EntityKind::Roles, &id, patch, audit(&session, "update_role", details))
        .await
        .map_err(|e| persistence_status("update_role", e))?
        .ok_or(StatusCode::NOT_FOUND)?;
    let role: Role =
        repository::decode(updated).map_err(|e| persistence_status("update_role", e))?;

    Ok(Json(role))
}

/// delete_role
///
/// [Admin Route] Users that still reference the role keep the dangling id;
/// it simply stops granting anything.
#[utoipa::path(
    delete,
    path = "/admin/api/roles/{id}",
    params(("id" = String, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_role(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    require_permission(&session, Permission::ManageRoles)?;
    let repo = state.repo.as_ref();

    if !repo
        .delete_audited(EntityKind::Roles, &id, audit(&session, "delete_role", ""))
        .await
        .map_err(|e| persistence_status("delete_role", e))?
    {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Users ---

fn validate_password(password: &str) -> Result<(), StatusCode> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    Ok(())
}

/// Every referenced role id must resolve at write time. Roles deleted later
/// are tolerated on read.
async fn validate_role_ids(repo: &dyn Repository, roles: Vec<String>) -> Result<Vec<String>, StatusCode> {
    let unique: BTreeSet<String> = roles.into_iter().collect();
    for id in &unique {
        let exists = repo
            .get_by_id(EntityKind::Roles, id)
            .await
            .map_err(|e| persistence_status("validate_role_ids", e))?
            .is_some();
        if !exists {
            tracing::debug!(role_id = %id, "rejecting user payload with unknown role");
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
    }
    Ok(unique.into_iter().collect())
}

fn hash_or_500(password: &str) -> Result<String, StatusCode> {
    auth::hash_password(password).map_err(|e| {
        tracing::error!("password hashing failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

#[utoipa::path(
    get,
    path = "/admin/api/users",
    responses((status = 200, description = "Users", body = [UserProfile]))
)]
pub async fn list_users(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, StatusCode> {
    require_permission(&session, Permission::ManageUsers)?;
    let users = repository::fetch_all::<User>(state.repo.as_ref())
        .await
        .map_err(|e| persistence_status("list_users", e))?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/api/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, StatusCode> {
    require_permission(&session, Permission::ManageUsers)?;
    repository::fetch::<User>(state.repo.as_ref(), &id)
        .await
        .map_err(|e| persistence_status("get_user", e))?
        .map(|user| Json(UserProfile::from(user)))
        .ok_or(StatusCode::NOT_FOUND)
}

/// create_user
///
/// [Admin Route] Hashes the password with Argon2id before storage.
#[utoipa::path(
    post,
    path = "/admin/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = UserProfile),
        (status = 409, description = "Username taken"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_user(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), StatusCode> {
    require_permission(&session, Permission::ManageUsers)?;
    let repo = state.repo.as_ref();

    let username = required_name(&payload.username)?;
    validate_password(&payload.password)?;
    let roles = validate_role_ids(repo, payload.roles).await?;

    if repository::find_by::<User>(repo, "username", &username)
        .await
        .map_err(|e| persistence_status("create_user", e))?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    let user = User {
        id: String::new(),
        username,
        email: payload.email,
        password_hash: hash_or_500(&payload.password)?,
        roles,
        is_active: payload.is_active.unwrap_or(true),
    };
    let details = format!("username={} roles={}", user.username, user.roles.join(","));
    let created = repository::insert_audited(repo, &user, audit(&session, "create_user", details))
        .await
        .map_err(|e| persistence_status("create_user", e))?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    put,
    path = "/admin/api/users/{id}",
    request_body = UpdateUserRequest,
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn update_user(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>, StatusCode> {
    require_permission(&session, Permission::ManageUsers)?;
    let repo = state.repo.as_ref();

    let mut patch = Map::new();
    if let Some(email) = payload.email {
        patch.insert("email".to_string(), Value::String(email));
    }
    if let Some(password) = payload.password {
        validate_password(&password)?;
        patch.insert("passwordHash".to_string(), Value::String(hash_or_500(&password)?));
    }
    if let Some(roles) = payload.roles {
        let roles = validate_role_ids(repo, roles).await?;
        patch.insert(
            "roles".to_string(),
            Value::Array(roles.into_iter().map(Value::String).collect()),
        );
    }
    if let Some(is_active) = payload.is_active {
        patch.insert("isActive".to_string(), Value::Bool(is_active));
    }

    // Logged by field name only; the hash never reaches the audit trail.
    let details = format!("fields={}", patch.keys().cloned().collect::<Vec<_>>().join(","));
    let updated = repo
        .update_audited(EntityKind::Users, &id, patch, audit(&session, "update_user", details))
        .await
        .map_err(|e| persistence_status("update_user", e))?
        .ok_or(StatusCode::NOT_FOUND)?;
    let user: User =
        repository::decode(updated).map_err(|e| persistence_status("update_user", e))?;

    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/admin/api/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    require_permission(&session, Permission::ManageUsers)?;
    let repo = state.repo.as_ref();

    if !repo
        .delete_audited(EntityKind::Users, &id, audit(&session, "delete_user", ""))
        .await
        .map_err(|e| persistence_status("delete_user", e))?
    {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Content Collections ---

/// Resolves a content collection segment and checks its permission.
fn content_kind(session: &UserSession, collection: &str) -> Result<EntityKind, StatusCode> {
    let kind = EntityKind::from_content_segment(collection).ok_or(StatusCode::NOT_FOUND)?;
    require_permission(session, kind.required_permission())?;
    Ok(kind)
}

/// Whether an article body would publish the article. Setting `publishedAt`
/// or a `published` status counts.
fn publishes(body: &Map<String, Value>) -> bool {
    body.contains_key("publishedAt")
        || body.get("status").and_then(Value::as_str) == Some("published")
}

/// Publishing through the generic write paths needs `publish_articles` on
/// top of `manage_articles`.
fn guard_publication(
    session: &UserSession,
    kind: EntityKind,
    body: &Map<String, Value>,
) -> Result<(), StatusCode> {
    if kind == EntityKind::Articles && publishes(body) {
        require_permission(session, Permission::PublishArticles)?;
    }
    Ok(())
}

/// list_documents
///
/// [Admin Route] Raw documents of a content collection (articles,
/// advertisements, gadgets, seo_settings).
pub async fn list_documents(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Document>>, StatusCode> {
    let kind = content_kind(&session, &collection)?;
    state
        .repo
        .list_all(kind)
        .await
        .map(Json)
        .map_err(|e| persistence_status("list_documents", e))
}

pub async fn get_document(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Document>, StatusCode> {
    let kind = content_kind(&session, &collection)?;
    state
        .repo
        .get_by_id(kind, &id)
        .await
        .map_err(|e| persistence_status("get_document", e))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn create_document(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Document>), StatusCode> {
    let kind = content_kind(&session, &collection)?;
    let repo = state.repo.as_ref();

    let data = into_object(body)?;
    guard_publication(&session, kind, &data)?;

    let created = repo
        .create_audited(kind, data, audit(&session, "create", ""))
        .await
        .map_err(|e| persistence_status("create_document", e))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_document(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Document>, StatusCode> {
    let kind = content_kind(&session, &collection)?;
    let repo = state.repo.as_ref();

    let patch = into_object(body)?;
    guard_publication(&session, kind, &patch)?;

    let details = format!("fields={}", patch.keys().cloned().collect::<Vec<_>>().join(","));
    let updated = repo
        .update_audited(kind, &id, patch, audit(&session, "update", details))
        .await
        .map_err(|e| persistence_status("update_document", e))?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(updated))
}

pub async fn delete_document(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    let kind = content_kind(&session, &collection)?;
    let repo = state.repo.as_ref();

    if !repo
        .delete_audited(kind, &id, audit(&session, "delete", ""))
        .await
        .map_err(|e| persistence_status("delete_document", e))?
    {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// publish_article
///
/// [Admin Route] Marks an article published. Requires `publish_articles`,
/// which is separate from `manage_articles`.
pub async fn publish_article(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Document>, StatusCode> {
    if EntityKind::from_content_segment(&collection) != Some(EntityKind::Articles) {
        return Err(StatusCode::NOT_FOUND);
    }
    require_permission(&session, Permission::PublishArticles)?;
    let repo = state.repo.as_ref();

    let mut patch = Map::new();
    patch.insert("status".to_string(), Value::String("published".to_string()));
    patch.insert(
        "publishedAt".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );

    let updated = repo
        .update_audited(EntityKind::Articles, &id, patch, audit(&session, "publish", ""))
        .await
        .map_err(|e| persistence_status("publish_article", e))?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(updated))
}

// --- Activity Log ---

#[utoipa::path(
    get,
    path = "/admin/api/activity",
    params(ActivityFilter),
    responses((status = 200, description = "Most recent first", body = [ActivityLogEntry]))
)]
pub async fn list_activity(
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<Vec<ActivityLogEntry>>, StatusCode> {
    require_permission(&session, Permission::ManageSettings)?;
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    state
        .repo
        .list_activity(limit)
        .await
        .map(Json)
        .map_err(|e| persistence_status("list_activity", e))
}
