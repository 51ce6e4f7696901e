//! Route gate: the middleware that stands in front of everything under
//! `/admin`.
//!
//! Each request path is classified as `Passthrough` or `RequireSession`.
//! A session-requiring request without an authenticated session is redirected
//! to the login page; one whose session lacks the route's permission gets 403.
//! Handlers still check their own permission (`auth::require_permission`).

use axum::{
    extract::{Request, State},
    http::{StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    models::{EntityKind, Permission},
    policy::has_permission,
    session::SessionStore,
};

pub const ADMIN_ROOT: &str = "/admin";
pub const LOGIN_PATH: &str = "/admin/login";
pub const PUBLIC_AUTH_API_PREFIX: &str = "/admin/api/auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Passthrough,
    RequireSession { permission: Option<Permission> },
}

/// True when `path` is `root` itself or lies below it (segment boundary).
fn is_under(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn classify(path: &str) -> GateState {
    if !is_under(path, ADMIN_ROOT) {
        return GateState::Passthrough;
    }
    if path == LOGIN_PATH || is_under(path, PUBLIC_AUTH_API_PREFIX) {
        return GateState::Passthrough;
    }
    GateState::RequireSession {
        permission: required_permission(path),
    }
}

/// Per-route permission table. `None` means any authenticated session.
pub fn required_permission(path: &str) -> Option<Permission> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["admin", "api", "dashboard", ..] => Some(Permission::ViewAdminDashboard),
        ["admin", "api", "roles", ..] => Some(Permission::ManageRoles),
        ["admin", "api", "users", ..] => Some(Permission::ManageUsers),
        ["admin", "api", "activity", ..] => Some(Permission::ManageSettings),
        ["admin", "api", "content", "articles", _, "publish"] => Some(Permission::PublishArticles),
        ["admin", "api", "content", collection, ..] => {
            EntityKind::from_content_segment(collection).map(|kind| kind.required_permission())
        }
        _ => None,
    }
}

/// Login URL carrying the originally requested location.
pub fn login_redirect_target(uri: &Uri) -> String {
    let original = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(ADMIN_ROOT);
    format!("{LOGIN_PATH}?next={}", urlencoding::encode(original))
}

/// route_gate
///
/// Runs before routing for every request. On success the resolved
/// `UserSession` is placed in the request extensions for `CurrentSession`.
pub async fn route_gate(
    State(store): State<SessionStore>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let GateState::RequireSession { permission } = classify(request.uri().path()) else {
        return next.run(request).await;
    };

    let session = store.get_session(&jar).await;
    if !session.is_authenticated() {
        tracing::debug!(path = %request.uri().path(), "no session, redirecting to login");
        return Redirect::to(&login_redirect_target(request.uri())).into_response();
    }

    if let Some(permission) = permission {
        if !has_permission(Some(&session), permission) {
            tracing::warn!(
                path = %request.uri().path(),
                %permission,
                actor = ?session.actor(),
                "route denied"
            );
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    request.extensions_mut().insert(session);
    next.run(request).await
}
