use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Everything under `/admin` that needs a session. The route gate rejects
/// anonymous requests before they reach these handlers and applies its
/// per-route permission table; each handler then checks its own permission
/// again, so a missing gate entry never opens a route.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Server-rendered shell with permission-filtered navigation.
        .route("/admin", get(handlers::admin_shell))
        .route("/admin/api/navigation", get(handlers::get_navigation))
        .route("/admin/api/dashboard", get(handlers::get_dashboard_stats))
        // --- Roles (manage_roles) ---
        .route(
            "/admin/api/roles",
            get(handlers::list_roles).post(handlers::create_role),
        )
        .route(
            "/admin/api/roles/{id}",
            get(handlers::get_role)
                .put(handlers::update_role)
                .delete(handlers::delete_role),
        )
        // --- Users (manage_users) ---
        .route(
            "/admin/api/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/admin/api/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // --- Content collections ---
        // articles (manage_articles), advertisements and gadgets
        // (manage_layout_gadgets), seo_settings (manage_seo_global).
        .route(
            "/admin/api/content/{collection}",
            get(handlers::list_documents).post(handlers::create_document),
        )
        .route(
            "/admin/api/content/{collection}/{id}",
            get(handlers::get_document)
                .put(handlers::update_document)
                .delete(handlers::delete_document),
        )
        // POST /admin/api/content/articles/{id}/publish (publish_articles)
        .route(
            "/admin/api/content/{collection}/{id}/publish",
            post(handlers::publish_article),
        )
        // --- Audit trail (manage_settings) ---
        .route("/admin/api/activity", get(handlers::list_activity))
}
