use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Auth Router Module
///
/// The login entry point and the public auth API. These live under the admin
/// root but are exempt from the route gate, otherwise nobody could sign in.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/login renders the form; POST handles its submission.
        .route(
            "/admin/login",
            get(handlers::login_page).post(handlers::login_form),
        )
        // POST /admin/api/auth/login
        // JSON variant returning `{success, error?}`.
        .route("/admin/api/auth/login", post(handlers::login))
        // GET|POST /admin/api/auth/logout
        // Clears the cookie and redirects to the login page.
        .route(
            "/admin/api/auth/logout",
            get(handlers::logout).post(handlers::logout),
        )
        // GET /admin/api/auth/session
        // The caller's session projection (anonymous when not signed in).
        .route("/admin/api/auth/session", get(handlers::get_session))
}
