use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod navigation;
pub mod policy;
pub mod repository;
pub mod session;

// Router segregation (public, auth entry points, gated admin).
pub mod routes;
use routes::{admin, auth as auth_routes, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use session::{SessionStore, UserSession};

/// ApiDoc
///
/// OpenAPI document for the JSON admin API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::logout, handlers::get_session,
        handlers::get_navigation, handlers::get_dashboard_stats,
        handlers::list_roles, handlers::get_role, handlers::create_role,
        handlers::update_role, handlers::delete_role,
        handlers::list_users, handlers::get_user, handlers::create_user,
        handlers::update_user, handlers::delete_user,
        handlers::list_activity
    ),
    components(
        schemas(
            models::Permission, models::Role, models::UserProfile, models::ActivityLogEntry,
            models::LoginRequest, models::LoginResponse, models::SessionView, models::NavLink,
            models::CreateRoleRequest, models::UpdateRoleRequest,
            models::CreateUserRequest, models::UpdateUserRequest, models::DashboardStats,
        )
    ),
    tags(
        (name = "newsroom-admin", description = "Newsroom admin access-control API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared state: persistence gateway, configuration and the
/// session store built on top of both.
#[derive(Clone)]
pub struct AppState {
    /// Persistence Gateway. One process-wide instance.
    pub repo: RepositoryState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
    /// Cookie ↔ session resolution.
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig, repo: RepositoryState) -> Self {
        let sessions = SessionStore::new(config.clone(), repo.clone());
        Self {
            repo,
            config,
            sessions,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(app_state: &AppState) -> SessionStore {
        app_state.sessions.clone()
    }
}

/// create_router
///
/// Assembles all routes, wraps them in the route gate and the observability
/// layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(auth_routes::auth_routes())
        .merge(admin::admin_routes())
        // The gate wraps the whole router (fallback included) so unknown
        // admin paths are gated exactly like known ones.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::route_gate,
        ))
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(
                x_request_id.clone(),
                MakeRequestUuid,
            ))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Span for each request, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
