use std::{env, fmt};

/// AppConfig
///
/// Holds the service's configuration. Immutable once loaded and pulled into
/// handlers through `FromRef`, like every other part of `AppState`.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Controls the `Secure` cookie flag and log format.
    pub env: Env,
    // Postgres connection string. `None` selects the in-memory repository (local only).
    pub db_url: Option<String>,
    // Environment super-admin username. Login fails closed when unset.
    pub admin_username: Option<String>,
    // Environment super-admin password. Never logged or printed.
    pub admin_password: Option<String>,
    // HMAC secret for per-user session tokens.
    pub session_secret: String,
    // Enables the per-user login path (stored `User` documents).
    pub user_login_enabled: bool,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
}

/// Env
///
/// Runtime context. Production hardens cookies and demands explicit secrets.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_SESSION_SECRET: &str = "local-development-session-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("db_url", &self.db_url.as_ref().map(|_| "<set>"))
            .field("admin_username", &self.admin_username)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .field("session_secret", &"<redacted>")
            .field("user_login_enabled", &self.user_login_enabled)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl Default for AppConfig {
    /// Safe, non-panicking values for tests. Admin credentials are set so the
    /// login path is usable without touching the process environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            admin_username: Some("admin".to_string()),
            admin_password: Some("change-me".to_string()),
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            user_login_enabled: false,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables at startup.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL` or `SESSION_SECRET` is missing.
    /// Missing admin credentials are not fatal: the login feature alone fails closed.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (db_url, session_secret) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
                env::var("SESSION_SECRET").expect("FATAL: SESSION_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
                env::var("SESSION_SECRET").unwrap_or_else(|_| LOCAL_SESSION_SECRET.to_string()),
            ),
        };

        let user_login_enabled = env::var("ENABLE_USER_LOGIN")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            env,
            db_url,
            admin_username: non_empty_var("ADMIN_USERNAME"),
            admin_password: non_empty_var("ADMIN_PASSWORD"),
            session_secret,
            user_login_enabled,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        }
    }

    /// True when both halves of the environment super-admin pair are present.
    pub fn admin_configured(&self) -> bool {
        self.admin_username.is_some() && self.admin_password.is_some()
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
