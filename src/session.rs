use crate::{
    auth::{self, Claims},
    config::AppConfig,
    models::{LoginRequest, Permission, SessionView, User},
    policy,
    repository::{self, PersistenceError, RepositoryState},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::collections::BTreeSet;

/// Name of the cookie carrying the admin session.
pub const SESSION_COOKIE: &str = "admin_session";
/// Cookie value marking an environment super-admin session.
///
/// This is a fixed value, not a per-session secret: anyone who learns it can
/// forge the cookie. Kept for compatibility with existing deployments.
pub const ENV_ADMIN_SENTINEL: &str = "env-admin-authenticated";
/// One week.
pub const SESSION_MAX_AGE_SECS: i64 = 604_800;
/// Actor id recorded in the activity log for the environment super-admin.
pub const ENV_ADMIN_USER_ID: &str = "env-admin";

/// UserSession
///
/// Per-request trust object. Built from the request cookie on every request
/// that needs it and dropped afterwards; never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UserSession {
    #[default]
    Anonymous,
    /// Break-glass identity from process configuration. Holds every permission.
    EnvAdmin { username: String },
    /// A stored `User`, with permissions resolved from its roles.
    User {
        user_id: String,
        username: String,
        roles: Vec<String>,
        permissions: BTreeSet<Permission>,
    },
}

impl UserSession {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, UserSession::Anonymous)
    }

    pub fn is_env_admin(&self) -> bool {
        matches!(self, UserSession::EnvAdmin { .. })
    }

    /// `(user_id, username)` for audit records. `None` when anonymous.
    pub fn actor(&self) -> Option<(String, String)> {
        match self {
            UserSession::Anonymous => None,
            UserSession::EnvAdmin { username } => {
                Some((ENV_ADMIN_USER_ID.to_string(), username.clone()))
            }
            UserSession::User {
                user_id, username, ..
            } => Some((user_id.clone(), username.clone())),
        }
    }

    pub fn view(&self) -> SessionView {
        match self {
            UserSession::Anonymous => SessionView::default(),
            UserSession::EnvAdmin { username } => SessionView {
                is_authenticated: true,
                is_env_admin: true,
                user_id: None,
                username: Some(username.clone()),
                roles: vec![],
                permissions: Permission::ALL.to_vec(),
            },
            UserSession::User {
                user_id,
                username,
                roles,
                permissions,
            } => SessionView {
                is_authenticated: true,
                is_env_admin: false,
                user_id: Some(user_id.clone()),
                username: Some(username.clone()),
                roles: roles.clone(),
                permissions: permissions.iter().copied().collect(),
            },
        }
    }
}

/// AuthError
///
/// Failures of `issue_session`. `Display` is for logs; users only ever see
/// `user_message`, which never says which credential was wrong.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("admin credentials are not configured")]
    NotConfigured,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session storage failure: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed")]
    PasswordHash,
}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::NotConfigured => "Admin login is not configured on this server.",
            AuthError::InvalidCredentials => "Invalid username or password.",
            AuthError::Persistence(_) | AuthError::Token(_) | AuthError::PasswordHash => {
                "Login is temporarily unavailable. Please try again."
            }
        }
    }
}

/// SessionStore
///
/// Turns credentials into a session cookie and a request cookie back into a
/// `UserSession`. Cookie mutation is its only side effect.
///
/// Two identity paths exist:
/// - the environment super-admin (always on when configured), whose cookie is
///   the fixed `ENV_ADMIN_SENTINEL`;
/// - stored users, behind `AppConfig::user_login_enabled`. Their cookie is a
///   signed token naming the user id; roles are re-read on every request so a
///   role change or deactivation applies immediately.
#[derive(Clone)]
pub struct SessionStore {
    config: AppConfig,
    repo: RepositoryState,
}

impl SessionStore {
    pub fn new(config: AppConfig, repo: RepositoryState) -> Self {
        Self { config, repo }
    }

    /// issue_session
    ///
    /// Validates credentials and returns the cookie to set. Fails closed with
    /// `NotConfigured` when no login path can work at all.
    pub async fn issue_session(&self, credentials: &LoginRequest) -> Result<Cookie<'static>, AuthError> {
        if !self.config.admin_configured() && !self.config.user_login_enabled {
            tracing::error!("login attempted but ADMIN_USERNAME / ADMIN_PASSWORD are not configured");
            return Err(AuthError::NotConfigured);
        }

        if let (Some(username), Some(password)) =
            (&self.config.admin_username, &self.config.admin_password)
        {
            // Both halves are always compared so timing does not reveal which one failed.
            let username_matches = auth::constant_time_compare(&credentials.username, username);
            let password_matches = auth::constant_time_compare(&credentials.password, password);
            if username_matches & password_matches {
                tracing::info!(%username, "environment admin signed in");
                return Ok(self.session_cookie(ENV_ADMIN_SENTINEL.to_string()));
            }
        }

        if self.config.user_login_enabled {
            if let Some(user) = self.verify_user(credentials).await? {
                let token = auth::issue_user_token(&user.id, &self.config.session_secret)?;
                tracing::info!(user_id = %user.id, username = %user.username, "user signed in");
                return Ok(self.session_cookie(token));
            }
        }

        tracing::warn!(username = %credentials.username, "rejected login attempt");
        Err(AuthError::InvalidCredentials)
    }

    /// destroy_session
    ///
    /// Returns the jar with a removal cookie for the session (same name and path).
    pub fn destroy_session(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
    }

    /// get_session
    ///
    /// Resolves the request cookie. Anything unrecognised, and any storage
    /// failure while resolving a user, yields `Anonymous`.
    pub async fn get_session(&self, jar: &CookieJar) -> UserSession {
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return UserSession::Anonymous;
        };
        let value = cookie.value();

        if value == ENV_ADMIN_SENTINEL {
            return match (&self.config.admin_username, self.config.admin_configured()) {
                (Some(username), true) => UserSession::EnvAdmin {
                    username: username.clone(),
                },
                _ => UserSession::Anonymous,
            };
        }

        if !self.config.user_login_enabled {
            return UserSession::Anonymous;
        }

        match auth::decode_user_token(value, &self.config.session_secret) {
            Ok(claims) => self.resolve_user(&claims).await,
            Err(e) => {
                tracing::debug!("ignoring invalid session token: {e}");
                UserSession::Anonymous
            }
        }
    }

    fn session_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .secure(self.config.is_production())
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(SESSION_MAX_AGE_SECS))
            .path("/")
            .build()
    }

    /// Per-user credential check. `Ok(None)` covers unknown user, inactive
    /// user and wrong password alike, and all three run one Argon2 verify.
    async fn verify_user(
        &self,
        credentials: &LoginRequest,
    ) -> Result<Option<User>, AuthError> {
        let user =
            repository::find_by::<User>(self.repo.as_ref(), "username", &credentials.username)
                .await?;
        let verified = auth::verify_stored_password(
            &credentials.password,
            user.as_ref().map(|u| u.password_hash.as_str()),
        );
        Ok(user.filter(|u| verified && u.is_active))
    }

    async fn resolve_user(&self, claims: &Claims) -> UserSession {
        let user = match repository::fetch::<User>(self.repo.as_ref(), &claims.sub).await {
            Ok(Some(user)) if user.is_active => user,
            Ok(_) => return UserSession::Anonymous,
            Err(e) => {
                tracing::error!(user_id = %claims.sub, "session user lookup failed: {e}");
                return UserSession::Anonymous;
            }
        };

        match policy::resolve_role_ids(self.repo.as_ref(), &user.roles).await {
            Ok(permissions) => UserSession::User {
                user_id: user.id,
                username: user.username,
                roles: user.roles,
                permissions,
            },
            Err(e) => {
                tracing::error!(user_id = %user.id, "role resolution failed: {e}");
                UserSession::Anonymous
            }
        }
    }
}
