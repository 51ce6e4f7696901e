use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::LazyLock};

use crate::{
    models::Permission,
    policy::has_permission,
    session::{AuthError, SESSION_MAX_AGE_SECS, SessionStore, UserSession},
};

/// Claims
///
/// Payload of a per-user session token (the cookie value on the stored-user
/// login path). Signed with `AppConfig::session_secret`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the stored `User` id.
    pub sub: String,
    /// Expiration time. Matches the cookie's one-week max-age.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

pub fn issue_user_token(user_id: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + SESSION_MAX_AGE_SECS as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_user_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored PHC hash. Unparseable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Stand-in hash for logins that name no stored user.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("no-such-user").unwrap_or_default());

/// Verify a password against an optional stored hash.
///
/// Without a hash the password is still run through Argon2 against a dummy
/// hash, so a login for an unknown username costs the same as a wrong
/// password. The result is always `false` in that case.
pub fn verify_stored_password(password: &str, hash: Option<&str>) -> bool {
    match hash {
        Some(hash) => verify_password(password, hash),
        None => {
            verify_password(password, &DUMMY_HASH);
            false
        }
    }
}

/// Constant-time string comparison for configured credentials.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// CurrentSession Extractor
///
/// Gives handlers the request's `UserSession`. The route gate stores the
/// session it resolved in the request extensions; when a handler runs
/// without the gate (tests, public routes) the cookie is resolved here.
///
/// Never rejects: an absent or invalid cookie is simply `Anonymous`.
pub struct CurrentSession(pub UserSession);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<UserSession>() {
            return Ok(Self(session.clone()));
        }

        let store = SessionStore::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Self(store.get_session(&jar).await))
    }
}

/// require_permission
///
/// Server-action check, independent of navigation and of the gate.
/// `401` when there is no session at all, `403` when the permission is missing.
pub fn require_permission(session: &UserSession, permission: Permission) -> Result<(), StatusCode> {
    if has_permission(Some(session), permission) {
        return Ok(());
    }
    if !session.is_authenticated() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    tracing::warn!(%permission, actor = ?session.actor(), "permission denied");
    Err(StatusCode::FORBIDDEN)
}
