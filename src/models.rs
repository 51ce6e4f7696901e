use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Permissions ---

/// Permission
///
/// Closed set of capability tags. Roles reference these by their snake_case
/// name; nothing stores a permission on its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Permission {
    ViewAdminDashboard,
    ManageArticles,
    PublishArticles,
    ManageUsers,
    ManageRoles,
    ManageLayoutGadgets,
    ManageSeoGlobal,
    ManageSettings,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::ViewAdminDashboard,
        Permission::ManageArticles,
        Permission::PublishArticles,
        Permission::ManageUsers,
        Permission::ManageRoles,
        Permission::ManageLayoutGadgets,
        Permission::ManageSeoGlobal,
        Permission::ManageSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewAdminDashboard => "view_admin_dashboard",
            Permission::ManageArticles => "manage_articles",
            Permission::PublishArticles => "publish_articles",
            Permission::ManageUsers => "manage_users",
            Permission::ManageRoles => "manage_roles",
            Permission::ManageLayoutGadgets => "manage_layout_gadgets",
            Permission::ManageSeoGlobal => "manage_seo_global",
            Permission::ManageSettings => "manage_settings",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known permission tags.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

// --- Collections ---

/// EntityKind
///
/// One collection per entity. The activity log lives in its own append-only
/// store and is deliberately not a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Articles,
    Advertisements,
    Gadgets,
    Users,
    Roles,
    SeoSettings,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Articles => "articles",
            EntityKind::Advertisements => "advertisements",
            EntityKind::Gadgets => "gadgets",
            EntityKind::Users => "users",
            EntityKind::Roles => "roles",
            EntityKind::SeoSettings => "seo_settings",
        }
    }

    /// Kinds served by the generic content API. Users and roles have typed endpoints.
    pub fn from_content_segment(segment: &str) -> Option<Self> {
        match segment {
            "articles" => Some(EntityKind::Articles),
            "advertisements" => Some(EntityKind::Advertisements),
            "gadgets" => Some(EntityKind::Gadgets),
            "seo_settings" => Some(EntityKind::SeoSettings),
            _ => None,
        }
    }

    /// Permission a caller needs to touch this collection.
    pub fn required_permission(&self) -> Permission {
        match self {
            EntityKind::Articles => Permission::ManageArticles,
            EntityKind::Advertisements | EntityKind::Gadgets => Permission::ManageLayoutGadgets,
            EntityKind::Users => Permission::ManageUsers,
            EntityKind::Roles => Permission::ManageRoles,
            EntityKind::SeoSettings => Permission::ManageSeoGlobal,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document
///
/// A stored record as the gateway sees it: an opaque string id plus a JSON
/// object body. Typed records are decoded from this by the repository helpers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Core Records ---

/// Role
///
/// A named set of permissions. Stored permissions are plain strings: entries
/// that are not known tags are skipped when granting, never rejected on read.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Role {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Role {
    /// Known permissions this role grants.
    pub fn granted(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().filter_map(|raw| match raw.parse() {
            Ok(p) => Some(p),
            Err(_) => {
                tracing::warn!(role_id = %self.id, permission = %raw, "ignoring unknown permission on role");
                None
            }
        })
    }
}

/// User
///
/// A stored admin account. `password_hash` is an Argon2id PHC string and must
/// never leave the service; API responses use `UserProfile`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password_hash: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// UserProfile
///
/// Public projection of a `User` (no credential material).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub is_active: bool,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            roles: user.roles,
            is_active: user.is_active,
        }
    }
}

/// ActivityLogEntry
///
/// Append-only audit record written by privileged mutations.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActivityLogEntry {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub details: String,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        (user_id, username): (String, String),
        action: &str,
        target_type: EntityKind,
        target_id: &str,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            username,
            action: action.to_string(),
            target_type: target_type.as_str().to_string(),
            target_id: target_id.to_string(),
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}

// --- Request Payloads ---

/// Credentials posted to the JSON login endpoint.
#[derive(Clone, Deserialize, Serialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Form fields posted by the HTML login page.
#[derive(Clone, Deserialize, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl From<LoginForm> for LoginRequest {
    fn from(form: LoginForm) -> Self {
        Self {
            username: form.username,
            password: form.password,
        }
    }
}

/// LoginResponse
///
/// `{success:true}` or `{success:false, error}`. The error text never says
/// which credential was wrong.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRoleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

#[derive(Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

// --- Session & Navigation Schemas (Output) ---

/// SessionView
///
/// Flat projection of the per-request session, as consumed by the front end.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionView {
    pub is_authenticated: bool,
    pub is_env_admin: bool,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<Permission>,
}

/// A navigation entry the current session is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct NavLink {
    pub label: String,
    pub href: String,
}

/// DashboardStats
///
/// Collection sizes shown on the admin dashboard (GET /admin/api/dashboard).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct DashboardStats {
    pub articles: usize,
    pub advertisements: usize,
    pub gadgets: usize,
    pub users: usize,
    pub roles: usize,
}
