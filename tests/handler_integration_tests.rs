use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use newsroom_admin::{
    AppConfig, AppState,
    auth::CurrentSession,
    handlers::{self, ActivityFilter},
    models::{
        CreateRoleRequest, CreateUserRequest, EntityKind, Permission, Role, UpdateRoleRequest,
        UpdateUserRequest,
    },
    repository::MemoryRepository,
    session::UserSession,
};
use serde_json::json;
use std::{collections::BTreeSet, sync::Arc};

// --- Test Fixtures ---

fn state() -> AppState {
    AppState::new(AppConfig::default(), Arc::new(MemoryRepository::new()))
}

fn failing_state() -> AppState {
    AppState::new(AppConfig::default(), Arc::new(MemoryRepository::new_failing()))
}

fn env_admin() -> CurrentSession {
    CurrentSession(UserSession::EnvAdmin {
        username: "admin".to_string(),
    })
}

fn user_with(permissions: &[Permission]) -> CurrentSession {
    CurrentSession(UserSession::User {
        user_id: "user-1".to_string(),
        username: "staff".to_string(),
        roles: vec![],
        permissions: permissions.iter().copied().collect(),
    })
}

fn role_request(name: &str, permissions: &[&str]) -> CreateRoleRequest {
    CreateRoleRequest {
        name: name.to_string(),
        description: None,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
}

async fn create_role(state: &AppState, name: &str, permissions: &[&str]) -> Role {
    let (status, Json(role)) = handlers::create_role(
        env_admin(),
        State(state.clone()),
        Json(role_request(name, permissions)),
    )
    .await
    .expect("role creation should succeed");
    assert_eq!(status, StatusCode::CREATED);
    role
}

// --- Roles ---

#[tokio::test]
async fn role_create_then_get_round_trips() {
    let state = state();
    let created = create_role(&state, "Editor", &["manage_articles", "publish_articles"]).await;

    let Json(fetched) = handlers::get_role(env_admin(), State(state.clone()), Path(created.id.clone()))
        .await
        .unwrap();

    assert_eq!(fetched.name, "Editor");
    let expected: BTreeSet<String> = ["publish_articles", "manage_articles"]
        .into_iter()
        .map(String::from)
        .collect();
    let actual: BTreeSet<String> = fetched.permissions.into_iter().collect();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn role_with_unknown_permission_is_rejected() {
    let state = state();

    let result = handlers::create_role(
        env_admin(),
        State(state.clone()),
        Json(role_request("Rocketeer", &["manage_articles", "launch_rockets"])),
    )
    .await;

    assert_eq!(result.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(state.repo.list_all(EntityKind::Roles).await.unwrap().is_empty());
    assert!(state.repo.list_activity(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_role_name_conflicts() {
    let state = state();
    create_role(&state, "Editor", &[]).await;

    let result =
        handlers::create_role(env_admin(), State(state.clone()), Json(role_request("Editor", &[]))).await;

    assert_eq!(result.unwrap_err(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn role_update_keeps_unmentioned_fields() {
    let state = state();
    let created = create_role(&state, "Editor", &["manage_articles"]).await;

    let Json(updated) = handlers::update_role(
        env_admin(),
        State(state.clone()),
        Path(created.id.clone()),
        Json(UpdateRoleRequest {
            description: Some("Desk editors".to_string()),
            ..UpdateRoleRequest::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(updated.name, "Editor");
    assert_eq!(updated.description.as_deref(), Some("Desk editors"));
    assert_eq!(updated.permissions, vec!["manage_articles".to_string()]);
}

#[tokio::test]
async fn role_actions_require_manage_roles() {
    let state = state();

    let denied = handlers::list_roles(user_with(&[Permission::ManageUsers]), State(state.clone())).await;
    assert_eq!(denied.unwrap_err(), StatusCode::FORBIDDEN);

    let anonymous = handlers::create_role(
        CurrentSession(UserSession::Anonymous),
        State(state.clone()),
        Json(role_request("Editor", &[])),
    )
    .await;
    assert_eq!(anonymous.unwrap_err(), StatusCode::UNAUTHORIZED);

    assert!(
        handlers::list_roles(user_with(&[Permission::ManageRoles]), State(state))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn malformed_role_id_is_not_found() {
    let state = state();

    let result = handlers::get_role(env_admin(), State(state.clone()), Path("not-a-uuid".to_string())).await;
    assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);

    let result = handlers::delete_role(env_admin(), State(state), Path("../../etc".to_string())).await;
    assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
}

// --- Users ---

fn user_request(username: &str, roles: Vec<String>) -> CreateUserRequest {
    CreateUserRequest {
        username: username.to_string(),
        email: Some(format!("{username}@newsroom.test")),
        password: "long-enough-password".to_string(),
        roles,
        is_active: None,
    }
}

#[tokio::test]
async fn deleting_a_role_keeps_referencing_users() {
    let state = state();
    let role = create_role(&state, "Editor", &["manage_articles"]).await;

    let (_, Json(user)) = handlers::create_user(
        env_admin(),
        State(state.clone()),
        Json(user_request("dana", vec![role.id.clone()])),
    )
    .await
    .unwrap();

    let status = handlers::delete_role(env_admin(), State(state.clone()), Path(role.id.clone()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Json(still_there) = handlers::get_user(env_admin(), State(state.clone()), Path(user.id.clone()))
        .await
        .expect("user must survive role deletion");
    assert_eq!(still_there.roles, vec![role.id]);
}

#[tokio::test]
async fn created_user_never_exposes_credentials() {
    let state = state();

    let (status, Json(profile)) =
        handlers::create_user(env_admin(), State(state.clone()), Json(user_request("sam", vec![])))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(profile.is_active);

    let body = serde_json::to_value(&profile).unwrap();
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("password").is_none());

    // The stored document holds an Argon2 hash, never the plain password.
    let stored = state
        .repo
        .get_by_id(EntityKind::Users, &profile.id)
        .await
        .unwrap()
        .unwrap();
    let hash = stored.data["passwordHash"].as_str().unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(!hash.contains("long-enough-password"));
}

#[tokio::test]
async fn user_payload_validation() {
    let state = state();

    let mut short = user_request("short", vec![]);
    short.password = "tiny".to_string();
    let result = handlers::create_user(env_admin(), State(state.clone()), Json(short)).await;
    assert_eq!(result.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);

    let dangling = user_request("ghost", vec!["00000000-0000-4000-8000-000000000000".to_string()]);
    let result = handlers::create_user(env_admin(), State(state.clone()), Json(dangling)).await;
    assert_eq!(result.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) =
        handlers::create_user(env_admin(), State(state.clone()), Json(user_request("sam", vec![])))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    let result = handlers::create_user(env_admin(), State(state), Json(user_request("sam", vec![]))).await;
    assert_eq!(result.unwrap_err(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn user_update_can_deactivate() {
    let state = state();
    let (_, Json(user)) =
        handlers::create_user(env_admin(), State(state.clone()), Json(user_request("sam", vec![])))
            .await
            .unwrap();

    let Json(updated) = handlers::update_user(
        env_admin(),
        State(state.clone()),
        Path(user.id.clone()),
        Json(UpdateUserRequest {
            is_active: Some(false),
            ..UpdateUserRequest::default()
        }),
    )
    .await
    .unwrap();

    assert!(!updated.is_active);
    assert_eq!(updated.username, "sam");
}

// --- Activity log ---

#[tokio::test]
async fn each_role_and_user_mutation_records_one_entry() {
    let state = state();
    let role = create_role(&state, "Editor", &["manage_articles"]).await;
    let Json(updated) = handlers::update_role(
        env_admin(),
        State(state.clone()),
        Path(role.id.clone()),
        Json(UpdateRoleRequest {
            permissions: Some(vec!["publish_articles".to_string()]),
            ..UpdateRoleRequest::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.permissions, vec!["publish_articles".to_string()]);
    let (_, Json(user)) =
        handlers::create_user(env_admin(), State(state.clone()), Json(user_request("sam", vec![])))
            .await
            .unwrap();
    let status = handlers::delete_user(env_admin(), State(state.clone()), Path(user.id.clone()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    let status = handlers::delete_role(env_admin(), State(state.clone()), Path(role.id.clone()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Json(entries) = handlers::list_activity(
        env_admin(),
        State(state.clone()),
        Query(ActivityFilter::default()),
    )
    .await
    .unwrap();

    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec!["delete_role", "delete_user", "create_user", "update_role", "create_role"]
    );
    assert!(entries.iter().all(|e| e.username == "admin"));
    assert!(entries.iter().all(|e| !e.details.contains("long-enough-password")));
}

#[tokio::test]
async fn activity_limit_is_clamped() {
    let state = state();
    for name in ["A", "B", "C"] {
        create_role(&state, name, &[]).await;
    }

    let Json(entries) = handlers::list_activity(
        env_admin(),
        State(state.clone()),
        Query(ActivityFilter { limit: Some(0) }),
    )
    .await
    .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "create_role");
}

// --- Content collections ---

#[tokio::test]
async fn publishing_needs_its_own_permission() {
    let state = state();
    let (_, Json(article)) = handlers::create_document(
        user_with(&[Permission::ManageArticles]),
        State(state.clone()),
        Path("articles".to_string()),
        Json(json!({"title": "Budget vote", "status": "draft"})),
    )
    .await
    .unwrap();

    let denied = handlers::publish_article(
        user_with(&[Permission::ManageArticles]),
        State(state.clone()),
        Path(("articles".to_string(), article.id.clone())),
    )
    .await;
    assert_eq!(denied.unwrap_err(), StatusCode::FORBIDDEN);

    let Json(published) = handlers::publish_article(
        user_with(&[Permission::PublishArticles]),
        State(state.clone()),
        Path(("articles".to_string(), article.id.clone())),
    )
    .await
    .unwrap();
    assert_eq!(published.data["status"], "published");
    assert_eq!(published.data["title"], "Budget vote");
}

#[tokio::test]
async fn article_update_cannot_publish_without_publish_permission() {
    let state = state();
    let editor = || user_with(&[Permission::ManageArticles]);
    let (_, Json(article)) = handlers::create_document(
        editor(),
        State(state.clone()),
        Path("articles".to_string()),
        Json(json!({"title": "Budget vote", "status": "draft"})),
    )
    .await
    .unwrap();

    for body in [
        json!({"status": "published"}),
        json!({"publishedAt": "2026-01-01T00:00:00Z"}),
    ] {
        let result = handlers::update_document(
            editor(),
            State(state.clone()),
            Path(("articles".to_string(), article.id.clone())),
            Json(body),
        )
        .await;
        assert_eq!(result.unwrap_err(), StatusCode::FORBIDDEN);
    }

    let stored = state
        .repo
        .get_by_id(EntityKind::Articles, &article.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.data["status"], "draft");
    assert!(stored.data.get("publishedAt").is_none());

    // Ordinary edits still go through.
    let Json(edited) = handlers::update_document(
        editor(),
        State(state.clone()),
        Path(("articles".to_string(), article.id.clone())),
        Json(json!({"title": "Budget vote passes"})),
    )
    .await
    .unwrap();
    assert_eq!(edited.data["title"], "Budget vote passes");

    let editor_in_chief = user_with(&[Permission::ManageArticles, Permission::PublishArticles]);
    let Json(published) = handlers::update_document(
        editor_in_chief,
        State(state.clone()),
        Path(("articles".to_string(), article.id.clone())),
        Json(json!({"status": "published"})),
    )
    .await
    .unwrap();
    assert_eq!(published.data["status"], "published");
}

#[tokio::test]
async fn article_create_cannot_publish_without_publish_permission() {
    let state = state();

    for body in [
        json!({"title": "Scoop", "status": "published"}),
        json!({"title": "Scoop", "publishedAt": "2026-01-01T00:00:00Z"}),
    ] {
        let result = handlers::create_document(
            user_with(&[Permission::ManageArticles]),
            State(state.clone()),
            Path("articles".to_string()),
            Json(body),
        )
        .await;
        assert_eq!(result.unwrap_err(), StatusCode::FORBIDDEN);
    }
    assert!(state.repo.list_all(EntityKind::Articles).await.unwrap().is_empty());
    assert!(state.repo.list_activity(10).await.unwrap().is_empty());

    let (status, Json(article)) = handlers::create_document(
        env_admin(),
        State(state.clone()),
        Path("articles".to_string()),
        Json(json!({"title": "Scoop", "status": "published"})),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(article.data["status"], "published");
}

#[tokio::test]
async fn content_routes_reject_typed_collections() {
    let state = state();

    let result = handlers::list_documents(env_admin(), State(state.clone()), Path("users".to_string())).await;
    assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);

    let result = handlers::create_document(
        env_admin(),
        State(state),
        Path("gadgets".to_string()),
        Json(json!(["not", "an", "object"])),
    )
    .await;
    assert_eq!(result.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn layout_permission_covers_ads_and_gadgets_only() {
    let state = state();
    let layout = || user_with(&[Permission::ManageLayoutGadgets]);

    assert!(
        handlers::list_documents(layout(), State(state.clone()), Path("advertisements".to_string()))
            .await
            .is_ok()
    );
    assert!(
        handlers::list_documents(layout(), State(state.clone()), Path("gadgets".to_string()))
            .await
            .is_ok()
    );
    let result = handlers::list_documents(layout(), State(state), Path("seo_settings".to_string())).await;
    assert_eq!(result.unwrap_err(), StatusCode::FORBIDDEN);
}

// --- Failure handling ---

#[tokio::test]
async fn persistence_failures_surface_as_500() {
    let state = failing_state();

    let result = handlers::list_roles(env_admin(), State(state.clone())).await;
    assert_eq!(result.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);

    let result = handlers::create_role(env_admin(), State(state), Json(role_request("Editor", &[]))).await;
    assert_eq!(result.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn failed_audit_rolls_back_the_mutation() {
    let state = AppState::new(
        AppConfig::default(),
        Arc::new(MemoryRepository::new_failing_activity()),
    );

    let result = handlers::create_role(env_admin(), State(state.clone()), Json(role_request("Editor", &[]))).await;
    assert_eq!(result.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(state.repo.list_all(EntityKind::Roles).await.unwrap().is_empty());

    let result = handlers::create_document(
        env_admin(),
        State(state.clone()),
        Path("gadgets".to_string()),
        Json(json!({"slot": "sidebar"})),
    )
    .await;
    assert_eq!(result.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(state.repo.list_all(EntityKind::Gadgets).await.unwrap().is_empty());
}

#[tokio::test]
async fn dashboard_counts_collections() {
    let state = state();
    create_role(&state, "Editor", &[]).await;
    let (status, _) = handlers::create_document(
        env_admin(),
        State(state.clone()),
        Path("gadgets".to_string()),
        Json(json!({"slot": "sidebar"})),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let Json(stats) = handlers::get_dashboard_stats(env_admin(), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(stats.roles, 1);
    assert_eq!(stats.gadgets, 1);
    assert_eq!(stats.articles, 0);

    let denied = handlers::get_dashboard_stats(user_with(&[Permission::ManageUsers]), State(state)).await;
    assert_eq!(denied.unwrap_err(), StatusCode::FORBIDDEN);
}
