use newsroom_admin::{
    models::{ActivityLogEntry, EntityKind, Role},
    repository::{
        self, AuditDraft, MemoryRepository, PersistenceError, PostgresRepository, Repository,
    },
};
use serde_json::{Map, Value, json};
use sqlx::postgres::PgPoolOptions;

fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("test body must be an object"),
    }
}

/// Behaviour every `Repository` implementation must share. Role names are
/// suffixed so repeated runs against a real database do not collide.
async fn gateway_contract(repo: &dyn Repository) {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let name = format!("Editor-{suffix}");

    // create + get_by_id: same name, same permission set.
    let created = repository::insert(
        repo,
        &Role {
            name: name.clone(),
            permissions: vec!["manage_articles".to_string()],
            ..Role::default()
        },
    )
    .await
    .unwrap();
    assert!(!created.id.is_empty());

    let fetched: Role = repository::fetch(repo, &created.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, name);
    assert_eq!(fetched.permissions, vec!["manage_articles".to_string()]);

    // find_by_field
    let found = repo
        .find_by_field(EntityKind::Roles, "name", &name)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);

    // Unique names.
    let dup = repo
        .create(EntityKind::Roles, body(json!({"name": name})))
        .await
        .unwrap_err();
    assert!(matches!(dup, PersistenceError::Conflict));

    // update is a shallow merge.
    let updated = repo
        .update(
            EntityKind::Roles,
            &created.id,
            body(json!({"description": "desk"})),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.data["name"], Value::String(name.clone()));
    assert_eq!(updated.data["description"], "desk");

    // Malformed and unknown ids are misses.
    assert!(repo.get_by_id(EntityKind::Roles, "nope").await.unwrap().is_none());
    assert!(
        repo.update(EntityKind::Roles, "nope", Map::new())
            .await
            .unwrap()
            .is_none()
    );
    assert!(!repo.delete(EntityKind::Roles, "nope").await.unwrap());

    // Collections are disjoint.
    assert!(
        repo.get_by_id(EntityKind::Articles, &created.id)
            .await
            .unwrap()
            .is_none()
    );

    // delete
    assert!(repo.delete(EntityKind::Roles, &created.id).await.unwrap());
    assert!(!repo.delete(EntityKind::Roles, &created.id).await.unwrap());
    assert!(repo.get_by_id(EntityKind::Roles, &created.id).await.unwrap().is_none());

    // Activity log: append-only, newest first.
    let first = ActivityLogEntry::new(
        ("env-admin".to_string(), "admin".to_string()),
        "create_role",
        EntityKind::Roles,
        &created.id,
        format!("contract-{suffix}"),
    );
    let second = ActivityLogEntry::new(
        ("env-admin".to_string(), "admin".to_string()),
        "delete_role",
        EntityKind::Roles,
        &created.id,
        format!("contract-{suffix}"),
    );
    repo.record_activity(first.clone()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    repo.record_activity(second.clone()).await.unwrap();

    let recent = repo.list_activity(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second.id);
    assert_eq!(recent[1].id, first.id);

    // Audited writes store the change and its entry together.
    let actor = ("env-admin".to_string(), "admin".to_string());
    let audited = repo
        .create_audited(
            EntityKind::Roles,
            body(json!({"name": format!("Audited-{suffix}")})),
            AuditDraft::new(actor.clone(), "create_role", format!("audited-{suffix}")),
        )
        .await
        .unwrap();
    let latest = repo.list_activity(1).await.unwrap();
    assert_eq!(latest[0].target_id, audited.id);
    assert_eq!(latest[0].details, format!("audited-{suffix}"));

    // A failed write records nothing.
    let dup = repo
        .create_audited(
            EntityKind::Roles,
            body(json!({"name": format!("Audited-{suffix}")})),
            AuditDraft::new(actor.clone(), "create_role", "duplicate"),
        )
        .await
        .unwrap_err();
    assert!(matches!(dup, PersistenceError::Conflict));
    assert_eq!(repo.list_activity(1).await.unwrap()[0].id, latest[0].id);

    assert!(
        repo.delete_audited(EntityKind::Roles, &audited.id, AuditDraft::new(actor, "delete_role", ""))
            .await
            .unwrap()
    );
    let latest = repo.list_activity(1).await.unwrap();
    assert_eq!(latest[0].action, "delete_role");
    assert_eq!(latest[0].target_id, audited.id);
}

#[tokio::test]
async fn memory_repository_honours_the_gateway_contract() {
    gateway_contract(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn failing_repository_surfaces_errors() {
    let repo = MemoryRepository::new_failing();
    assert!(matches!(
        repo.list_all(EntityKind::Articles).await,
        Err(PersistenceError::Unavailable(_))
    ));
    assert!(repo.list_activity(10).await.is_err());
}

#[tokio::test]
#[ignore = "needs a Postgres instance in DATABASE_URL"]
async fn postgres_repository_honours_the_gateway_contract() {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to Postgres in tests");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations should apply");

    gateway_contract(&PostgresRepository::new(pool)).await;
}
