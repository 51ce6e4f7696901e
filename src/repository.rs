use crate::models::{ActivityLogEntry, Document, EntityKind, Role, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgExecutor, PgPool, types::Json};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// PersistenceError
///
/// Every failure the gateway can surface. Not-found and malformed ids are
/// *not* errors: they come back as `Ok(None)` / `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("document body must be a JSON object")]
    NotAnObject,
    #[error("unique constraint violated")]
    Conflict,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Repository Trait
///
/// The Persistence Gateway contract. Uniform CRUD over one collection per
/// `EntityKind` plus the append-only activity log. Every read returns an
/// owned copy; callers never hold references into the store.
///
/// **Send + Sync + async_trait** are required so `Arc<dyn Repository>` can be
/// shared across Axum's request tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_all(&self, kind: EntityKind) -> Result<Vec<Document>, PersistenceError>;
    async fn get_by_id(&self, kind: EntityKind, id: &str)
    -> Result<Option<Document>, PersistenceError>;
    /// First document whose top-level string `field` equals `value`.
    async fn find_by_field(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>, PersistenceError>;
    async fn create(
        &self,
        kind: EntityKind,
        data: Map<String, Value>,
    ) -> Result<Document, PersistenceError>;
    /// Shallow merge of `patch` into the stored body. Last write wins.
    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Document>, PersistenceError>;
    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, PersistenceError>;

    // --- Audited Mutations ---
    // The mutation and its activity entry commit together or not at all.
    // Nothing is recorded when the target does not exist.
    async fn create_audited(
        &self,
        kind: EntityKind,
        data: Map<String, Value>,
        audit: AuditDraft,
    ) -> Result<Document, PersistenceError>;
    async fn update_audited(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Map<String, Value>,
        audit: AuditDraft,
    ) -> Result<Option<Document>, PersistenceError>;
    async fn delete_audited(
        &self,
        kind: EntityKind,
        id: &str,
        audit: AuditDraft,
    ) -> Result<bool, PersistenceError>;

    // --- Activity Log ---
    async fn record_activity(&self, entry: ActivityLogEntry) -> Result<(), PersistenceError>;
    /// Most recent entries first.
    async fn list_activity(&self, limit: i64) -> Result<Vec<ActivityLogEntry>, PersistenceError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// AuditDraft
///
/// An activity entry waiting for its target. The target id comes from the
/// stored document, so a create can be audited before its id exists.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub actor: (String, String),
    pub action: String,
    pub details: String,
}

impl AuditDraft {
    pub fn new(actor: (String, String), action: &str, details: impl Into<String>) -> Self {
        Self {
            actor,
            action: action.to_string(),
            details: details.into(),
        }
    }

    pub fn into_entry(self, kind: EntityKind, target_id: &str) -> ActivityLogEntry {
        ActivityLogEntry::new(self.actor, &self.action, kind, target_id, self.details)
    }
}

/// Ids are UUID strings. Anything else is a request-level validation miss,
/// never a driver error.
pub fn parse_id(kind: EntityKind, id: &str) -> Option<Uuid> {
    match Uuid::parse_str(id) {
        Ok(uuid) => Some(uuid),
        Err(_) => {
            tracing::debug!(%kind, id, "rejecting malformed document id");
            None
        }
    }
}

// --- Typed Access ---

/// A domain record stored in a gateway collection.
pub trait Entity: Serialize + DeserializeOwned + Send {
    const KIND: EntityKind;
}

impl Entity for Role {
    const KIND: EntityKind = EntityKind::Roles;
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::Users;
}

/// Serializes a record into a document body. The id lives outside the body.
pub fn encode<T: Entity>(record: &T) -> Result<Map<String, Value>, PersistenceError> {
    match serde_json::to_value(record)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        _ => Err(PersistenceError::NotAnObject),
    }
}

pub fn decode<T: Entity>(document: Document) -> Result<T, PersistenceError> {
    let mut body = document.data;
    body.insert("id".to_string(), Value::String(document.id));
    Ok(serde_json::from_value(Value::Object(body))?)
}

pub async fn fetch<T: Entity>(
    repo: &dyn Repository,
    id: &str,
) -> Result<Option<T>, PersistenceError> {
    repo.get_by_id(T::KIND, id).await?.map(decode::<T>).transpose()
}

/// Lists a collection, skipping (and logging) documents that no longer decode.
pub async fn fetch_all<T: Entity>(repo: &dyn Repository) -> Result<Vec<T>, PersistenceError> {
    let documents = repo.list_all(T::KIND).await?;
    Ok(documents
        .into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            decode::<T>(doc)
                .inspect_err(|e| tracing::error!(kind = %T::KIND, %id, "undecodable document: {e}"))
                .ok()
        })
        .collect())
}

pub async fn insert<T: Entity>(repo: &dyn Repository, record: &T) -> Result<T, PersistenceError> {
    let created = repo.create(T::KIND, encode(record)?).await?;
    decode(created)
}

pub async fn insert_audited<T: Entity>(
    repo: &dyn Repository,
    record: &T,
    audit: AuditDraft,
) -> Result<T, PersistenceError> {
    let created = repo.create_audited(T::KIND, encode(record)?, audit).await?;
    decode(created)
}

pub async fn find_by<T: Entity>(
    repo: &dyn Repository,
    field: &str,
    value: &str,
) -> Result<Option<T>, PersistenceError> {
    repo.find_by_field(T::KIND, field, value)
        .await?
        .map(decode::<T>)
        .transpose()
}

// --- Postgres ---

#[derive(FromRow)]
struct DocumentRow {
    id: Uuid,
    data: Json<Map<String, Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id.to_string(),
            data: row.data.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn map_write_error(e: sqlx::Error) -> PersistenceError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => PersistenceError::Conflict,
        _ => PersistenceError::Database(e),
    }
}

// Write statements, shared by the pooled and the transactional paths.

async fn insert_document<'e, E: PgExecutor<'e>>(
    executor: E,
    kind: EntityKind,
    data: &Map<String, Value>,
) -> Result<Document, PersistenceError> {
    let row = sqlx::query_as::<_, DocumentRow>(
        r#"INSERT INTO documents (collection, id, data)
           VALUES ($1, $2, $3)
           RETURNING id, data, created_at, updated_at"#,
    )
    .bind(kind.as_str())
    .bind(Uuid::new_v4())
    .bind(Json(data))
    .fetch_one(executor)
    .await
    .map_err(map_write_error)
    .inspect_err(|e| tracing::error!(%kind, "create error: {:?}", e))?;

    Ok(row.into())
}

/// Uses JSONB `||` so only the supplied top-level keys change.
async fn merge_document<'e, E: PgExecutor<'e>>(
    executor: E,
    kind: EntityKind,
    id: Uuid,
    patch: &Map<String, Value>,
) -> Result<Option<Document>, PersistenceError> {
    let row = sqlx::query_as::<_, DocumentRow>(
        r#"UPDATE documents
           SET data = data || $3, updated_at = now()
           WHERE collection = $1 AND id = $2
           RETURNING id, data, created_at, updated_at"#,
    )
    .bind(kind.as_str())
    .bind(id)
    .bind(Json(patch))
    .fetch_optional(executor)
    .await
    .map_err(map_write_error)
    .inspect_err(|e| tracing::error!(%kind, %id, "update error: {:?}", e))?;

    Ok(row.map(Document::from))
}

async fn remove_document<'e, E: PgExecutor<'e>>(
    executor: E,
    kind: EntityKind,
    id: Uuid,
) -> Result<bool, PersistenceError> {
    let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
        .bind(kind.as_str())
        .bind(id)
        .execute(executor)
        .await
        .inspect_err(|e| tracing::error!(%kind, %id, "delete error: {:?}", e))?;

    Ok(result.rows_affected() > 0)
}

async fn insert_activity<'e, E: PgExecutor<'e>>(
    executor: E,
    entry: &ActivityLogEntry,
) -> Result<(), PersistenceError> {
    sqlx::query(
        r#"INSERT INTO activity_log
           (id, user_id, username, action, target_type, target_id, details, timestamp)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
    )
    .bind(&entry.id)
    .bind(&entry.user_id)
    .bind(&entry.username)
    .bind(&entry.action)
    .bind(&entry.target_type)
    .bind(&entry.target_id)
    .bind(&entry.details)
    .bind(entry.timestamp)
    .execute(executor)
    .await
    .inspect_err(|e| {
        tracing::error!(action = %entry.action, target_id = %entry.target_id, "record_activity error: {:?}", e)
    })?;

    Ok(())
}

/// PostgresRepository
///
/// The `Repository` implementation backed by a single `documents` table
/// (JSONB bodies keyed by collection and UUID) and an `activity_log` table.
/// The pool is created once per process and reconnects on its own.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_all(&self, kind: EntityKind) -> Result<Vec<Document>, PersistenceError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"SELECT id, data, created_at, updated_at
               FROM documents
               WHERE collection = $1
               ORDER BY created_at DESC"#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(%kind, "list_all error: {:?}", e))?;

        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<Document>, PersistenceError> {
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, DocumentRow>(
            r#"SELECT id, data, created_at, updated_at
               FROM documents
               WHERE collection = $1 AND id = $2"#,
        )
        .bind(kind.as_str())
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(%kind, id, "get_by_id error: {:?}", e))?;

        Ok(row.map(Document::from))
    }

    async fn find_by_field(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>, PersistenceError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"SELECT id, data, created_at, updated_at
               FROM documents
               WHERE collection = $1 AND data->>$2 = $3
               LIMIT 1"#,
        )
        .bind(kind.as_str())
        .bind(field)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(%kind, field, "find_by_field error: {:?}", e))?;

        Ok(row.map(Document::from))
    }

    async fn create(
        &self,
        kind: EntityKind,
        data: Map<String, Value>,
    ) -> Result<Document, PersistenceError> {
        insert_document(&self.pool, kind, &data).await
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Document>, PersistenceError> {
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(None);
        };
        merge_document(&self.pool, kind, uuid, &patch).await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, PersistenceError> {
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(false);
        };
        remove_document(&self.pool, kind, uuid).await
    }

    async fn create_audited(
        &self,
        kind: EntityKind,
        data: Map<String, Value>,
        audit: AuditDraft,
    ) -> Result<Document, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let document = insert_document(&mut *tx, kind, &data).await?;
        insert_activity(&mut *tx, &audit.into_entry(kind, &document.id)).await?;
        tx.commit().await?;
        Ok(document)
    }

    async fn update_audited(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Map<String, Value>,
        audit: AuditDraft,
    ) -> Result<Option<Document>, PersistenceError> {
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        let Some(document) = merge_document(&mut *tx, kind, uuid, &patch).await? else {
            return Ok(None);
        };
        insert_activity(&mut *tx, &audit.into_entry(kind, &document.id)).await?;
        tx.commit().await?;
        Ok(Some(document))
    }

    async fn delete_audited(
        &self,
        kind: EntityKind,
        id: &str,
        audit: AuditDraft,
    ) -> Result<bool, PersistenceError> {
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(false);
        };

        let mut tx = self.pool.begin().await?;
        if !remove_document(&mut *tx, kind, uuid).await? {
            return Ok(false);
        }
        insert_activity(&mut *tx, &audit.into_entry(kind, id)).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn record_activity(&self, entry: ActivityLogEntry) -> Result<(), PersistenceError> {
        insert_activity(&self.pool, &entry).await
    }

    async fn list_activity(&self, limit: i64) -> Result<Vec<ActivityLogEntry>, PersistenceError> {
        let entries = sqlx::query_as::<_, ActivityLogEntry>(
            r#"SELECT id, user_id, username, action, target_type, target_id, details, timestamp
               FROM activity_log
               ORDER BY timestamp DESC
               LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("list_activity error: {:?}", e))?;

        Ok(entries)
    }
}

// --- In-Memory ---

type Collections = HashMap<EntityKind, BTreeMap<Uuid, Document>>;

/// MemoryRepository
///
/// A `Repository` held entirely in process memory. Used for local runs without
/// `DATABASE_URL` and by the test-suite. Mirrors the Postgres semantics:
/// UUID ids, shallow-merge updates, unique `username` / role `name`.
#[derive(Default)]
pub struct MemoryRepository {
    collections: RwLock<Collections>,
    activity: RwLock<Vec<ActivityLogEntry>>,
    /// When true, every operation fails as if the database were down.
    pub should_fail: bool,
    /// When true, only activity log writes fail.
    pub fail_activity: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Documents stay writable but the activity log rejects every entry.
    pub fn new_failing_activity() -> Self {
        Self {
            fail_activity: true,
            ..Self::default()
        }
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.should_fail {
            return Err(PersistenceError::Unavailable(
                "simulated outage".to_string(),
            ));
        }
        Ok(())
    }

    fn check_activity_available(&self) -> Result<(), PersistenceError> {
        self.check_available()?;
        if self.fail_activity {
            return Err(PersistenceError::Unavailable(
                "simulated activity log outage".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level fields that must be unique within a collection.
fn unique_field(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Users => Some("username"),
        EntityKind::Roles => Some("name"),
        _ => None,
    }
}

fn violates_unique(
    kind: EntityKind,
    collection: &BTreeMap<Uuid, Document>,
    candidate: &Map<String, Value>,
    own_id: Option<Uuid>,
) -> bool {
    let Some(field) = unique_field(kind) else {
        return false;
    };
    let Some(value) = candidate.get(field) else {
        return false;
    };
    collection
        .iter()
        .any(|(id, doc)| Some(*id) != own_id && doc.data.get(field) == Some(value))
}

// Write steps on an already locked store, shared by the plain and audited paths.

fn create_in(
    collections: &mut Collections,
    kind: EntityKind,
    mut data: Map<String, Value>,
) -> Result<Document, PersistenceError> {
    data.remove("id");
    let collection = collections.entry(kind).or_default();
    if violates_unique(kind, collection, &data, None) {
        return Err(PersistenceError::Conflict);
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    let document = Document {
        id: id.to_string(),
        data,
        created_at: now,
        updated_at: now,
    };
    collection.insert(id, document.clone());
    Ok(document)
}

fn update_in(
    collections: &mut Collections,
    kind: EntityKind,
    uuid: Uuid,
    mut patch: Map<String, Value>,
) -> Result<Option<Document>, PersistenceError> {
    patch.remove("id");
    let Some(collection) = collections.get_mut(&kind) else {
        return Ok(None);
    };
    if !collection.contains_key(&uuid) {
        return Ok(None);
    }
    if violates_unique(kind, collection, &patch, Some(uuid)) {
        return Err(PersistenceError::Conflict);
    }

    let Some(document) = collection.get_mut(&uuid) else {
        return Ok(None);
    };
    document.data.extend(patch);
    document.updated_at = Utc::now();
    Ok(Some(document.clone()))
}

fn delete_in(collections: &mut Collections, kind: EntityKind, uuid: Uuid) -> bool {
    collections
        .get_mut(&kind)
        .map(|c| c.remove(&uuid).is_some())
        .unwrap_or(false)
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_all(&self, kind: EntityKind) -> Result<Vec<Document>, PersistenceError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        let mut documents: Vec<Document> = collections
            .get(&kind)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<Document>, PersistenceError> {
        self.check_available()?;
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(None);
        };
        let collections = self.collections.read().await;
        Ok(collections.get(&kind).and_then(|c| c.get(&uuid)).cloned())
    }

    async fn find_by_field(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>, PersistenceError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        Ok(collections.get(&kind).and_then(|c| {
            c.values()
                .find(|doc| doc.data.get(field).and_then(Value::as_str) == Some(value))
                .cloned()
        }))
    }

    async fn create(
        &self,
        kind: EntityKind,
        data: Map<String, Value>,
    ) -> Result<Document, PersistenceError> {
        self.check_available()?;
        let mut collections = self.collections.write().await;
        create_in(&mut collections, kind, data)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Document>, PersistenceError> {
        self.check_available()?;
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(None);
        };
        let mut collections = self.collections.write().await;
        update_in(&mut collections, kind, uuid, patch)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, PersistenceError> {
        self.check_available()?;
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(false);
        };
        let mut collections = self.collections.write().await;
        Ok(delete_in(&mut collections, kind, uuid))
    }

    // Both locks are taken (collections first) before anything changes, and the
    // activity log is checked up front, so a failed audit leaves no trace.

    async fn create_audited(
        &self,
        kind: EntityKind,
        data: Map<String, Value>,
        audit: AuditDraft,
    ) -> Result<Document, PersistenceError> {
        let mut collections = self.collections.write().await;
        let mut activity = self.activity.write().await;
        self.check_activity_available()?;

        let document = create_in(&mut collections, kind, data)?;
        activity.push(audit.into_entry(kind, &document.id));
        Ok(document)
    }

    async fn update_audited(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Map<String, Value>,
        audit: AuditDraft,
    ) -> Result<Option<Document>, PersistenceError> {
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(None);
        };
        let mut collections = self.collections.write().await;
        let mut activity = self.activity.write().await;
        self.check_activity_available()?;

        let updated = update_in(&mut collections, kind, uuid, patch)?;
        if let Some(document) = &updated {
            activity.push(audit.into_entry(kind, &document.id));
        }
        Ok(updated)
    }

    async fn delete_audited(
        &self,
        kind: EntityKind,
        id: &str,
        audit: AuditDraft,
    ) -> Result<bool, PersistenceError> {
        let Some(uuid) = parse_id(kind, id) else {
            return Ok(false);
        };
        let mut collections = self.collections.write().await;
        let mut activity = self.activity.write().await;
        self.check_activity_available()?;

        let deleted = delete_in(&mut collections, kind, uuid);
        if deleted {
            activity.push(audit.into_entry(kind, id));
        }
        Ok(deleted)
    }

    async fn record_activity(&self, entry: ActivityLogEntry) -> Result<(), PersistenceError> {
        self.check_activity_available()?;
        self.activity.write().await.push(entry);
        Ok(())
    }

    async fn list_activity(&self, limit: i64) -> Result<Vec<ActivityLogEntry>, PersistenceError> {
        self.check_available()?;
        let limit = usize::try_from(limit).unwrap_or(0);
        let activity = self.activity.read().await;
        Ok(activity.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test body must be an object"),
        }
    }

    #[tokio::test]
    async fn update_merges_top_level_fields() {
        let repo = MemoryRepository::new();
        let doc = repo
            .create(EntityKind::Articles, body(json!({"title": "Draft", "status": "draft"})))
            .await
            .unwrap();

        let updated = repo
            .update(EntityKind::Articles, &doc.id, body(json!({"status": "published"})))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.data["title"], "Draft");
        assert_eq!(updated.data["status"], "published");
    }

    #[tokio::test]
    async fn malformed_ids_are_misses_not_errors() {
        let repo = MemoryRepository::new();
        assert!(repo.get_by_id(EntityKind::Roles, "not-a-uuid").await.unwrap().is_none());
        assert!(!repo.delete(EntityKind::Roles, "../etc").await.unwrap());
        assert!(
            repo.update(EntityKind::Roles, "42", Map::new())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn duplicate_role_name_is_a_conflict() {
        let repo = MemoryRepository::new();
        repo.create(EntityKind::Roles, body(json!({"name": "Editor"})))
            .await
            .unwrap();
        let err = repo
            .create(EntityKind::Roles, body(json!({"name": "Editor"})))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict));
    }

    fn draft(action: &str) -> AuditDraft {
        AuditDraft::new(("env-admin".to_string(), "admin".to_string()), action, "")
    }

    #[tokio::test]
    async fn audited_writes_record_one_entry_per_change() {
        let repo = MemoryRepository::new();
        let doc = repo
            .create_audited(EntityKind::Gadgets, body(json!({"name": "rust"})), draft("create"))
            .await
            .unwrap();
        repo.update_audited(EntityKind::Gadgets, &doc.id, body(json!({"name": "go"})), draft("update"))
            .await
            .unwrap()
            .unwrap();
        assert!(repo.delete_audited(EntityKind::Gadgets, &doc.id, draft("delete")).await.unwrap());

        // Misses change nothing and record nothing.
        assert!(!repo.delete_audited(EntityKind::Gadgets, &doc.id, draft("delete")).await.unwrap());

        let actions: Vec<String> = repo
            .list_activity(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["delete", "update", "create"]);
    }

    #[tokio::test]
    async fn failed_audit_leaves_documents_untouched() {
        let repo = MemoryRepository::new_failing_activity();
        let doc = repo
            .create(EntityKind::Gadgets, body(json!({"name": "rust"})))
            .await
            .unwrap();

        assert!(
            repo.create_audited(EntityKind::Gadgets, body(json!({"name": "go"})), draft("create"))
                .await
                .is_err()
        );
        assert!(
            repo.update_audited(EntityKind::Gadgets, &doc.id, body(json!({"name": "zig"})), draft("update"))
                .await
                .is_err()
        );
        assert!(repo.delete_audited(EntityKind::Gadgets, &doc.id, draft("delete")).await.is_err());

        let docs = repo.list_all(EntityKind::Gadgets).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["name"], "rust");
    }

    #[tokio::test]
    async fn encode_strips_the_id() {
        let role = Role {
            id: "abc".to_string(),
            name: "Editor".to_string(),
            ..Role::default()
        };
        let map = encode(&role).unwrap();
        assert!(!map.contains_key("id"));
        assert_eq!(map["name"], "Editor");
    }
}
