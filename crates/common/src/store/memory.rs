use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use super::provider::{
    DocumentStore, QueryParams, StoreError, ViewRow, RIFFS_BY_CREATE_TIME, STEMS_BY_CREATE_TIME,
    TYPES_DESIGN,
};
use crate::documents::{RIFF_DOCUMENT_TYPE, STEM_DOCUMENT_TYPE};

/// In-memory document store, emulating the creation-time views of a jam
///  database. Used by tests and offline tooling.
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<MemoryDocumentStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryDocumentStoreInner {
    /// database -> id -> (revision number, document body)
    databases: HashMap<String, BTreeMap<String, (u64, Value)>>,
    /// when set every call fails as if the server were down
    offline: bool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryDocumentStoreInner::default())),
        }
    }

    pub fn create_database(&self, database: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.databases.entry(database.to_string()).or_default();
        Ok(())
    }

    /// Store a document under its `_id`, creating the database on demand
    ///  and ignoring revision checks
    pub fn insert(&self, database: &str, document: Value) -> Result<String, StoreError> {
        let id = document
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Unexpected {
                status: 400,
                reason: "document has no _id".to_string(),
            })?;

        let mut inner = self.write()?;
        let docs = inner.databases.entry(database.to_string()).or_default();
        let revision = docs.get(&id).map(|(rev, _)| rev + 1).unwrap_or(1);
        let (rev, body) = stamp(&id, revision, document);
        docs.insert(id, (revision, body));
        Ok(rev)
    }

    /// Simulate the server going away (or coming back)
    pub fn set_offline(&self, offline: bool) -> Result<(), StoreError> {
        self.write()?.offline = offline;
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryDocumentStoreInner>, StoreError> {
        let inner = self.inner.read().map_err(|e| {
            StoreError::Unavailable(format!("failed to acquire read lock: {}", e))
        })?;
        if inner.offline {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(inner)
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, MemoryDocumentStoreInner>, StoreError> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("failed to acquire write lock: {}", e)))
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn revision_string(revision: u64) -> String {
    format!("{}-mem", revision)
}

fn stamp(id: &str, revision: u64, mut document: Value) -> (String, Value) {
    let rev = revision_string(revision);
    if let Some(object) = document.as_object_mut() {
        object.insert("_id".to_string(), json!(id));
        object.insert("_rev".to_string(), json!(rev));
    }
    (rev, document)
}

fn view_document_type(design: &str, view: &str) -> Option<&'static str> {
    if design != TYPES_DESIGN {
        return None;
    }
    match view {
        RIFFS_BY_CREATE_TIME => Some(RIFF_DOCUMENT_TYPE),
        STEMS_BY_CREATE_TIME => Some(STEM_DOCUMENT_TYPE),
        _ => None,
    }
}

fn page(mut rows: Vec<ViewRow>, params: &QueryParams) -> Vec<ViewRow> {
    if params.descending {
        rows.reverse();
    }
    let skip = params.skip.unwrap_or(0) as usize;
    let limit = params.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    rows.into_iter()
        .skip(skip)
        .take(limit)
        .map(|mut row| {
            if !params.include_docs {
                row.doc = None;
            }
            row
        })
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(
        &self,
        database: &str,
        design: &str,
        view: &str,
        params: &QueryParams,
    ) -> Result<Vec<ViewRow>, StoreError> {
        let inner = self.read()?;
        let docs = inner
            .databases
            .get(database)
            .ok_or_else(|| StoreError::DatabaseMissing(database.to_string()))?;
        let doc_type = view_document_type(design, view).ok_or_else(|| StoreError::Unexpected {
            status: 404,
            reason: format!("missing_named_view {}/{}", design, view),
        })?;

        let mut rows: Vec<(i64, ViewRow)> = docs
            .iter()
            .filter(|(_, (_, body))| body.get("type").and_then(Value::as_str) == Some(doc_type))
            .map(|(id, (_, body))| {
                let created = body.get("created").and_then(Value::as_i64).unwrap_or(0);
                (
                    created,
                    ViewRow {
                        id: id.clone(),
                        key: json!(created),
                        value: Value::Null,
                        doc: Some(body.clone()),
                    },
                )
            })
            .collect();
        // ties on the key fall back to id order, as couch does
        rows.sort_by(|(a, row_a), (b, row_b)| a.cmp(b).then_with(|| row_a.id.cmp(&row_b.id)));

        Ok(page(rows.into_iter().map(|(_, row)| row).collect(), params))
    }

    async fn all_docs(
        &self,
        database: &str,
        params: &QueryParams,
    ) -> Result<Vec<ViewRow>, StoreError> {
        let inner = self.read()?;
        let docs = inner
            .databases
            .get(database)
            .ok_or_else(|| StoreError::DatabaseMissing(database.to_string()))?;

        let rows = docs
            .iter()
            .map(|(id, (revision, body))| ViewRow {
                id: id.clone(),
                key: json!(id),
                value: json!({ "rev": revision_string(*revision) }),
                doc: Some(body.clone()),
            })
            .collect();
        Ok(page(rows, params))
    }

    async fn get(&self, database: &str, id: &str) -> Result<Value, StoreError> {
        let inner = self.read()?;
        inner
            .databases
            .get(database)
            .ok_or_else(|| StoreError::DatabaseMissing(database.to_string()))?
            .get(id)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| StoreError::DocumentMissing {
                database: database.to_string(),
                id: id.to_string(),
            })
    }

    async fn put(&self, database: &str, id: &str, document: &Value) -> Result<String, StoreError> {
        let mut inner = self.write()?;
        if inner.offline {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        let docs = inner
            .databases
            .get_mut(database)
            .ok_or_else(|| StoreError::DatabaseMissing(database.to_string()))?;

        let offered = document.get("_rev").and_then(Value::as_str);
        let revision = match docs.get(id) {
            Some((current, _)) => {
                if offered != Some(revision_string(*current).as_str()) {
                    return Err(StoreError::Conflict {
                        database: database.to_string(),
                        id: id.to_string(),
                    });
                }
                current + 1
            }
            None => 1,
        };

        let (rev, body) = stamp(id, revision, document.clone());
        docs.insert(id.to_string(), (revision, body));
        Ok(rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::provider::jam_database;

    fn seeded() -> (MemoryDocumentStore, String) {
        let store = MemoryDocumentStore::new();
        let db = jam_database("band123");
        for (id, kind, created) in [
            ("r2", "Rifff", 200),
            ("s1", "Loop", 50),
            ("r1", "Rifff", 100),
            ("r3", "Rifff", 300),
            ("p", "Profile", 10),
        ] {
            store
                .insert(&db, json!({ "_id": id, "type": kind, "created": created }))
                .unwrap();
        }
        (store, db)
    }

    #[tokio::test]
    async fn test_view_is_ordered_by_creation_time() {
        let (store, db) = seeded();
        let rows = store
            .query(&db, TYPES_DESIGN, RIFFS_BY_CREATE_TIME, &QueryParams::with_docs())
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert!(rows[0].doc.is_some());
    }

    #[tokio::test]
    async fn test_view_newest_first() {
        let (store, db) = seeded();
        let rows = store
            .query(&db, TYPES_DESIGN, RIFFS_BY_CREATE_TIME, &QueryParams::newest(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "r3");
        assert_eq!(rows[0].key, json!(300));
    }

    #[tokio::test]
    async fn test_missing_database_and_document() {
        let (store, db) = seeded();
        let err = store
            .query("user_appdata$nope", TYPES_DESIGN, STEMS_BY_CREATE_TIME, &QueryParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DatabaseMissing(_)));

        let err = store.get(&db, "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::DocumentMissing { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_checks_revision() {
        let (store, db) = seeded();
        let current = store.get(&db, "p").await.unwrap();
        let rev = store.put(&db, "p", &current).await.unwrap();
        assert_eq!(rev, "2-mem");

        // stale revision
        let err = store.put(&db, "p", &current).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let (store, db) = seeded();
        store.set_offline(true).unwrap();
        let err = store.get(&db, "p").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!err.is_not_found());
        store.set_offline(false).unwrap();
        assert!(store.get(&db, "p").await.is_ok());
    }
}
