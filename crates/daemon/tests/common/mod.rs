//! Shared fixtures for the exporter and public jam cache tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;
use url::Url;

use ::common::identifiers::{IdentifierRecord, IdentifierResolver};
use ::common::store::{
    jam_database, DocumentStore, MemoryDocumentStore, QueryParams, StoreError, ViewRow,
    USERS_DATABASE,
};
use cosm_daemon::export::{AssetFetcher, FetchError};

pub const SERVER_CODE: &str = "CSMX";
pub const ASSET_HOST: &str = "stems.test";

/// jam_001 and jam_007 with their couch and long ids
pub fn resolver() -> Arc<IdentifierResolver> {
    let records = [
        ("jam_001", "band2f1f1597b0", "5a157ceaf13a7fc6"),
        ("jam_007", "band606301f6f2", "4ff9a55ab372aa8c"),
    ]
    .into_iter()
    .map(|(cosmid, couch_id, long_id)| IdentifierRecord {
        cosmid: cosmid.to_string(),
        couch_id: couch_id.to_string(),
        long_id: long_id.to_string(),
    });
    Arc::new(IdentifierResolver::from_records(records).unwrap())
}

pub fn profile(store: &MemoryDocumentStore, couch_id: &str, display_name: &str) {
    store
        .insert(
            &jam_database(couch_id),
            json!({ "_id": "Profile", "type": "Profile", "displayName": display_name, "bio": "" }),
        )
        .unwrap();
}

pub fn riff(store: &MemoryDocumentStore, couch_id: &str, id: &str, user: &str, created: i64) {
    let slot = |stem: &str, on: bool| {
        json!({ "slot": { "current": { "on": on, "currentLoop": stem, "gain": 0.5 } } })
    };
    store
        .insert(
            &jam_database(couch_id),
            json!({
                "_id": id,
                "type": "Rifff",
                "userName": user,
                "created": created,
                "root": 0,
                "scale": 0,
                "app_version": 1071,
                "magnitude": 0.25,
                "state": {
                    "bps": 2.0,
                    "barLength": 16,
                    "playback": [slot("stem-a", true), slot("stem-b", false)]
                }
            }),
        )
        .unwrap();
}

/// A stem with a lossy attachment at `audio/<id>.ogg` of `length` bytes
pub fn stem(store: &MemoryDocumentStore, couch_id: &str, id: &str, created: i64, length: u64) {
    store
        .insert(
            &jam_database(couch_id),
            json!({
                "_id": id,
                "type": "Loop",
                "created": created,
                "creatorUserName": "brubeck",
                "bps": 2.0,
                "barLength": 16,
                "length16ths": 32,
                "sampleRate": 44100.0,
                "cdn_attachments": {
                    "oggAudio": {
                        "endpoint": "https://cdn.test",
                        "key": stem_key(id),
                        "mime": "audio/ogg",
                        "length": length
                    }
                }
            }),
        )
        .unwrap();
}

pub fn stem_key(id: &str) -> String {
    format!("audio/{}.ogg", id)
}

pub fn user(store: &MemoryDocumentStore, name: &str, login: &str) {
    store
        .insert(
            USERS_DATABASE,
            json!({ "_id": format!("org.couchdb.user:{}", name), "name": name, "login": login }),
        )
        .unwrap();
}

/// Serves canned bodies by key and remembers every url asked for
#[derive(Debug, Clone, Default)]
pub struct FakeFetcher {
    bodies: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn serve(&self, key: &str, body: &[u8]) {
        self.bodies.lock().insert(key.to_string(), body.to_vec());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, FetchError> {
        self.requests.lock().push(url.to_string());
        let key = url.path().trim_start_matches('/').to_string();
        let body = self.bodies.lock().get(&key).cloned();
        let Some(body) = body else {
            return Err(FetchError::Status {
                url: url.clone(),
                status: 404,
            });
        };
        tokio::fs::write(destination, &body)
            .await
            .map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;
        Ok(body.len() as u64)
    }
}

#[derive(Debug, Default)]
struct Gate {
    database: Mutex<Option<String>>,
    entered: Notify,
    release: Notify,
}

/// Memory store whose view queries against one chosen database block
///  until released
#[derive(Debug, Clone)]
pub struct GatedStore {
    inner: MemoryDocumentStore,
    gate: Arc<Gate>,
}

impl GatedStore {
    pub fn new(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            gate: Arc::new(Gate::default()),
        }
    }

    pub fn close(&self, database: &str) {
        *self.gate.database.lock() = Some(database.to_string());
    }

    /// Resolves once a query has reached the closed gate
    pub async fn entered(&self) {
        self.gate.entered.notified().await;
    }

    pub fn open(&self) {
        *self.gate.database.lock() = None;
        self.gate.release.notify_one();
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn query(
        &self,
        database: &str,
        design: &str,
        view: &str,
        params: &QueryParams,
    ) -> Result<Vec<ViewRow>, StoreError> {
        let gated = self.gate.database.lock().as_deref() == Some(database);
        if gated {
            self.gate.entered.notify_one();
            self.gate.release.notified().await;
        }
        self.inner.query(database, design, view, params).await
    }

    async fn all_docs(
        &self,
        database: &str,
        params: &QueryParams,
    ) -> Result<Vec<ViewRow>, StoreError> {
        self.inner.all_docs(database, params).await
    }

    async fn get(&self, database: &str, id: &str) -> Result<Value, StoreError> {
        self.inner.get(database, id).await
    }

    async fn put(&self, database: &str, id: &str, document: &Value) -> Result<String, StoreError> {
        self.inner.put(database, id, document).await
    }
}
