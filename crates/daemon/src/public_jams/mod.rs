//! Cached "latest activity" across the curated public jams
//!
//! One background task refreshes the cache on an interval while request
//!  handlers read it. A refresh pass holds the single refresh permit from
//!  start to finish and readers of the full list take the same permit, so
//!  a reader sees either the previous pass or the completed new one and
//!  never a mix. The synopsis sits behind its own short lock so status
//!  checks do not queue behind a pass.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, AcquireError, Semaphore};
use tokio::task::JoinHandle;

use common::documents::RiffRecord;
use common::identifiers::{IdentifierError, IdentifierResolver};
use common::store::{
    jam_database, DocumentStore, QueryParams, StoreError, RIFFS_BY_CREATE_TIME, TYPES_DESIGN,
};

use crate::config::JamManifest;
use crate::process::periodic;

pub mod preflight;
mod snapshot;

pub use snapshot::{CuratedJam, GlobalActivitySynopsis, PublicJamSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("public jam cache has not been populated")]
    NotPopulated,
    #[error("public jam cache is stopped")]
    Stopped,
    #[error("refresh permit closed: {0}")]
    PermitClosed(#[from] AcquireError),
    #[error("curated jam: {0}")]
    Identifier(#[from] IdentifierError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Populated,
    Stopped,
}

/// Counts from one refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// Resolve the manifest's public jams, in declaration order
pub fn curated_jams(
    manifest: &JamManifest,
    resolver: &IdentifierResolver,
) -> Result<Vec<CuratedJam>, CacheError> {
    Ok(manifest
        .public
        .iter()
        .map(|declaration| CuratedJam::resolve(declaration, resolver))
        .collect::<Result<Vec<_>, _>>()?)
}

#[derive(Debug)]
pub struct PublicJamStateCache<S> {
    store: S,
    permit: Semaphore,
    entries: Mutex<Vec<PublicJamSnapshot>>,
    synopsis: Mutex<GlobalActivitySynopsis>,
    state: Mutex<CacheState>,
}

impl<S: DocumentStore> PublicJamStateCache<S> {
    pub fn new(store: S, jams: &[CuratedJam]) -> Self {
        Self {
            store,
            permit: Semaphore::new(1),
            entries: Mutex::new(jams.iter().map(PublicJamSnapshot::from).collect()),
            synopsis: Mutex::new(GlobalActivitySynopsis::default()),
            state: Mutex::new(CacheState::Uninitialized),
        }
    }

    pub fn state(&self) -> CacheState {
        *self.state.lock()
    }

    /// The boot pass. Must complete before anything is served.
    pub async fn populate(&self) -> Result<RefreshReport, CacheError> {
        if self.state() == CacheState::Stopped {
            return Err(CacheError::Stopped);
        }
        let report = self.refresh().await?;
        let mut state = self.state.lock();
        if *state == CacheState::Uninitialized {
            *state = CacheState::Populated;
        }
        tracing::info!(
            jams = report.refreshed + report.failed,
            failed = report.failed,
            "public jam cache populated"
        );
        Ok(report)
    }

    /// Re-read the newest riff of every curated jam. A jam that cannot be
    ///  read keeps what it had.
    pub async fn refresh(&self) -> Result<RefreshReport, CacheError> {
        let _permit = self.permit.acquire().await?;

        let targets: Vec<(String, String)> = self
            .entries
            .lock()
            .iter()
            .map(|entry| (entry.couch_id.clone(), entry.name.clone()))
            .collect();

        let mut report = RefreshReport::default();
        for (index, (couch_id, name)) in targets.iter().enumerate() {
            match self.newest_riff(couch_id).await {
                Ok(riff) => {
                    tracing::trace!(
                        couch_id = %couch_id,
                        created = riff.as_ref().map(|r| r.created),
                        "refreshed jam"
                    );
                    if let Some(entry) = self.entries.lock().get_mut(index) {
                        entry.most_recent_riff = riff;
                    }
                    report.refreshed += 1;
                }
                Err(e) => {
                    tracing::error!(couch_id = %couch_id, jam = %name, error = %e, "failed to refresh jam");
                    report.failed += 1;
                }
            }
        }

        let current = self.synopsis.lock().clone();
        let next = {
            let entries = self.entries.lock();
            current.advance(entries.iter())
        };
        *self.synopsis.lock() = next;

        Ok(report)
    }

    async fn newest_riff(&self, couch_id: &str) -> Result<Option<RiffRecord>, StoreError> {
        let database = jam_database(couch_id);
        let rows = self
            .store
            .query(&database, TYPES_DESIGN, RIFFS_BY_CREATE_TIME, &QueryParams::newest(1))
            .await?;
        match rows.first() {
            Some(row) => Ok(Some(row.decode_doc(&database)?)),
            None => Ok(None),
        }
    }

    /// The full list, consistent with exactly one completed pass
    pub async fn snapshot(&self) -> Result<Vec<PublicJamSnapshot>, CacheError> {
        match self.state() {
            CacheState::Uninitialized => return Err(CacheError::NotPopulated),
            CacheState::Stopped => return Err(CacheError::Stopped),
            CacheState::Populated => {}
        }
        let _permit = self.permit.acquire().await?;
        let entries = self.entries.lock().clone();
        Ok(entries)
    }

    pub fn synopsis(&self) -> GlobalActivitySynopsis {
        self.synopsis.lock().clone()
    }

    pub fn stop(&self) {
        *self.state.lock() = CacheState::Stopped;
    }

    /// Spawn the periodic refresh. Shutdown only prevents the next pass;
    ///  a pass already running completes.
    pub fn spawn_refresher(
        self: Arc<Self>,
        interval: Duration,
        shutdown_rx: watch::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let cache = self.clone();
            periodic::run_periodic("public_jams", interval, shutdown_rx, move || {
                let cache = cache.clone();
                async move {
                    if let Err(e) = cache.refresh().await {
                        tracing::error!(error = %e, "public jam refresh failed");
                    }
                }
            })
            .await;
            self.stop();
            tracing::info!("public jam refresher stopped");
        })
    }
}

impl<S: DocumentStore> PublicJamStateCache<S> {
    /// Check that the next refresh has a store to talk to
    pub async fn probe_store(&self) -> Result<(), StoreError> {
        let first = self.entries.lock().first().map(|e| e.couch_id.clone());
        if let Some(couch_id) = first {
            let probe = QueryParams {
                limit: Some(0),
                ..Default::default()
            };
            self.store.all_docs(&jam_database(&couch_id), &probe).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::store::MemoryDocumentStore;
    use serde_json::json;

    fn jam(n: u32) -> CuratedJam {
        CuratedJam {
            cosmid: format!("jam_{:03}", n),
            couch_id: format!("band{:010}", n),
            long_id: format!("long{}", n),
            name: format!("jam {}", n),
            bio: String::new(),
            members: vec![],
        }
    }

    fn add_riff(store: &MemoryDocumentStore, jam: &CuratedJam, id: &str, user: &str, created: i64) {
        store
            .insert(
                &jam_database(&jam.couch_id),
                json!({ "_id": id, "type": "Rifff", "userName": user, "created": created }),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_requires_population() {
        let store = MemoryDocumentStore::new();
        let cache = PublicJamStateCache::new(store, &[jam(1)]);
        assert_eq!(cache.state(), CacheState::Uninitialized);
        assert!(matches!(cache.snapshot().await, Err(CacheError::NotPopulated)));
    }

    #[tokio::test]
    async fn test_populate_reads_newest_riff() {
        let store = MemoryDocumentStore::new();
        let (a, b) = (jam(1), jam(2));
        add_riff(&store, &a, "r1", "ann", 100);
        add_riff(&store, &a, "r2", "bob", 200);
        store.create_database(&jam_database(&b.couch_id)).unwrap();

        let cache = PublicJamStateCache::new(store, &[a, b]);
        let report = cache.populate().await.unwrap();
        assert_eq!(report, RefreshReport { refreshed: 2, failed: 0 });
        assert_eq!(cache.state(), CacheState::Populated);

        let entries = cache.snapshot().await.unwrap();
        assert_eq!(entries[0].most_recent_riff.as_ref().unwrap().id, "r2");
        assert!(entries[1].most_recent_riff.is_none());

        let synopsis = cache.synopsis();
        assert_eq!(synopsis.timestamp, 200);
        assert_eq!(synopsis.user, "bob");
        assert_eq!(synopsis.jam_name, "jam 1");
    }

    #[tokio::test]
    async fn test_failed_jam_keeps_previous_entry() {
        let store = MemoryDocumentStore::new();
        let a = jam(1);
        add_riff(&store, &a, "r1", "ann", 100);

        let cache = PublicJamStateCache::new(store.clone(), &[a]);
        cache.populate().await.unwrap();

        store.set_offline(true).unwrap();
        let report = cache.refresh().await.unwrap();
        assert_eq!(report.failed, 1);
        store.set_offline(false).unwrap();

        let entries = cache.snapshot().await.unwrap();
        assert_eq!(entries[0].most_recent_riff.as_ref().unwrap().id, "r1");
        assert_eq!(cache.synopsis().timestamp, 100);
    }

    #[tokio::test]
    async fn test_stopped_cache_refuses_readers() {
        let store = MemoryDocumentStore::new();
        let cache = PublicJamStateCache::new(store, &[]);
        cache.populate().await.unwrap();
        cache.stop();
        assert!(matches!(cache.snapshot().await, Err(CacheError::Stopped)));
        assert_eq!(cache.state(), CacheState::Stopped);
    }
}
