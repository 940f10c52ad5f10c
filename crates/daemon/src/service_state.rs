use std::sync::Arc;

use common::identifiers::{IdentifierError, IdentifierResolver};
use common::store::{CouchStore, DocumentStore};

use crate::config::{ConfigError, JamManifest, ManifestEntry, ServerConfig};
use crate::public_jams::{self, preflight, CacheError, CuratedJam, PublicJamStateCache};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("identifier table error: {0}")]
    Identifier(#[from] IdentifierError),
    #[error("public jam cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Everything the running server shares between its tasks, built once at boot
#[derive(Debug)]
pub struct ServiceState<S = CouchStore> {
    inner: Arc<Inner<S>>,
}

#[derive(Debug)]
struct Inner<S> {
    jams: Vec<ManifestEntry>,
    public_jams: Arc<PublicJamStateCache<S>>,
}

impl<S> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl ServiceState<CouchStore> {
    pub async fn from_config(config: &ServerConfig) -> Result<Self, StateError> {
        let resolver = IdentifierResolver::load(&config.server.id_bank)?;
        let manifest = config.load_jam_manifest()?;
        let store = config.couch_store()?;
        tracing::info!(couch = %store.base_url(), "using document store");
        Self::from_parts(store, &resolver, &manifest).await
    }
}

impl<S: DocumentStore> ServiceState<S> {
    /// Resolve the curated set, sync jam profiles and run the first cache pass
    pub async fn from_parts(
        store: S,
        resolver: &IdentifierResolver,
        manifest: &JamManifest,
    ) -> Result<Self, StateError> {
        let curated = public_jams::curated_jams(manifest, resolver)?;

        for declaration in manifest.all() {
            let jam = match CuratedJam::resolve(declaration, resolver) {
                Ok(jam) => jam,
                Err(e) => {
                    tracing::warn!(cosmid = %declaration.cosmid, error = %e, "skipping profile sync");
                    continue;
                }
            };
            if let Err(e) = preflight::sync_jam_profile(&store, &jam).await {
                tracing::warn!(cosmid = %jam.cosmid, error = %e, "profile sync failed");
            }
        }

        let public_jams = Arc::new(PublicJamStateCache::new(store, &curated));
        public_jams.populate().await?;

        Ok(Self {
            inner: Arc::new(Inner {
                jams: manifest.entries(),
                public_jams,
            }),
        })
    }

    /// Every jam the server hosts, public or not
    pub fn jams(&self) -> &[ManifestEntry] {
        &self.inner.jams
    }

    pub fn public_jams(&self) -> &Arc<PublicJamStateCache<S>> {
        &self.inner.public_jams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JamDeclaration;
    use common::identifiers::IdentifierRecord;
    use common::store::{jam_database, MemoryDocumentStore};

    fn resolver() -> IdentifierResolver {
        IdentifierResolver::from_records(vec![
            IdentifierRecord {
                cosmid: "jam_001".to_string(),
                couch_id: "band2f1f1597b0".to_string(),
                long_id: "5a157ceaf13a7fc6".to_string(),
            },
            IdentifierRecord {
                cosmid: "jam_002".to_string(),
                couch_id: "band606301f6f2".to_string(),
                long_id: "4ff9a55ab372aa8c".to_string(),
            },
        ])
        .unwrap()
    }

    fn declaration(cosmid: &str, name: &str) -> JamDeclaration {
        JamDeclaration {
            cosmid: cosmid.to_string(),
            name: name.to_string(),
            bio: String::new(),
            members: vec![],
        }
    }

    #[tokio::test]
    async fn test_boot_populates_and_syncs_profiles() {
        let store = MemoryDocumentStore::new();
        store.create_database(&jam_database("band2f1f1597b0")).unwrap();
        store.create_database(&jam_database("band606301f6f2")).unwrap();
        let manifest = JamManifest {
            public: vec![declaration("jam_001", "public one")],
            private: vec![declaration("jam_002", "private two")],
        };

        let state = ServiceState::from_parts(store.clone(), &resolver(), &manifest)
            .await
            .unwrap();

        let entries = state.public_jams().snapshot().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].jam_id, "5a157ceaf13a7fc6");

        let jams = state.jams();
        assert_eq!(jams.len(), 2);
        assert!(jams[0].is_public);
        assert_eq!(jams[1].cosmid, "jam_002");
        assert!(!jams[1].is_public);

        let profile = store
            .get(&jam_database("band606301f6f2"), "Profile")
            .await
            .unwrap();
        assert_eq!(profile["displayName"], "private two");
    }

    #[tokio::test]
    async fn test_unknown_public_jam_fails_boot() {
        let manifest = JamManifest {
            public: vec![declaration("jam_999", "nobody")],
            private: vec![],
        };
        let err = ServiceState::from_parts(MemoryDocumentStore::new(), &resolver(), &manifest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::Cache(CacheError::Identifier(IdentifierError::Unresolved(_)))
        ));
    }
}
