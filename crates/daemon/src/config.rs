use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use common::store::{CouchStore, StoreError};

pub const DEFAULT_CONFIG_FILE: &str = "cosm.toml";

fn default_listen_port() -> u16 {
    8080
}

fn default_refresh_interval_secs() -> u64 {
    30
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("jam manifest parse error: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("server code must be exactly 4 ASCII characters, got {0:?}")]
    InvalidServerCode(String),
    #[error("refresh interval must be at least one second")]
    InvalidRefreshInterval,
    #[error("no jam manifest configured")]
    NoJamManifest,
    #[error("couch client: {0}")]
    Couch(#[from] StoreError),
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Connection to the document store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchConfig {
    pub url: Url,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// four character code identifying this server in export ids
    pub fourcc: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// identifier table, JSON
    pub id_bank: PathBuf,
    /// declared public and private jams, JSON; required to serve
    #[serde(default)]
    pub jam_manifest: Option<PathBuf>,
    /// directory for rolling log files, stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Contents of `cosm.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub couch: CouchConfig,
    pub server: ServerSection,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_toml(&read(path)?)?;
        tracing::debug!(path = ?path, server = %config.server.fourcc, "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let code = &self.server.fourcc;
        if code.len() != 4 || !code.is_ascii() {
            return Err(ConfigError::InvalidServerCode(code.clone()));
        }
        if self.server.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidRefreshInterval);
        }
        Ok(())
    }

    pub fn server_code(&self) -> &str {
        &self.server.fourcc
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.server.refresh_interval_secs)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.server.listen_port))
    }

    pub fn couch_store(&self) -> Result<CouchStore, ConfigError> {
        Ok(CouchStore::new(
            &self.couch.url,
            &self.couch.user,
            &self.couch.password,
        )?)
    }

    pub fn load_jam_manifest(&self) -> Result<JamManifest, ConfigError> {
        let path = self
            .server
            .jam_manifest
            .as_deref()
            .ok_or(ConfigError::NoJamManifest)?;
        JamManifest::load(path)
    }
}

/// One jam the server hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JamDeclaration {
    pub cosmid: String,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Contents of `jams.json`; public jams make up the curated list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JamManifest {
    #[serde(default)]
    pub public: Vec<JamDeclaration>,
    #[serde(default)]
    pub private: Vec<JamDeclaration>,
}

impl JamManifest {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let manifest: JamManifest = serde_json::from_str(&read(path)?)?;
        tracing::info!(
            path = ?path,
            public = manifest.public.len(),
            private = manifest.private.len(),
            "loaded jam manifest"
        );
        Ok(manifest)
    }

    pub fn all(&self) -> impl Iterator<Item = &JamDeclaration> {
        self.public.iter().chain(self.private.iter())
    }

    /// Every declared jam ordered by cosmid
    pub fn entries(&self) -> Vec<ManifestEntry> {
        let public = self.public.iter().map(|d| (d, true));
        let private = self.private.iter().map(|d| (d, false));
        let mut entries: Vec<ManifestEntry> = public
            .chain(private)
            .map(|(declaration, is_public)| ManifestEntry {
                cosmid: declaration.cosmid.clone(),
                name: declaration.name.clone(),
                is_public,
            })
            .collect();
        entries.sort_by(|a, b| a.cosmid.cmp(&b.cosmid));
        entries
    }
}

/// A hosted jam as listed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub cosmid: String,
    pub name: String,
    pub is_public: bool,
}
