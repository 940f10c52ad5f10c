//! Jam export into the archival format read by the LORE importer
//!
//! An export of one jam produces, under an output root:
//!
//! ```text
//! _archives/<basename>.yaml              manifest of every riff and stem
//! _archives/<basename>.tar               stem audio, when stems were fetched
//! _stems/<export id>/<shard>/<stem id>   download cache, reused across runs
//! _solos/<user>.solo_encrypted.zip       personal jam bundles (batch only)
//! ```
//!
//! The stem cache is trusted: a file already present is never fetched
//!  or checked again.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufWriter};

use common::documents::{JamProfile, RiffRecord, StemRecord, PROFILE_DOCUMENT_ID};
use common::identifiers::{IdentifierError, IdentifierResolver};
use common::store::{
    decode_document, jam_database, DocumentStore, StoreError, ViewPager, DEFAULT_PAGE_SIZE,
    RIFFS_BY_CREATE_TIME, STEMS_BY_CREATE_TIME, TYPES_DESIGN,
};

pub mod fetch;
pub mod manifest;
pub mod sanitize;
pub mod solo;
pub mod tarball;

pub use fetch::{AssetFetcher, FetchError, HttpAssetFetcher};
pub use sanitize::sanitize_name_for_path;
pub use solo::SoloExportSummary;

pub const ARCHIVES_DIR: &str = "_archives";
pub const STEMS_DIR: &str = "_stems";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("jam id cannot be empty")]
    EmptyJam,
    #[error("identifier unresolved: {0}")]
    IdentifierUnresolved(String),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("document store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("document missing: {0}")]
    DocumentMissing(#[source] StoreError),
    #[error("stem {stem} has no audio attachment")]
    AssetMissing { stem: String },
    #[error("stem {stem} from {url}: expected {expected} bytes, got {actual}")]
    AssetSizeMismatch {
        stem: String,
        url: String,
        expected: u64,
        actual: u64,
    },
    #[error("stem {stem} could not be fetched: {source}")]
    AssetFetch {
        stem: String,
        #[source]
        source: FetchError,
    },
    #[error("filesystem error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to build archive {path:?}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encrypt {path:?}: {reason}")]
    Encryption { path: PathBuf, reason: String },
}

impl From<IdentifierError> for ExportError {
    fn from(e: IdentifierError) -> Self {
        match e {
            IdentifierError::Empty => ExportError::EmptyJam,
            IdentifierError::Unresolved(id) => ExportError::IdentifierUnresolved(id),
            e @ IdentifierError::SchemaMismatch { .. } => ExportError::SchemaMismatch(e.to_string()),
            e => ExportError::IdentifierUnresolved(e.to_string()),
        }
    }
}

impl From<StoreError> for ExportError {
    fn from(e: StoreError) -> Self {
        match e {
            e if e.is_not_found() => ExportError::DocumentMissing(e),
            e @ StoreError::Decode { .. } => ExportError::SchemaMismatch(e.to_string()),
            e => ExportError::StoreUnavailable(e),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Per-invocation export settings
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// root of the archive layout, also the stem cache
    pub output_root: PathBuf,
    /// server name shown in the manifest and the file name
    pub server_prefix: String,
    /// host serving stem audio; without one stems are listed but not fetched
    pub asset_host: Option<String>,
    /// warn and carry on when a stem cannot be fetched
    pub tolerate_missing_assets: bool,
}

/// Files produced by one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifactSet {
    pub manifest: PathBuf,
    pub archive: Option<PathBuf>,
}

impl ExportArtifactSet {
    pub fn paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.manifest.clone())
            .chain(self.archive.clone())
            .collect()
    }
}

#[derive(Debug, Default)]
struct StemTally {
    written: usize,
    downloaded: usize,
    cached: usize,
    missing: usize,
}

/// File name shared by a jam's manifest and archive
pub fn export_basename(server_prefix: &str, display_name: &str, export_id: &str) -> String {
    format!(
        "orx.[{}]_{}.{}",
        server_prefix.to_lowercase(),
        sanitize_name_for_path(display_name, '_', false),
        export_id
    )
}

/// Writes jams out of the document store into the archival layout
#[derive(Debug, Clone)]
pub struct Exporter<S, F> {
    store: S,
    fetcher: F,
    resolver: Arc<IdentifierResolver>,
    server_code: String,
    page_size: u64,
}

impl<S: DocumentStore, F: AssetFetcher> Exporter<S, F> {
    pub fn new(store: S, fetcher: F, resolver: Arc<IdentifierResolver>, server_code: &str) -> Self {
        Self {
            store,
            fetcher,
            resolver,
            server_code: server_code.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Export one jam: a public COSMID, or a user name for a personal jam
    #[tracing::instrument(skip(self, options), fields(server = %options.server_prefix))]
    pub async fn export_jam(
        &self,
        jam: &str,
        options: &ExportOptions,
    ) -> Result<ExportArtifactSet, ExportError> {
        if jam.is_empty() {
            return Err(ExportError::EmptyJam);
        }

        let target = self.resolver.resolve_export_target(jam, &self.server_code)?;
        let database = jam_database(&target.store_id);
        tracing::info!(
            couch_id = %target.store_id,
            export_id = %target.export_id,
            "exporting jam"
        );

        let display_name = match target.display_name {
            Some(name) => name,
            None => {
                let document = self.store.get(&database, PROFILE_DOCUMENT_ID).await?;
                let profile: JamProfile =
                    decode_document(&database, PROFILE_DOCUMENT_ID, document)?;
                profile.display_name
            }
        };

        let basename = export_basename(&options.server_prefix, &display_name, &target.export_id);
        let archives_dir = options.output_root.join(ARCHIVES_DIR);
        tokio::fs::create_dir_all(&archives_dir)
            .await
            .map_err(io_error(&archives_dir))?;

        let manifest_path = archives_dir.join(format!("{}.yaml", basename));
        let file = tokio::fs::File::create(&manifest_path)
            .await
            .map_err(io_error(&manifest_path))?;
        let mut out = BufWriter::new(file);

        let header = manifest::header(
            &options.server_prefix,
            chrono::Utc::now().timestamp(),
            &display_name,
            &target.export_id,
        );
        write(&mut out, &manifest_path, &header).await?;

        let riffs = self.write_riffs(&mut out, &manifest_path, &database).await?;
        tracing::info!(riffs, "riffs written");

        let (tally, stem_files) = self
            .write_stems(&mut out, &manifest_path, &database, &target.export_id, options)
            .await?;
        out.flush().await.map_err(io_error(&manifest_path))?;
        tracing::info!(
            stems = tally.written,
            downloaded = tally.downloaded,
            cached = tally.cached,
            missing = tally.missing,
            "stems written"
        );

        let archive = if stem_files.is_empty() {
            None
        } else {
            let archive_path = archives_dir.join(format!("{}.tar", basename));
            let stems_base = options.output_root.join(STEMS_DIR);
            let entries =
                build_stem_archive(stems_base, target.export_id.clone(), stem_files, archive_path.clone())
                    .await?;
            tracing::info!(entries, archive = ?archive_path, "stem archive written");
            Some(archive_path)
        };

        Ok(ExportArtifactSet {
            manifest: manifest_path,
            archive,
        })
    }

    async fn write_riffs(
        &self,
        out: &mut BufWriter<tokio::fs::File>,
        manifest_path: &Path,
        database: &str,
    ) -> Result<usize, ExportError> {
        write(out, manifest_path, &manifest::riff_section_header()).await?;

        let mut count = 0;
        let mut pager = ViewPager::view(&self.store, database, TYPES_DESIGN, RIFFS_BY_CREATE_TIME)
            .with_page_size(self.page_size);
        while let Some(rows) = pager.next_page().await? {
            for row in rows {
                let riff: RiffRecord = row.decode_doc(database)?;
                write(out, manifest_path, &manifest::riff_line(&riff)).await?;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn write_stems(
        &self,
        out: &mut BufWriter<tokio::fs::File>,
        manifest_path: &Path,
        database: &str,
        export_id: &str,
        options: &ExportOptions,
    ) -> Result<(StemTally, Vec<PathBuf>), ExportError> {
        write(out, manifest_path, &manifest::stem_section_header()).await?;

        let mut tally = StemTally::default();
        let mut stem_files = Vec::new();
        let mut pager = ViewPager::view(&self.store, database, TYPES_DESIGN, STEMS_BY_CREATE_TIME)
            .with_page_size(self.page_size);
        while let Some(rows) = pager.next_page().await? {
            for row in rows {
                let stem: StemRecord = row.decode_doc(database)?;
                write(out, manifest_path, &manifest::stem_line(&stem)).await?;
                tally.written += 1;

                let Some(host) = options.asset_host.as_deref() else {
                    continue;
                };
                match self.fetch_stem(&stem, export_id, host, &mut tally, options).await {
                    Ok(path) => stem_files.push(path),
                    Err(e) if options.tolerate_missing_assets => {
                        tracing::warn!(stem = %stem.id, error = %e, "stem unavailable, continuing");
                        tally.missing += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok((tally, stem_files))
    }

    /// Make sure a stem's audio is in the cache, returning its path
    async fn fetch_stem(
        &self,
        stem: &StemRecord,
        export_id: &str,
        host: &str,
        tally: &mut StemTally,
        options: &ExportOptions,
    ) -> Result<PathBuf, ExportError> {
        let shard = stem.shard().ok_or_else(|| ExportError::SchemaMismatch(
            "stem with an empty id".to_string(),
        ))?;
        let shard_dir = options
            .output_root
            .join(STEMS_DIR)
            .join(export_id)
            .join(shard.to_string());
        tokio::fs::create_dir_all(&shard_dir)
            .await
            .map_err(io_error(&shard_dir))?;

        let path = shard_dir.join(&stem.id);
        if tokio::fs::try_exists(&path).await.map_err(io_error(&path))? {
            tally.cached += 1;
            return Ok(path);
        }

        let attachment = stem.active_attachment().ok_or_else(|| ExportError::AssetMissing {
            stem: stem.id.clone(),
        })?;
        let url = fetch::asset_url(host, &attachment.key).map_err(|source| {
            ExportError::AssetFetch {
                stem: stem.id.clone(),
                source,
            }
        })?;

        let result = match self.fetcher.fetch(&url, &path).await {
            Ok(actual) if actual == attachment.length => Ok(path.clone()),
            Ok(actual) => Err(ExportError::AssetSizeMismatch {
                stem: stem.id.clone(),
                url: url.to_string(),
                expected: attachment.length,
                actual,
            }),
            Err(source) => Err(ExportError::AssetFetch {
                stem: stem.id.clone(),
                source,
            }),
        };

        match result {
            Ok(path) => {
                tally.downloaded += 1;
                Ok(path)
            }
            Err(e) => {
                // never leave a partial file where the cache would trust it
                if let Err(remove) = tokio::fs::remove_file(&path).await {
                    if remove.kind() != io::ErrorKind::NotFound {
                        tracing::warn!(path = ?path, error = %remove, "failed to remove partial stem");
                    }
                }
                Err(e)
            }
        }
    }
}

async fn write(
    out: &mut BufWriter<tokio::fs::File>,
    path: &Path,
    text: &str,
) -> Result<(), ExportError> {
    out.write_all(text.as_bytes()).await.map_err(io_error(path))
}

async fn build_stem_archive(
    stems_base: PathBuf,
    export_id: String,
    stem_files: Vec<PathBuf>,
    archive_path: PathBuf,
) -> Result<usize, ExportError> {
    let output = archive_path.clone();
    tokio::task::spawn_blocking(move || {
        let directories = tarball::collect_directories(&stems_base.join(&export_id))?;
        tarball::write_archive(&stems_base, &directories, &stem_files, &output)
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    .and_then(|result| result)
    .map_err(|source| ExportError::Archive {
        path: archive_path,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basename() {
        assert_eq!(
            export_basename("CSMX", "5/4", "bandcsmxjam007"),
            "orx.[csmx]_5_4.bandcsmxjam007"
        );
        assert_eq!(
            export_basename("CSMX", "brubeck", "csmx_brubeck"),
            "orx.[csmx]_brubeck.csmx_brubeck"
        );
    }

    #[test]
    fn test_error_kinds() {
        let missing = StoreError::DocumentMissing {
            database: "db".to_string(),
            id: "Profile".to_string(),
        };
        assert!(matches!(ExportError::from(missing), ExportError::DocumentMissing(_)));

        let down = StoreError::Unavailable("refused".to_string());
        assert!(matches!(ExportError::from(down), ExportError::StoreUnavailable(_)));

        let unresolved = IdentifierError::Unresolved("jam_404".to_string());
        assert!(matches!(
            ExportError::from(unresolved),
            ExportError::IdentifierUnresolved(_)
        ));
    }

    #[test]
    fn test_artifact_paths() {
        let set = ExportArtifactSet {
            manifest: PathBuf::from("a.yaml"),
            archive: None,
        };
        assert_eq!(set.paths().len(), 1);
        let set = ExportArtifactSet {
            manifest: PathBuf::from("a.yaml"),
            archive: Some(PathBuf::from("a.tar")),
        };
        assert_eq!(set.paths(), vec![PathBuf::from("a.yaml"), PathBuf::from("a.tar")]);
    }
}
