use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

use common::documents::UserRecord;
use common::store::{DocumentStore, ViewPager, USERS_DATABASE};

use super::fetch::AssetFetcher;
use super::{ExportError, ExportOptions, Exporter};

pub const SOLOS_DIR: &str = "_solos";
const SOLO_BUNDLE_SUFFIX: &str = ".solo_encrypted.zip";

/// Outcome of a personal jam batch, by user name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoloExportSummary {
    /// users with an encrypted bundle written
    pub exported: Vec<String>,
    /// users with nothing worth bundling
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl fmt::Display for SoloExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exported {} solo jams, skipped {}, failed {}",
            self.exported.len(),
            self.skipped.len(),
            self.failed.len()
        )?;
        if !self.failed.is_empty() {
            write!(f, " ({})", self.failed.join(", "))?;
        }
        Ok(())
    }
}

pub fn bundle_path(output_root: &Path, user: &str) -> PathBuf {
    output_root
        .join(SOLOS_DIR)
        .join(format!("{}{}", user, SOLO_BUNDLE_SUFFIX))
}

/// Write `files` into a zip at `output`, each entry stored under its file
///  name and AES-256 encrypted with `password`
pub fn write_encrypted_bundle(
    files: &[PathBuf],
    password: &str,
    output: &Path,
) -> Result<(), ExportError> {
    let encryption = |reason: String| ExportError::Encryption {
        path: output.to_path_buf(),
        reason,
    };
    if password.is_empty() {
        return Err(encryption("no secret to encrypt with".to_string()));
    }

    let result = (|| -> Result<(), ExportError> {
        let file = File::create(output).map_err(|source| ExportError::Io {
            path: output.to_path_buf(),
            source,
        })?;
        let mut zip = ZipWriter::new(BufWriter::new(file));

        for path in files {
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .with_aes_encryption(AesMode::Aes256, password);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| encryption(format!("{:?} has no file name", path)))?;
            let contents = std::fs::read(path).map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;

            zip.start_file(name.as_str(), options)
                .map_err(|e| encryption(format!("entry {}: {}", name, e)))?;
            zip.write_all(&contents)
                .map_err(|e| encryption(format!("entry {}: {}", name, e)))?;
        }

        let mut writer = zip.finish().map_err(|e| encryption(e.to_string()))?;
        writer.flush().map_err(|source| ExportError::Io {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(output);
    }
    result
}

impl<S: DocumentStore, F: AssetFetcher> Exporter<S, F> {
    /// Export every user's personal jam and lock each pair of artifacts
    ///  into a bundle keyed with that user's secret.
    ///
    /// Failures are isolated per user; only failing to list the users
    ///  at all fails the batch.
    pub async fn export_solo_jams(
        &self,
        options: &ExportOptions,
    ) -> Result<SoloExportSummary, ExportError> {
        let solos_dir = options.output_root.join(SOLOS_DIR);
        tokio::fs::create_dir_all(&solos_dir)
            .await
            .map_err(|source| ExportError::Io {
                path: solos_dir.clone(),
                source,
            })?;

        let mut summary = SoloExportSummary::default();
        let mut pager =
            ViewPager::all_docs(&self.store, USERS_DATABASE).with_page_size(self.page_size);

        while let Some(rows) = pager.next_page().await? {
            for row in rows.iter().filter(|row| !row.is_design_doc()) {
                let user: UserRecord = match row.decode_doc(USERS_DATABASE) {
                    Ok(user) => user,
                    Err(e) => {
                        tracing::error!(id = %row.id, error = %e, "unreadable user record");
                        summary.failed.push(row.id.clone());
                        continue;
                    }
                };
                if user.name.is_empty() {
                    tracing::debug!(id = %row.id, "skipping user record without a name");
                    continue;
                }

                self.export_solo_jam(&user, options, &mut summary).await;
            }
        }

        tracing::info!(
            exported = summary.exported.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "solo export finished"
        );
        Ok(summary)
    }

    async fn export_solo_jam(
        &self,
        user: &UserRecord,
        options: &ExportOptions,
        summary: &mut SoloExportSummary,
    ) {
        let artifacts = match self.export_jam(&user.name, options).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                tracing::error!(user = %user.name, error = %e, "solo export failed");
                summary.failed.push(user.name.clone());
                return;
            }
        };

        let files = artifacts.paths();
        if files.len() < 2 {
            tracing::warn!(user = %user.name, "no stem archive produced, nothing to bundle");
            summary.skipped.push(user.name.clone());
            return;
        }

        let output = bundle_path(&options.output_root, &user.name);
        let password = user.login.clone();
        let bundle_output = output.clone();
        let result = tokio::task::spawn_blocking(move || {
            write_encrypted_bundle(&files, &password, &bundle_output)
        })
        .await
        .unwrap_or_else(|e| {
            Err(ExportError::Encryption {
                path: output.clone(),
                reason: e.to_string(),
            })
        });

        match result {
            Ok(()) => {
                tracing::info!(user = %user.name, bundle = ?output, "solo jam bundled");
                summary.exported.push(user.name.clone());
            }
            Err(e) => {
                tracing::error!(user = %user.name, error = %e, "solo bundle failed");
                summary.failed.push(user.name.clone());
            }
        }
    }
}
