use std::path::PathBuf;

use clap::Args;

use cosm_daemon::export::{ExportError, ExportOptions};

use crate::cli::op::ContextError;

/// Export every user's personal jam into a password protected bundle
#[derive(Args, Debug, Clone)]
pub struct ExportSolo {
    /// Root of the archive layout (_archives, _stems, _solos)
    #[arg(short = 'o', long = "out")]
    pub out: PathBuf,

    /// Server name written into the manifests and file names
    #[arg(short = 'p', long = "prefix")]
    pub prefix: String,

    /// Host serving stem audio; stems are not fetched without it
    #[arg(short = 's', long = "stem")]
    pub stem_host: Option<String>,

    /// Warn instead of failing a user when a stem cannot be fetched
    #[arg(short = 'i', long = "ignore-missing")]
    pub ignore_missing: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportSoloError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("solo export failed: {0}")]
    Export(#[from] ExportError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for ExportSolo {
    type Error = ExportSoloError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let options = ExportOptions {
            output_root: self.out.clone(),
            server_prefix: self.prefix.clone(),
            asset_host: self.stem_host.clone(),
            tolerate_missing_assets: self.ignore_missing,
        };
        let summary = ctx.exporter()?.export_solo_jams(&options).await?;
        Ok(summary.to_string())
    }
}
