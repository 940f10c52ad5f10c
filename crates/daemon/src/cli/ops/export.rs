use std::path::PathBuf;

use clap::Args;

use cosm_daemon::export::{ExportError, ExportOptions};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Export {
    /// Root of the archive layout (_archives, _stems)
    #[arg(short = 'o', long = "out")]
    pub out: PathBuf,

    /// Jam to export: a public COSMID (jam_001) or a user name
    #[arg(short = 'j', long = "jam")]
    pub jam: String,

    /// Server name written into the manifest and file names
    #[arg(short = 'p', long = "prefix")]
    pub prefix: String,

    /// Host serving stem audio; stems are not fetched without it
    #[arg(short = 's', long = "stem")]
    pub stem_host: Option<String>,

    /// Warn instead of failing when a stem cannot be fetched
    #[arg(short = 'i', long = "ignore-missing")]
    pub ignore_missing: bool,
}

impl Export {
    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            output_root: self.out.clone(),
            server_prefix: self.prefix.clone(),
            asset_host: self.stem_host.clone(),
            tolerate_missing_assets: self.ignore_missing,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportOpError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Export {
    type Error = ExportOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let exporter = ctx.exporter()?;
        let artifacts = exporter.export_jam(&self.jam, &self.options()).await?;

        Ok(artifacts
            .paths()
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
