pub use clap::Parser;

use std::path::PathBuf;

use cosm_daemon::config::DEFAULT_CONFIG_FILE;

#[derive(Parser, Debug)]
#[command(name = "cosm")]
#[command(about = "Private COSM server: jam archival exports and public jam state")]
pub struct Args {
    /// Path to the server config file
    #[arg(long = "config", global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config_path: PathBuf,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: crate::Command,
}
