// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Export, ExportSolo, Serve, Version};

use cosm_daemon::config::ServerConfig;
use cosm_daemon::process::init_logging;

command_enum! {
    (Export, Export),
    (ExportSolo, ExportSolo),
    (Serve, Serve),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // a missing config only matters to the commands that need one
    let log_dir = ServerConfig::load(&args.config_path)
        .ok()
        .and_then(|config| config.server.log_dir);
    let _guards = init_logging(args.log_level, log_dir.as_deref());

    let ctx = cli::op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
