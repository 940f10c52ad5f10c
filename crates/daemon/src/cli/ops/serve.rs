use clap::Args;

use cosm_daemon::config::ConfigError;
use cosm_daemon::process::{spawn_service, ServiceError};

/// Run the HTTP server and the public jam refresher
#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Override the listen port from the config file
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = ctx.load_config()?;
        if let Some(port) = self.port {
            config.server.listen_port = port;
        }

        spawn_service(&config).await?;
        Ok("server stopped".to_string())
    }
}
