use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use common::identifiers::IdentifierResolver;
use cosm_daemon::config::{ConfigError, ServerConfig};
use cosm_daemon::export::{Exporter, FetchError, HttpAssetFetcher};
use common::store::CouchStore;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("identifier table error: {0}")]
    Identifier(#[from] common::identifiers::IdentifierError),
    #[error("asset client error: {0}")]
    Fetch(#[from] FetchError),
}

#[derive(Clone, Debug)]
pub struct OpContext {
    /// Path to the server config file
    pub config_path: PathBuf,
}

impl OpContext {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn load_config(&self) -> Result<ServerConfig, ConfigError> {
        ServerConfig::load(&self.config_path)
    }

    /// Exporter wired to the configured store, identifier table and an https asset client
    pub fn exporter(&self) -> Result<Exporter<CouchStore, HttpAssetFetcher>, ContextError> {
        let config = self.load_config()?;
        let resolver = IdentifierResolver::load(&config.server.id_bank)?;
        Ok(Exporter::new(
            config.couch_store()?,
            HttpAssetFetcher::new()?,
            Arc::new(resolver),
            config.server_code(),
        ))
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
