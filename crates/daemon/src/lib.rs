// Server modules
pub mod config;
pub mod http_server;
pub mod process;
pub mod public_jams;
pub mod service_state;
pub mod version;

// Archival exports
pub mod export;

pub use config::ServerConfig;
pub use process::{spawn_service, start_service, ShutdownHandle};
pub use service_state::{ServiceState, StateError};
