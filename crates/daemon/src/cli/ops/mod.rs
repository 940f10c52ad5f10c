pub mod export;
pub mod export_solo;
pub mod serve;
pub mod version;

pub use export::Export;
pub use export_solo::ExportSolo;
pub use serve::Serve;
pub use version::Version;
