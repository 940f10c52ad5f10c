pub mod curated;
pub mod manifest;
mod not_found;
pub mod status;

pub use not_found::not_found_handler;
