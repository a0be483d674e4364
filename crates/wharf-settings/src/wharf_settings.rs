//! Wharf Settings
//!
//! Application settings for the database and cache resources:
//! - defaults matching a local development setup
//! - optional TOML file (`wharf.toml`)
//! - `APP_*` environment variable overrides
//! - validation before any resource is built

mod loader;
mod settings;

#[cfg(test)]
mod tests;

pub use loader::parse_duration;
pub use settings::*;
