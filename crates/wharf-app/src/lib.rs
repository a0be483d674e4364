//! Wharf service bootstrap
//!
//! Loads settings, installs logging, and runs the PostgreSQL and Redis
//! resources until shutdown.

pub mod app;
pub mod logging;

pub use app::{App, run};
pub use logging::{LoggingConfig, LoggingGuard};
