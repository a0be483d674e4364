//! Resilient connection lifecycle for pooled network resources
//!
//! [`ResilientConnection`] owns at most one live pool handle produced by a
//! [`ResourceDriver`]. It dials through the retry orchestrator, verifies the
//! pool with a bounded ping, gates every operation on the handle being
//! present, and can run a background health monitor.
//!
//! # Example
//!
//! ```ignore
//! use wharf_connection::{ConnectionSettings, ResilientConnection};
//! use wharf_core::{Context, Logger};
//!
//! let conn = ResilientConnection::new(driver, ConnectionSettings::default(), Logger::current());
//! let ctx = Context::background();
//! conn.connect(&ctx).await?;
//! conn.start_health_monitor(&ctx);
//! // ...
//! ctx.cancel();
//! conn.close().await?;
//! ```

mod connection;
mod driver;
mod health;
mod monitor;
mod settings;


pub use connection::{ConnectionState, ResilientConnection};
pub use driver::ResourceDriver;
pub use health::{HealthReport, HealthStatus, HealthThresholds};
pub use settings::ConnectionSettings;
