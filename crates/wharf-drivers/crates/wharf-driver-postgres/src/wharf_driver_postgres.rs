//! PostgreSQL driver for Wharf
//!
//! [`PostgresDriver`] plugs a `deadpool-postgres` pool into
//! [`ResilientConnection`](wharf_connection::ResilientConnection), and
//! [`Database`] layers statement helpers and transactions on top of it.

mod database;
#[cfg(test)]
mod database_tests;
mod driver;
#[cfg(test)]
mod driver_tests;
mod error;
mod tls;

pub use database::{Database, IsolationLevel, Transaction, TransactionOptions};
pub use driver::{PgPool, PostgresDriver, connection_settings};
pub use error::BackendError;
pub use tokio_postgres::Row;
pub use tokio_postgres::types::ToSql;
