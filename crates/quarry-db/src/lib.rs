//! Connection layer for the Quarry mapper.
//!
//! Wraps a single SQLite connection (via `rusqlite`) behind a lazily
//! connecting proxy, defines the scalar [`Value`] model shared with the
//! mapping layer, and provides configuration and logging bootstrap for
//! applications that embed it.
//!
//! # Design decisions
//!
//! - **One connection per proxy**: no pooling. A [`Database`] opens its
//!   handle on first use and keeps it until [`Database::close`].
//! - **Bound parameters only**: [`Database::execute`] takes SQL text and a
//!   parameter slice; values never become part of the statement text.
//! - **Deferred commit**: writes run inside an implicit transaction that the
//!   caller finalises, unless `autocommit` is configured.

mod config;
mod connection;
mod error;
mod logging;
mod value;

pub use config::{load_config, Config, ConfigError, DatabaseConfig, LoggingConfig};
pub use connection::{Database, DbSettings};
pub use error::DbError;
pub use logging::{env_filter, init_logging, LoggingError};
pub use value::{ResultSet, Row, Value};
