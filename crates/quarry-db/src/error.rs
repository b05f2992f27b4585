//! Error types for the connection proxy.

/// Errors raised by [`Database`](crate::Database) operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Opening the database, or preparing, executing or committing a
    /// statement, failed in the driver.
    #[error("database connection failure: {0}")]
    ConnectionFailure(#[from] rusqlite::Error),

    /// A schema script failed to execute.
    #[error("schema script failed: {0}")]
    SchemaFailure(#[source] rusqlite::Error),

    /// A result column held a type the value model cannot represent.
    #[error("cannot decode column '{column}': {source}")]
    Decode {
        /// Name of the offending column.
        column: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },
}
