//! Lazily connecting proxy around a single SQLite connection.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{params_from_iter, Connection, OpenFlags, Statement};

use crate::error::DbError;
use crate::value::{ResultSet, Row, Value};

/// Runtime tunables for the proxied connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbSettings {
    /// Busy timeout for the SQLite connection, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Commit every write immediately instead of opening an implicit
    /// transaction that the caller finalises with [`Database::commit`].
    pub autocommit: bool,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            autocommit: false,
        }
    }
}

/// Owns at most one SQLite connection, opened on first use.
///
/// Write statements start an implicit transaction when none is open, so
/// inserts, updates and deletes are only durable after [`commit`]. Schema
/// scripts run through [`executescript`] commit on their own.
///
/// The handle lives in a `RefCell`: a `Database` can move between threads
/// but cannot be shared by them. Serialise access externally (one proxy per
/// worker, or a mutex around it).
///
/// [`commit`]: Database::commit
/// [`executescript`]: Database::executescript
#[derive(Debug)]
pub struct Database {
    path: String,
    settings: DbSettings,
    conn: RefCell<Option<Connection>>,
}

impl Database {
    /// Records the connection target without touching the filesystem.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file. Use `:memory:` for an
    ///   in-memory database (useful for testing).
    pub fn open(path: impl Into<String>, settings: DbSettings) -> Self {
        Self {
            path: path.into(),
            settings,
            conn: RefCell::new(None),
        }
    }

    /// A private in-memory database with default settings.
    pub fn in_memory() -> Self {
        Self::open(":memory:", DbSettings::default())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn settings(&self) -> DbSettings {
        self.settings
    }

    /// Whether a connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.conn.borrow().is_some()
    }

    /// Whether a transaction is open on the current connection.
    pub fn in_transaction(&self) -> bool {
        self.conn
            .borrow()
            .as_ref()
            .is_some_and(|conn| !conn.is_autocommit())
    }

    fn connect(&self) -> Result<Connection, DbError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(Duration::from_millis(self.settings.busy_timeout_ms))?;

        tracing::info!(path = %self.path, "opened database connection");
        Ok(conn)
    }

    /// Runs `f` against the cached connection, establishing it first if
    /// needed.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut slot = self.conn.borrow_mut();
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };
        let result = f(&conn);
        *slot = Some(conn);
        result
    }

    /// Executes one statement with positional parameters bound in order.
    ///
    /// Values are never spliced into `sql`; every `?` placeholder is bound
    /// from `params`. Queries return their rows fully materialised; writes
    /// report the change count and the last inserted row id.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailure` if the connection cannot be
    /// opened or the statement fails, and `DbError::Decode` if a column
    /// holds a BLOB.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet, DbError> {
        tracing::debug!(sql, params = params.len(), "executing statement");

        let autocommit = self.settings.autocommit;
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;

            let began = !autocommit && !stmt.readonly() && conn.is_autocommit();
            if began {
                conn.execute_batch("BEGIN")?;
            }

            match run_statement(conn, &mut stmt, params) {
                Err(e) if began => {
                    // Undo only the transaction this call opened; earlier
                    // uncommitted writes are the caller's to finalise.
                    if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                        tracing::warn!(error = %rollback, "rollback after failed statement failed");
                    }
                    Err(e)
                }
                result => result,
            }
        })
    }

    /// Executes a batch of `;`-separated statements, then commits.
    ///
    /// # Errors
    ///
    /// Returns `DbError::SchemaFailure` if any statement in the script
    /// fails, or `DbError::ConnectionFailure` if the connection cannot be
    /// opened or the commit fails.
    pub fn executescript(&self, script: &str) -> Result<(), DbError> {
        tracing::debug!(script, "executing script");

        self.with_connection(|conn| {
            conn.execute_batch(script).map_err(DbError::SchemaFailure)?;
            if !conn.is_autocommit() {
                conn.execute_batch("COMMIT")?;
            }
            Ok(())
        })
    }

    /// Commits the open transaction, if any.
    ///
    /// A no-op when disconnected or when no transaction is open.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailure` if SQLite rejects the commit.
    pub fn commit(&self) -> Result<(), DbError> {
        let slot = self.conn.borrow();
        if let Some(conn) = slot.as_ref().filter(|conn| !conn.is_autocommit()) {
            conn.execute_batch("COMMIT")?;
            tracing::debug!(path = %self.path, "committed transaction");
        }
        Ok(())
    }

    /// Discards the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailure` if SQLite rejects the rollback.
    pub fn rollback(&self) -> Result<(), DbError> {
        let slot = self.conn.borrow();
        if let Some(conn) = slot.as_ref().filter(|conn| !conn.is_autocommit()) {
            conn.execute_batch("ROLLBACK")?;
            tracing::debug!(path = %self.path, "rolled back transaction");
        }
        Ok(())
    }

    /// Drops the connection. The next operation reconnects lazily.
    ///
    /// Uncommitted work is discarded. Closing an unconnected proxy is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailure` if SQLite reports an error while
    /// closing; the handle is released either way.
    pub fn close(&self) -> Result<(), DbError> {
        let Some(conn) = self.conn.borrow_mut().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| DbError::ConnectionFailure(e))?;
        tracing::info!(path = %self.path, "closed database connection");
        Ok(())
    }
}

/// Steps a prepared statement to completion and materialises its rows.
fn run_statement(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    params: &[Value],
) -> Result<ResultSet, DbError> {
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
        .into();

    let mut rows = Vec::new();
    let mut changes = 0;

    if columns.is_empty() {
        changes = stmt.execute(params_from_iter(params.iter()))?;
    } else {
        let mut cursor = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                let value = row
                    .get::<_, Value>(idx)
                    .map_err(|source| DbError::Decode {
                        column: column.clone(),
                        source,
                    })?;
                values.push(value);
            }
            rows.push(Row::new(Arc::clone(&columns), values));
        }
    }

    Ok(ResultSet {
        columns,
        rows,
        changes,
        last_insert_id: conn.last_insert_rowid(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> Database {
        let db = Database::in_memory();
        db.executescript("create table notes (id integer primary key autoincrement, body text);")
            .expect("schema should apply");
        db
    }

    #[test]
    fn connects_on_first_use() {
        let db = Database::in_memory();
        assert!(!db.is_connected(), "open should not connect");

        db.execute("select 1", &[]).expect("select should succeed");
        assert!(db.is_connected());
    }

    #[test]
    fn busy_timeout_matches_settings() {
        let db = Database::open(
            ":memory:",
            DbSettings {
                busy_timeout_ms: 2_500,
                autocommit: false,
            },
        );

        let result = db
            .execute("PRAGMA busy_timeout;", &[])
            .expect("should query busy_timeout");
        assert_eq!(result.rows()[0].values()[0], Value::Integer(2_500));
    }

    #[test]
    fn values_are_bound_not_interpolated() {
        let db = scratch();
        let hostile = "x'); drop table notes; --";

        let inserted = db
            .execute("insert into notes (body) values (?)", &[Value::from(hostile)])
            .expect("insert should succeed");
        assert_eq!(inserted.changes(), 1);
        assert_eq!(inserted.last_insert_id(), 1);

        let found = db
            .execute("select body from notes where id = ?", &[Value::Integer(1)])
            .expect("select should succeed");
        assert_eq!(found.rows()[0].get("body"), Some(&Value::from(hostile)));
    }

    #[test]
    fn writes_open_a_transaction_until_commit() {
        let db = scratch();
        assert!(!db.in_transaction());

        db.execute("insert into notes (body) values (?)", &[Value::from("a")])
            .expect("insert should succeed");
        assert!(db.in_transaction(), "write should leave a transaction open");

        db.commit().expect("commit should succeed");
        assert!(!db.in_transaction());

        db.commit().expect("second commit should be a no-op");
    }

    #[test]
    fn reads_do_not_open_a_transaction() {
        let db = scratch();
        db.execute("select * from notes", &[])
            .expect("select should succeed");
        assert!(!db.in_transaction());
    }

    #[test]
    fn rollback_discards_pending_writes() {
        let db = scratch();
        db.execute("insert into notes (body) values (?)", &[Value::from("a")])
            .expect("insert should succeed");
        db.rollback().expect("rollback should succeed");

        let rows = db
            .execute("select * from notes", &[])
            .expect("select should succeed");
        assert!(rows.is_empty());
    }

    #[test]
    fn autocommit_setting_skips_implicit_transaction() {
        let db = Database::open(
            ":memory:",
            DbSettings {
                autocommit: true,
                ..DbSettings::default()
            },
        );
        db.executescript("create table notes (id integer primary key, body text);")
            .expect("schema should apply");
        db.execute("insert into notes (body) values (?)", &[Value::from("a")])
            .expect("insert should succeed");
        assert!(!db.in_transaction());
    }

    #[test]
    fn executescript_commits_pending_writes() {
        let db = scratch();
        db.execute("insert into notes (body) values (?)", &[Value::from("a")])
            .expect("insert should succeed");

        db.executescript("create table other (id integer primary key);")
            .expect("script should succeed");
        assert!(!db.in_transaction());
    }

    #[test]
    fn broken_script_is_a_schema_failure() {
        let db = Database::in_memory();
        let err = db
            .executescript("create tabel nope (id integer);")
            .expect_err("malformed DDL should fail");
        match err {
            DbError::SchemaFailure(_) => {}
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn broken_statement_is_a_connection_failure() {
        let db = Database::in_memory();
        let err = db
            .execute("select * from missing_table", &[])
            .expect_err("unknown table should fail");
        match err {
            DbError::ConnectionFailure(_) => {}
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn failed_write_releases_its_own_transaction() {
        let db = Database::in_memory();
        db.executescript("create table notes (id integer primary key, body text not null);")
            .expect("schema should apply");

        let err = db
            .execute("insert into notes (body) values (?)", &[Value::Null])
            .expect_err("not-null constraint should fail");
        assert!(matches!(err, DbError::ConnectionFailure(_)));
        assert!(!db.in_transaction(), "failed write left a transaction open");
    }

    #[test]
    fn failed_write_keeps_earlier_pending_writes() {
        let db = Database::in_memory();
        db.executescript("create table notes (id integer primary key, body text not null);")
            .expect("schema should apply");
        db.execute("insert into notes (body) values (?)", &[Value::from("a")])
            .expect("insert should succeed");

        db.execute("insert into notes (body) values (?)", &[Value::Null])
            .expect_err("not-null constraint should fail");
        assert!(db.in_transaction());

        db.commit().expect("commit should succeed");
        let rows = db
            .execute("select body from notes", &[])
            .expect("select should succeed");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn unreachable_path_is_a_connection_failure() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("missing").join("sub").join("x.db");
        let db = Database::open(path.to_string_lossy(), DbSettings::default());

        let err = db
            .execute("select 1", &[])
            .expect_err("open should fail without the parent directory");
        match err {
            DbError::ConnectionFailure(_) => {}
            other => panic!("unexpected error type: {other:?}"),
        }
        assert!(!db.is_connected());
    }

    #[test]
    fn blob_columns_are_rejected() {
        let db = Database::in_memory();
        let err = db
            .execute("select x'00ff' as payload", &[])
            .expect_err("blob should not decode");
        match err {
            DbError::Decode { column, .. } => assert_eq!(column, "payload"),
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn close_is_idempotent_and_reconnects_lazily() {
        let db = scratch();
        db.close().expect("close should succeed");
        assert!(!db.is_connected());
        db.close().expect("second close should be a no-op");

        // A fresh in-memory database: the earlier table is gone.
        let err = db
            .execute("select * from notes", &[])
            .expect_err("table should not survive reconnect");
        assert!(matches!(err, DbError::ConnectionFailure(_)));
        assert!(db.is_connected());
    }
}
