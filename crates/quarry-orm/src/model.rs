//! Active-record conveniences.
//!
//! [`Model`] pairs an entity with a default connection, so each
//! [`Database`] mints its own independent set of models. [`Record`] gets
//! `save`/`update`/`delete` methods that build a repository for the
//! record's own entity on the connection passed in.

use std::sync::Arc;

use quarry_db::{Database, Value};

use crate::entity::EntityDescriptor;
use crate::error::OrmError;
use crate::query::QueryBuilder;
use crate::record::Record;
use crate::repository::{Records, Repository};

/// An entity bound to its default connection.
#[derive(Debug, Clone)]
pub struct Model<'db> {
    db: &'db Database,
    entity: Arc<EntityDescriptor>,
}

impl<'db> Model<'db> {
    pub fn new(db: &'db Database, entity: Arc<EntityDescriptor>) -> Self {
        Self { db, entity }
    }

    pub fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    /// The default connection.
    pub fn db(&self) -> &'db Database {
        self.db
    }

    /// A repository on `db`, or on the default connection when `None`.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Database` if the table check or creation fails.
    pub fn manager<'a>(&'a self, db: Option<&'a Database>) -> Result<Repository<'a>, OrmError> {
        Repository::new(db.unwrap_or(self.db), Arc::clone(&self.entity))
    }

    /// An unsaved record of this entity.
    ///
    /// # Errors
    ///
    /// See [`Record::with_values`].
    pub fn record<I, K, V>(&self, values: I) -> Result<Record, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Record::with_values(&self.entity, values)
    }

    /// A query on the default connection, creating the table if needed.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Database` if the table check or creation fails.
    pub fn query(&self) -> Result<QueryBuilder<'db>, OrmError> {
        Ok(Repository::new(self.db, Arc::clone(&self.entity))?.query())
    }

    pub fn all(&self) -> Result<Records, OrmError> {
        self.manager(None)?.all()
    }

    pub fn get(&self, id: i64) -> Result<Record, OrmError> {
        self.manager(None)?.get(id)
    }

    pub fn save(&self, record: &mut Record) -> Result<i64, OrmError> {
        self.manager(None)?.save(record)
    }

    pub fn update(&self, record: &Record) -> Result<(), OrmError> {
        self.manager(None)?.update(record)
    }

    pub fn delete(&self, record: &Record) -> Result<(), OrmError> {
        self.manager(None)?.delete(record)
    }
}

impl Record {
    /// A repository for this record's entity on `db`.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Database` if the table check or creation fails.
    pub fn manager<'a>(&self, db: &'a Database) -> Result<Repository<'a>, OrmError> {
        Repository::new(db, Arc::clone(self.entity()))
    }

    /// Inserts this record through `db`. See [`Repository::save`].
    ///
    /// # Errors
    ///
    /// Returns `OrmError::DuplicateId` if the record's id is already stored.
    pub fn save(&mut self, db: &Database) -> Result<i64, OrmError> {
        self.manager(db)?.save(self)
    }

    /// Writes this record's fields back through `db`. See
    /// [`Repository::update`].
    ///
    /// # Errors
    ///
    /// Returns `OrmError::MissingId` for an unsaved record.
    pub fn update(&self, db: &Database) -> Result<(), OrmError> {
        self.manager(db)?.update(self)
    }

    /// Deletes this record's row through `db`. See [`Repository::delete`].
    ///
    /// # Errors
    ///
    /// Returns `OrmError::MissingId` for an unsaved record.
    pub fn delete(&self, db: &Database) -> Result<(), OrmError> {
        self.manager(db)?.delete(self)
    }
}
