//! Generic per-entity CRUD over one connection.

use std::sync::Arc;

use quarry_db::{Database, Row, Value};

use crate::entity::EntityDescriptor;
use crate::error::OrmError;
use crate::query::QueryBuilder;
use crate::record::Record;
use crate::schema::render_schema;

/// CRUD interface bound to one connection and one entity.
///
/// Construction checks the catalog once and creates the table when it is
/// missing. The live table is never compared against the descriptor
/// afterwards, so a table altered or dropped behind the repository's back
/// surfaces as statement failures.
///
/// Writes are not committed here; call [`Database::commit`].
#[derive(Debug)]
pub struct Repository<'db> {
    db: &'db Database,
    entity: Arc<EntityDescriptor>,
    created_table: bool,
}

impl<'db> Repository<'db> {
    /// Binds `entity` to `db`, creating its table if absent.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Database` if the catalog lookup fails or the
    /// schema script is rejected (`DbError::SchemaFailure`).
    pub fn new(db: &'db Database, entity: Arc<EntityDescriptor>) -> Result<Self, OrmError> {
        let found = db.execute(
            "select name from sqlite_master where type = ?1 and name = ?2;",
            &[Value::from("table"), Value::from(entity.name())],
        )?;

        let created_table = found.is_empty();
        if created_table {
            let ddl = render_schema(&entity);
            tracing::info!(table = entity.name(), "creating table");
            db.executescript(&ddl)?;
        }

        Ok(Self {
            db,
            entity,
            created_table,
        })
    }

    pub fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    pub fn db(&self) -> &'db Database {
        self.db
    }

    /// Whether construction had to create the table.
    pub fn created_table(&self) -> bool {
        self.created_table
    }

    /// A query builder over this entity and connection.
    pub fn query(&self) -> QueryBuilder<'db> {
        QueryBuilder::new(self.db, Arc::clone(&self.entity))
    }

    /// Builds a record from a row already read from storage.
    pub fn hydrate(&self, row: &Row) -> Record {
        Record::hydrate(&self.entity, row)
    }

    /// Every stored record, in storage order.
    ///
    /// Each call runs a fresh query.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Database` on SQL failure.
    pub fn all(&self) -> Result<Records, OrmError> {
        let sql = format!("select * from {};", self.entity.name());
        let rows = self.db.execute(&sql, &[])?;
        Ok(Records::new(Arc::clone(&self.entity), rows.into_rows()))
    }

    /// Fetches one record by primary key.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::NotFound` if no row has this id.
    pub fn get(&self, id: i64) -> Result<Record, OrmError> {
        let sql = format!("select * from {} where id = ?1;", self.entity.name());
        let rows = self.db.execute(&sql, &[Value::Integer(id)])?;
        rows.rows()
            .first()
            .map(|row| self.hydrate(row))
            .ok_or_else(|| OrmError::NotFound {
                entity: self.entity.name().to_string(),
                id,
            })
    }

    /// Whether a row with this primary key exists.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Database` on SQL failure.
    pub fn has(&self, id: i64) -> Result<bool, OrmError> {
        let sql = format!("select id from {} where id = ?1;", self.entity.name());
        let rows = self.db.execute(&sql, &[Value::Integer(id)])?;
        Ok(!rows.is_empty())
    }

    /// Inserts `record` and stamps it with the generated id.
    ///
    /// A record carrying an id that is not stored is inserted under a fresh
    /// id, replacing the one it carried.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::DuplicateId` if the record's id is already stored
    /// (the table is left untouched), or `OrmError::EntityMismatch` for a
    /// record of another entity.
    pub fn save(&self, record: &mut Record) -> Result<i64, OrmError> {
        self.check_entity(record)?;

        if let Some(id) = record.id() {
            if self.has(id)? {
                return Err(OrmError::DuplicateId {
                    entity: self.entity.name().to_string(),
                    id,
                });
            }
        }

        let (columns, params): (Vec<&str>, Vec<Value>) = record
            .persisted()
            .map(|(field, value)| (field.name(), value.clone()))
            .unzip();

        let sql = if columns.is_empty() {
            format!("insert into {} default values;", self.entity.name())
        } else {
            let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{i}")).collect();
            format!(
                "insert into {} ({}) values ({});",
                self.entity.name(),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let outcome = self.db.execute(&sql, &params)?;
        let id = outcome.last_insert_id();
        record.assign_id(id);

        tracing::debug!(table = self.entity.name(), id, "saved record");
        Ok(id)
    }

    /// Overwrites every persisted field of the stored row with `record`'s
    /// values. Nothing happens if the row no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::MissingId` for an unsaved record.
    pub fn update(&self, record: &Record) -> Result<(), OrmError> {
        self.check_entity(record)?;
        let id = self.require_id(record)?;

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (field, value) in record.persisted() {
            params.push(value.clone());
            assignments.push(format!("{} = ?{}", field.name(), params.len()));
        }
        if assignments.is_empty() {
            return Ok(());
        }
        params.push(Value::Integer(id));

        let sql = format!(
            "update {} set {} where id = ?{};",
            self.entity.name(),
            assignments.join(", "),
            params.len()
        );
        let outcome = self.db.execute(&sql, &params)?;

        tracing::debug!(
            table = self.entity.name(),
            id,
            changes = outcome.changes(),
            "updated record"
        );
        Ok(())
    }

    /// Removes the row for `record`'s id, if it exists.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::MissingId` for an unsaved record.
    pub fn delete(&self, record: &Record) -> Result<(), OrmError> {
        self.check_entity(record)?;
        let id = self.require_id(record)?;

        let sql = format!("delete from {} where id = ?1;", self.entity.name());
        let outcome = self.db.execute(&sql, &[Value::Integer(id)])?;

        tracing::debug!(
            table = self.entity.name(),
            id,
            changes = outcome.changes(),
            "deleted record"
        );
        Ok(())
    }

    fn check_entity(&self, record: &Record) -> Result<(), OrmError> {
        if Arc::ptr_eq(record.entity(), &self.entity) || **record.entity() == *self.entity {
            Ok(())
        } else {
            Err(OrmError::EntityMismatch {
                expected: self.entity.name().to_string(),
                found: record.entity().name().to_string(),
            })
        }
    }

    fn require_id(&self, record: &Record) -> Result<i64, OrmError> {
        record
            .id()
            .ok_or_else(|| OrmError::MissingId(self.entity.name().to_string()))
    }
}

/// Records hydrated one by one from an already fetched result.
#[derive(Debug)]
pub struct Records {
    entity: Arc<EntityDescriptor>,
    rows: std::vec::IntoIter<Row>,
}

impl Records {
    pub(crate) fn new(entity: Arc<EntityDescriptor>, rows: Vec<Row>) -> Self {
        Self {
            entity,
            rows: rows.into_iter(),
        }
    }
}

impl Iterator for Records {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.rows
            .next()
            .map(|row| Record::hydrate(&self.entity, &row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Records {}
