//! Minimal object-relational mapping over SQLite.
//!
//! Entities are declared once as an [`EntityDescriptor`]: a name plus an
//! ordered list of primitive fields. From that declaration the crate
//! synthesizes the table, provides a generic [`Repository`] for CRUD, a
//! [`QueryBuilder`] for filtered selects, updates and deletes, and
//! active-record helpers on [`Record`] and [`Model`].
//!
//! # Persisted layout
//!
//! One table per entity, named after it: `id integer primary key
//! autoincrement` followed by one column per field, typed by
//!
//! | Field type | Column type |
//! |------------|-------------|
//! | `String`   | `text`      |
//! | `Integer`  | `integer`   |
//! | `Real`     | `real`      |
//!
//! There is no migration path: changing a descriptor requires changing the
//! table by hand. Fields whose name starts with `_` live only in memory.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quarry_db::Database;
//! use quarry_orm::{
//!     Comparator, Connective, EntityDescriptor, FieldType, Record, Repository, Value,
//! };
//!
//! let person = EntityDescriptor::builder("Person")
//!     .field("name", FieldType::String)
//!     .field("age", FieldType::Integer)
//!     .build()?;
//!
//! let db = Database::open("people.db", Default::default());
//! let people = Repository::new(&db, person.clone())?;
//!
//! let mut ann = Record::with_values(&person, [("name", Value::from("Ann")), ("age", Value::from(30))])?;
//! people.save(&mut ann)?;
//! db.commit()?;
//!
//! let mut query = people.query();
//! let thirty: Vec<Record> = query
//!     .filter(Comparator::Equal, Connective::And, [("age", 30)])?
//!     .limit(10)
//!     .select(&[])?
//!     .collect();
//! ```

mod entity;
mod error;
mod model;
mod query;
mod record;
mod repository;
mod schema;

pub use entity::{EntityBuilder, EntityDescriptor, FieldDef, FieldType, INTERNAL_MARKER};
pub use error::OrmError;
pub use model::Model;
pub use query::{Comparator, Connective, QueryBuilder, Statement};
pub use record::Record;
pub use repository::{Records, Repository};
pub use schema::render_schema;

pub use quarry_db::{Database, DbError, DbSettings, Value};

#[cfg(test)]
mod tests;
