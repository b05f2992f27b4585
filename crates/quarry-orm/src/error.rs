//! Error types for the mapping layer.

use quarry_db::DbError;

use crate::entity::FieldType;

/// Errors that can occur in repository and query operations.
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// No row with this primary key exists.
    #[error("{entity} with id {id} does not exist")]
    NotFound {
        /// Entity (table) name.
        entity: String,
        /// The requested primary key.
        id: i64,
    },

    /// `save` was given a record whose id is already stored.
    #[error("{entity} id already registered: {id}")]
    DuplicateId {
        /// Entity (table) name.
        entity: String,
        /// The colliding primary key.
        id: i64,
    },

    /// A field name is undeclared, or names an internal field.
    #[error("invalid column \"{column}\" for {entity}")]
    InvalidColumn {
        /// Entity (table) name.
        entity: String,
        /// The rejected field name.
        column: String,
    },

    /// A value does not map onto the declared primitive type.
    #[error("{entity}.{column} expects {expected}, got {found}")]
    TypeMismatch {
        /// Entity (table) name.
        entity: String,
        /// Field name.
        column: String,
        /// Declared type of the field.
        expected: FieldType,
        /// Storage class of the offered value.
        found: &'static str,
    },

    /// The operation needs a persisted record.
    #[error("{0} record has no id")]
    MissingId(String),

    /// A record was passed to a repository for another entity.
    #[error("{found} record passed to the {expected} repository")]
    EntityMismatch {
        /// Entity of the repository.
        expected: String,
        /// Entity of the record.
        found: String,
    },

    /// `filter` was called after `limit`.
    #[error("cannot add predicates after a limit has been applied")]
    LimitApplied,

    /// An entity declaration was rejected by the descriptor builder.
    #[error("invalid entity declaration: {0}")]
    InvalidDescriptor(String),

    /// The connection proxy reported a failure.
    #[error(transparent)]
    Database(#[from] DbError),
}
