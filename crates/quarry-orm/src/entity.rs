//! Entity type descriptors: the declared, fixed schema of a persisted type.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use quarry_db::Value;

use crate::error::OrmError;

/// Prefix marking a field as internal: carried on records, never persisted
/// or exposed.
pub const INTERNAL_MARKER: char = '_';

/// Primitive type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Stored as `text`.
    String,
    /// Stored as `integer`.
    Integer,
    /// Stored as `real`.
    Real,
}

impl FieldType {
    /// The column type used by the schema synthesizer.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::String => "text",
            Self::Integer => "integer",
            Self::Real => "real",
        }
    }

    /// Maps `value` onto this type, or hands it back if it does not fit.
    ///
    /// `Null` fits every type. Integers are widened for `Real` fields. NaN
    /// and infinities fit nothing: SQLite would store NaN as `NULL`.
    pub fn coerce(self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::String, v @ Value::Text(_)) => Ok(v),
            (Self::Integer, v @ Value::Integer(_)) => Ok(v),
            (Self::Real, Value::Real(v)) if v.is_finite() => Ok(Value::Real(v)),
            (Self::Real, Value::Integer(v)) => Ok(Value::Real(v as f64)),
            (_, other) => Err(other),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Real => "real",
        })
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    name: String,
    field_type: FieldType,
}

impl FieldDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Whether the field carries the internal marker.
    pub fn is_internal(&self) -> bool {
        self.name.starts_with(INTERNAL_MARKER)
    }
}

/// Name plus ordered field list of one persisted type.
///
/// Built once through [`EntityDescriptor::builder`] and shared behind an
/// `Arc`. The table name is the entity name, verbatim.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    name: String,
    fields: Vec<FieldDef>,
}

impl EntityDescriptor {
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every declared field, internal ones included, in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Fields that map to table columns, in declaration order.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_internal())
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Resolves a field usable in queries: declared and not internal.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidColumn` otherwise.
    pub fn column(&self, name: &str) -> Result<&FieldDef, OrmError> {
        self.fields
            .iter()
            .find(|f| f.name == name && !f.is_internal())
            .ok_or_else(|| self.invalid_column(name))
    }

    pub(crate) fn invalid_column(&self, name: &str) -> OrmError {
        OrmError::InvalidColumn {
            entity: self.name.clone(),
            column: name.to_string(),
        }
    }

    /// Coerces `value` to the type of `field`.
    pub(crate) fn check_value(&self, field: &FieldDef, value: Value) -> Result<Value, OrmError> {
        field
            .field_type
            .coerce(value)
            .map_err(|rejected| OrmError::TypeMismatch {
                entity: self.name.clone(),
                column: field.name.clone(),
                expected: field.field_type,
                found: rejected.type_name(),
            })
    }
}

/// Accumulates field declarations for an [`EntityDescriptor`].
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl EntityBuilder {
    /// Appends a field. Declaration order is column order.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
        });
        self
    }

    /// Validates the declaration and freezes it.
    ///
    /// Entity and field names must be plain SQL identifiers; field names
    /// must be unique (ignoring ASCII case, as SQLite does) and may not be
    /// `id`, which every table reserves for its primary key.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidDescriptor` describing the first problem.
    pub fn build(self) -> Result<Arc<EntityDescriptor>, OrmError> {
        if !is_identifier(&self.name) {
            return Err(OrmError::InvalidDescriptor(format!(
                "entity name {:?} is not an identifier",
                self.name
            )));
        }
        if self.name.to_ascii_lowercase().starts_with("sqlite_") {
            return Err(OrmError::InvalidDescriptor(format!(
                "entity name {:?} uses the reserved sqlite_ prefix",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(OrmError::InvalidDescriptor(format!(
                    "{}.{:?} is not an identifier",
                    self.name, field.name
                )));
            }
            let folded = field.name.to_ascii_lowercase();
            if folded == "id" {
                return Err(OrmError::InvalidDescriptor(format!(
                    "{}.{} collides with the primary key",
                    self.name, field.name
                )));
            }
            if !seen.insert(folded) {
                return Err(OrmError::InvalidDescriptor(format!(
                    "{}.{} is declared twice",
                    self.name, field.name
                )));
            }
        }

        Ok(Arc::new(EntityDescriptor {
            name: self.name,
            fields: self.fields,
        }))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
