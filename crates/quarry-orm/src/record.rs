//! Entity instances and their public view.

use std::fmt;
use std::sync::Arc;

use quarry_db::{Row, Value};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Number, Value as JsonValue};

use crate::entity::{EntityDescriptor, FieldDef};
use crate::error::OrmError;

/// One instance of an entity: a value for every declared field plus the
/// primary key once persisted.
///
/// Values are held in declaration order and always match the descriptor's
/// field set; unset fields are `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: Arc<EntityDescriptor>,
    id: Option<i64>,
    values: Vec<Value>,
}

impl Record {
    /// An unsaved record with every field `Null`.
    pub fn new(entity: &Arc<EntityDescriptor>) -> Self {
        Self {
            entity: Arc::clone(entity),
            id: None,
            values: vec![Value::Null; entity.fields().len()],
        }
    }

    /// An unsaved record populated from `(field, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidColumn` for undeclared fields and
    /// `OrmError::TypeMismatch` for values of the wrong type.
    pub fn with_values<I, K, V>(entity: &Arc<EntityDescriptor>, values: I) -> Result<Self, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Self::new(entity);
        for (field, value) in values {
            record.set(field.as_ref(), value)?;
        }
        Ok(record)
    }

    /// Builds a record from a storage row.
    ///
    /// Stored values are trusted and copied without type checks. Columns the
    /// descriptor does not persist are ignored; persisted fields absent from
    /// the row (narrow projections) stay `Null`.
    pub fn hydrate(entity: &Arc<EntityDescriptor>, row: &Row) -> Self {
        let mut record = Self::new(entity);
        for (column, value) in row.iter() {
            if column == "id" {
                record.id = value.as_i64();
                continue;
            }
            if let Some(idx) = entity.index_of(column) {
                if !entity.fields()[idx].is_internal() {
                    record.values[idx] = value.clone();
                }
            }
        }
        record
    }

    pub fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    /// Primary key, present once the record has been saved.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    /// Current value of a declared field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entity
            .index_of(field)
            .and_then(|idx| self.values.get(idx))
    }

    /// Sets a declared field, internal ones included.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidColumn` if `field` is not declared and
    /// `OrmError::TypeMismatch` if the value does not fit its type.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), OrmError> {
        let idx = self
            .entity
            .index_of(field)
            .ok_or_else(|| self.entity.invalid_column(field))?;
        let value = self.entity.check_value(&self.entity.fields()[idx], value.into())?;
        self.values[idx] = value;
        Ok(())
    }

    /// Every declared field with its value, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entity
            .fields()
            .iter()
            .map(FieldDef::name)
            .zip(self.values.iter())
    }

    /// Fields that map to table columns, with their values.
    pub(crate) fn persisted(&self) -> impl Iterator<Item = (&FieldDef, &Value)> {
        self.entity
            .fields()
            .iter()
            .zip(self.values.iter())
            .filter(|(field, _)| !field.is_internal())
    }

    /// The externally visible fields: `id` when set, then every
    /// non-internal field.
    pub fn public(&self) -> Map<String, JsonValue> {
        let mut map = Map::new();
        if let Some(id) = self.id {
            map.insert("id".to_string(), JsonValue::from(id));
        }
        for (field, value) in self.persisted() {
            map.insert(field.name().to_string(), to_json(value));
        }
        map
    }
}

fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(v) => JsonValue::from(*v),
        Value::Real(v) => Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
        Value::Text(v) => JsonValue::String(v.clone()),
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.public().serialize(serializer)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", JsonValue::Object(self.public()))
    }
}
