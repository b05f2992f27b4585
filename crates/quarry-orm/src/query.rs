//! Fluent filtered select/update/delete over one entity.
//!
//! A [`QueryBuilder`] accumulates predicate and connective tokens, then
//! assembles a statement in which every value is a numbered parameter.
//! Column names come only from the entity descriptor.
//!
//! Chaining: each `filter` call joins its own clauses with its connective,
//! and joins them to the clauses already in the buffer with that same
//! connective. No parentheses are added, so SQL precedence applies:
//!
//! ```rust,ignore
//! query
//!     .filter(Comparator::Equal, Connective::And, [("age", 30)])?
//!     .filter(Comparator::Equal, Connective::Or, [("name", "Bo")])?;
//! // ... where age = ?1 OR name = ?2
//! ```

use std::sync::Arc;

use quarry_db::{Database, Value};

use crate::entity::EntityDescriptor;
use crate::error::OrmError;
use crate::repository::Records;

/// Predicate comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
}

impl Comparator {
    /// SQL operator for comparing against `value`; `Null` needs `is`.
    fn operator(self, value: &Value) -> &'static str {
        match (self, value.is_null()) {
            (Self::Equal, false) => "=",
            (Self::NotEqual, false) => "!=",
            (Self::Equal, true) => "is",
            (Self::NotEqual, true) => "is not",
        }
    }
}

/// Boolean operator joining predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Predicate {
        field: String,
        comparator: Comparator,
        value: Value,
    },
    Connective(Connective),
}

/// Assembled SQL text with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Token buffer for one entity, executed through one connection.
#[derive(Debug, Clone)]
pub struct QueryBuilder<'db> {
    db: &'db Database,
    entity: Arc<EntityDescriptor>,
    tokens: Vec<Token>,
    limit: Option<u64>,
}

impl<'db> QueryBuilder<'db> {
    /// An empty query. The entity's table is assumed to exist; go through
    /// [`Repository::query`](crate::Repository::query) to ensure it does.
    pub fn new(db: &'db Database, entity: Arc<EntityDescriptor>) -> Self {
        Self {
            db,
            entity,
            tokens: Vec::new(),
            limit: None,
        }
    }

    pub fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    /// Whether neither predicates nor a limit have been added.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.limit.is_none()
    }

    /// Appends `field <comparator> value` clauses joined by `connective`.
    ///
    /// Clauses are added in field-name order. Every field and value is
    /// checked before the buffer changes, so a rejected call leaves the
    /// query as it was.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::LimitApplied` after [`limit`](Self::limit),
    /// `OrmError::InvalidColumn` for undeclared or internal fields and
    /// `OrmError::TypeMismatch` for values of the wrong type.
    pub fn filter<I, K, V>(
        &mut self,
        comparator: Comparator,
        connective: Connective,
        assignments: I,
    ) -> Result<&mut Self, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        if self.limit.is_some() {
            return Err(OrmError::LimitApplied);
        }

        let clauses = self.checked_assignments(assignments)?;
        if clauses.is_empty() {
            return Ok(self);
        }

        if !self.tokens.is_empty() {
            self.tokens.push(Token::Connective(connective));
        }
        for (field, value) in clauses {
            self.tokens.push(Token::Predicate {
                field,
                comparator,
                value,
            });
            self.tokens.push(Token::Connective(connective));
        }
        if matches!(self.tokens.last(), Some(Token::Connective(_))) {
            self.tokens.pop();
        }

        Ok(self)
    }

    /// Caps the number of selected rows. Must come after every `filter`;
    /// a second call replaces the cap.
    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.limit = Some(n);
        self
    }

    /// Assembles the select without running it. An empty `fields` slice
    /// selects every column.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidColumn` for undeclared or internal fields.
    pub fn select_sql(&self, fields: &[&str]) -> Result<Statement, OrmError> {
        let columns = if fields.is_empty() {
            "*".to_string()
        } else {
            let mut names = Vec::with_capacity(fields.len());
            for field in fields {
                names.push(self.entity.column(field)?.name());
            }
            names.join(", ")
        };

        let mut params = Vec::new();
        let mut sql = format!("select {columns} from {}", self.entity.name());
        self.push_where(&mut sql, &mut params);
        if let Some(n) = self.limit {
            params.push(Value::Integer(i64::try_from(n).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" limit ?{}", params.len()));
        }
        sql.push(';');

        Ok(Statement { sql, params })
    }

    /// Runs the select and hydrates each row.
    ///
    /// Records from a narrow projection carry `Null` for unselected fields
    /// and no id.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidColumn` for bad fields or
    /// `OrmError::Database` on SQL failure.
    pub fn select(&self, fields: &[&str]) -> Result<Records, OrmError> {
        let statement = self.select_sql(fields)?;
        let rows = self.db.execute(&statement.sql, &statement.params)?;
        Ok(Records::new(Arc::clone(&self.entity), rows.into_rows()))
    }

    /// Assembles the delete without running it. The limit is not applied.
    pub fn delete_sql(&self) -> Statement {
        let mut params = Vec::new();
        let mut sql = format!("delete from {}", self.entity.name());
        self.push_where(&mut sql, &mut params);
        sql.push(';');
        Statement { sql, params }
    }

    /// Deletes every matching row, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Database` on SQL failure.
    pub fn delete(&self) -> Result<usize, OrmError> {
        let statement = self.delete_sql();
        let outcome = self.db.execute(&statement.sql, &statement.params)?;
        tracing::debug!(
            table = self.entity.name(),
            changes = outcome.changes(),
            "deleted matching rows"
        );
        Ok(outcome.changes())
    }

    /// Assembles the update without running it; `None` when there is
    /// nothing to set. Assignments are validated like [`filter`](Self::filter)
    /// and the limit is not applied.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidColumn` or `OrmError::TypeMismatch`.
    pub fn update_sql<I, K, V>(&self, assignments: I) -> Result<Option<Statement>, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let clauses = self.checked_assignments(assignments)?;
        if clauses.is_empty() {
            return Ok(None);
        }

        let mut params = Vec::with_capacity(clauses.len());
        let mut sets = Vec::with_capacity(clauses.len());
        for (field, value) in clauses {
            params.push(value);
            sets.push(format!("{field} = ?{}", params.len()));
        }

        let mut sql = format!("update {} set {}", self.entity.name(), sets.join(", "));
        self.push_where(&mut sql, &mut params);
        sql.push(';');

        Ok(Some(Statement { sql, params }))
    }

    /// Sets fields on every matching row, returning how many changed.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::InvalidColumn`, `OrmError::TypeMismatch` or
    /// `OrmError::Database`.
    pub fn update<I, K, V>(&self, assignments: I) -> Result<usize, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let Some(statement) = self.update_sql(assignments)? else {
            return Ok(0);
        };
        let outcome = self.db.execute(&statement.sql, &statement.params)?;
        tracing::debug!(
            table = self.entity.name(),
            changes = outcome.changes(),
            "updated matching rows"
        );
        Ok(outcome.changes())
    }

    /// Validates and coerces `(field, value)` pairs, sorted by field name.
    fn checked_assignments<I, K, V>(&self, assignments: I) -> Result<Vec<(String, Value)>, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut clauses = Vec::new();
        for (field, value) in assignments {
            let def = self.entity.column(field.as_ref())?;
            let value = self.entity.check_value(def, value.into())?;
            clauses.push((def.name().to_string(), value));
        }
        clauses.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(clauses)
    }

    /// Appends ` where ...` for a non-empty buffer, numbering parameters
    /// after those already in `params`.
    fn push_where(&self, sql: &mut String, params: &mut Vec<Value>) {
        if self.tokens.is_empty() {
            return;
        }

        let mut parts = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            match token {
                Token::Predicate {
                    field,
                    comparator,
                    value,
                } => {
                    params.push(value.clone());
                    parts.push(format!(
                        "{field} {} ?{}",
                        comparator.operator(value),
                        params.len()
                    ));
                }
                Token::Connective(connective) => parts.push(connective.as_str().to_string()),
            }
        }

        sql.push_str(" where ");
        sql.push_str(&parts.join(" "));
    }
}
