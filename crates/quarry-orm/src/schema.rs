//! DDL synthesis from entity descriptors.

use crate::entity::EntityDescriptor;

/// Renders the `create table` statement for `entity`.
///
/// The table is named after the entity and always starts with an
/// autoincrementing `id` primary key, followed by one column per persisted
/// field in declaration order.
pub fn render_schema(entity: &EntityDescriptor) -> String {
    let mut columns = vec!["id integer primary key autoincrement".to_string()];
    columns.extend(
        entity
            .persisted_fields()
            .map(|field| format!("{} {}", field.name(), field.field_type().sql_type())),
    );
    format!("create table {} ({});", entity.name(), columns.join(", "))
}
