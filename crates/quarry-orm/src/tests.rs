//! Unit tests for the repository against an in-memory database.

use std::sync::Arc;

use quarry_db::{Database, DbError, Value};

use crate::entity::{EntityDescriptor, FieldType};
use crate::error::OrmError;
use crate::record::Record;
use crate::repository::Repository;

fn person() -> Arc<EntityDescriptor> {
    EntityDescriptor::builder("Person")
        .field("name", FieldType::String)
        .field("age", FieldType::Integer)
        .build()
        .expect("valid declaration")
}

fn ann(entity: &Arc<EntityDescriptor>) -> Record {
    Record::with_values(
        entity,
        [("name", Value::from("Ann")), ("age", Value::from(30))],
    )
    .expect("valid values")
}

fn table_exists(db: &Database, name: &str) -> bool {
    let rows = db
        .execute(
            "select name from sqlite_master where type = 'table' and name = ?1",
            &[Value::from(name)],
        )
        .expect("should query sqlite_master");
    !rows.is_empty()
}

// ── construction ─────────────────────────────────────────────────────

#[test]
fn new_repository_creates_missing_table() {
    let db = Database::in_memory();
    assert!(!table_exists(&db, "Person"));

    let repo = Repository::new(&db, person()).expect("repository should build");
    assert!(repo.created_table());
    assert!(table_exists(&db, "Person"));
    assert!(!db.in_transaction(), "schema script commits");
}

#[test]
fn second_repository_reuses_existing_table() {
    let db = Database::in_memory();
    let first = Repository::new(&db, person()).expect("first repository");
    let mut record = ann(first.entity());
    first.save(&mut record).expect("save should succeed");

    let second = Repository::new(&db, person()).expect("second repository");
    assert!(!second.created_table());
    assert!(second.has(record.id().expect("saved")).expect("has should succeed"));
}

#[test]
fn table_names_are_case_sensitive_in_the_catalog() {
    let db = Database::in_memory();
    db.executescript("create table person (id integer primary key, nickname text);")
        .expect("seed table");

    // The catalog lookup matches the exact name, so the repository tries to
    // create `Person` and SQLite refuses because names fold case.
    let err = Repository::new(&db, person()).expect_err("clashing table should fail");
    match err {
        OrmError::Database(DbError::SchemaFailure(_)) => {}
        other => panic!("unexpected error type: {other:?}"),
    }
}

// ── save / get / has ─────────────────────────────────────────────────

#[test]
fn save_assigns_increasing_ids() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    let mut a = ann(repo.entity());
    let mut b = ann(repo.entity());
    let id_a = repo.save(&mut a).expect("save a");
    let id_b = repo.save(&mut b).expect("save b");

    assert!(id_a > 0);
    assert!(id_b > id_a);
    assert_eq!(a.id(), Some(id_a));
    assert_eq!(repo.get(id_a).expect("get a"), a);
}

#[test]
fn ids_are_not_reused_after_delete() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    let mut first = ann(repo.entity());
    let first_id = repo.save(&mut first).expect("save");
    repo.delete(&first).expect("delete");

    let mut second = ann(repo.entity());
    let second_id = repo.save(&mut second).expect("save again");
    assert!(second_id > first_id, "autoincrement must not reuse ids");
}

#[test]
fn save_with_existing_id_is_a_duplicate() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    let mut original = ann(repo.entity());
    let id = repo.save(&mut original).expect("save");

    let mut copy = original.clone();
    copy.set("name", "Impostor").expect("set");
    match repo.save(&mut copy) {
        Err(OrmError::DuplicateId { entity, id: dup }) => {
            assert_eq!(entity, "Person");
            assert_eq!(dup, id);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert_eq!(repo.all().expect("all").count(), 1);
    assert_eq!(repo.get(id).expect("get"), original);
}

#[test]
fn save_replaces_a_stale_id() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    let mut record = ann(repo.entity());
    let id = repo.save(&mut record).expect("save");
    repo.delete(&record).expect("delete");

    let new_id = repo.save(&mut record).expect("resave after delete");
    assert_ne!(new_id, id);
    assert_eq!(record.id(), Some(new_id));
}

#[test]
fn get_missing_id_is_not_found() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    match repo.get(42) {
        Err(OrmError::NotFound { entity, id }) => {
            assert_eq!(entity, "Person");
            assert_eq!(id, 42);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!repo.has(42).expect("has"));
}

// ── update / delete ──────────────────────────────────────────────────

#[test]
fn update_overwrites_stored_fields() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    let mut record = ann(repo.entity());
    let id = repo.save(&mut record).expect("save");
    record.set("age", 31).expect("set");
    repo.update(&record).expect("update");

    let stored = repo.get(id).expect("get");
    assert_eq!(stored.get("age"), Some(&Value::Integer(31)));
    assert_eq!(stored.get("name"), Some(&Value::from("Ann")));
}

#[test]
fn update_of_vanished_row_is_a_no_op() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    let mut record = ann(repo.entity());
    repo.save(&mut record).expect("save");
    repo.delete(&record).expect("delete");

    repo.update(&record).expect("update of missing row is not an error");
    assert_eq!(repo.all().expect("all").count(), 0);
}

#[test]
fn update_and_delete_need_an_id() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");
    let unsaved = ann(repo.entity());

    assert!(matches!(repo.update(&unsaved), Err(OrmError::MissingId(_))));
    assert!(matches!(repo.delete(&unsaved), Err(OrmError::MissingId(_))));
}

#[test]
fn delete_removes_the_row_and_tolerates_repeats() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    let mut record = ann(repo.entity());
    let id = repo.save(&mut record).expect("save");
    repo.delete(&record).expect("delete");

    assert!(!repo.has(id).expect("has"));
    assert!(matches!(repo.get(id), Err(OrmError::NotFound { .. })));
    repo.delete(&record).expect("second delete is a no-op");
}

#[test]
fn records_of_other_entities_are_rejected() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");
    let pet = EntityDescriptor::builder("Pet")
        .field("name", FieldType::String)
        .build()
        .expect("valid declaration");

    let mut rex = Record::with_values(&pet, [("name", "Rex")]).expect("valid");
    match repo.save(&mut rex) {
        Err(OrmError::EntityMismatch { expected, found }) => {
            assert_eq!(expected, "Person");
            assert_eq!(found, "Pet");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn equal_descriptors_from_separate_declarations_are_accepted() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");
    let mut record = ann(&person());
    repo.save(&mut record)
        .expect("structurally equal entity should be accepted");
}

// ── all / hydrate ────────────────────────────────────────────────────

#[test]
fn all_restarts_on_every_call() {
    let db = Database::in_memory();
    let repo = Repository::new(&db, person()).expect("repository");

    let mut a = ann(repo.entity());
    repo.save(&mut a).expect("save");
    assert_eq!(repo.all().expect("all").len(), 1);

    let mut b = ann(repo.entity());
    repo.save(&mut b).expect("save");
    let mut ids: Vec<i64> = repo
        .all()
        .expect("all")
        .filter_map(|r| r.id())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![a.id().expect("saved"), b.id().expect("saved")]);
}

#[test]
fn internal_fields_are_not_persisted() {
    let db = Database::in_memory();
    let entity = EntityDescriptor::builder("Session")
        .field("user", FieldType::String)
        .field("_secret", FieldType::String)
        .build()
        .expect("valid declaration");
    let repo = Repository::new(&db, Arc::clone(&entity)).expect("repository");

    let mut session =
        Record::with_values(&entity, [("user", "ann"), ("_secret", "hunter2")]).expect("valid");
    let id = repo.save(&mut session).expect("save");

    let stored = repo.get(id).expect("get");
    assert_eq!(stored.get("user"), Some(&Value::from("ann")));
    assert_eq!(stored.get("_secret"), Some(&Value::Null));
}

#[test]
fn fieldless_entities_can_be_saved() {
    let db = Database::in_memory();
    let entity = EntityDescriptor::builder("Tick")
        .build()
        .expect("valid declaration");
    let repo = Repository::new(&db, Arc::clone(&entity)).expect("repository");

    let mut tick = Record::new(&entity);
    let id = repo.save(&mut tick).expect("save");
    assert!(repo.has(id).expect("has"));
    repo.update(&tick).expect("nothing to update");
}

#[test]
fn real_fields_round_trip() {
    let db = Database::in_memory();
    let entity = EntityDescriptor::builder("Reading")
        .field("celsius", FieldType::Real)
        .build()
        .expect("valid declaration");
    let repo = Repository::new(&db, Arc::clone(&entity)).expect("repository");

    let mut reading = Record::with_values(&entity, [("celsius", 21)]).expect("valid");
    let id = repo.save(&mut reading).expect("save");
    assert_eq!(
        repo.get(id).expect("get").get("celsius"),
        Some(&Value::Real(21.0))
    );
}
