//! Integration tests for the sew-sqlite crate.

use sew_core::statement::SelectQuery;
use sew_core::{ColumnDescriptor, Condition, ForeignKeyDescriptor, TableDescriptor, ValidationError};
use sew_sqlite::{
    ColumnRef, CreateOptions, DataTableOptions, Database, DatabaseConfig, EntryKind,
    InsertOptions, SewError, TableKind, Value,
};

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn parent_desc() -> TableDescriptor {
    TableDescriptor::builder()
        .column("id", "INTEGER")
        .column("val", "TEXT")
        .unique(["id"])
        .build()
        .unwrap()
}

fn child_desc() -> TableDescriptor {
    TableDescriptor::builder()
        .column("col1", "TEXT")
        .column("col2", "INTEGER")
        .foreign_key("col2", "parent", "id")
        .build()
        .unwrap()
}

fn runs_meta_desc() -> TableDescriptor {
    TableDescriptor::builder()
        .column("data_tblname", "TEXT")
        .column("operator", "TEXT")
        .column("temperature", "REAL")
        .unique(["data_tblname"])
        .build()
        .unwrap()
}

fn samples_desc() -> TableDescriptor {
    TableDescriptor::builder()
        .column("t", "REAL")
        .column("v", "REAL")
        .build()
        .unwrap()
}

/// Asserts the in-memory catalog matches one freshly read from the engine.
fn assert_matches_reload(db: &mut Database) {
    let before = db.catalog().clone();
    db.reload().unwrap();
    assert_eq!(&before, db.catalog());
}

#[test]
fn test_classification_from_existing_schema() {
    let mut db = Database::open_in_memory().unwrap();
    db.execute(
        "CREATE TABLE foo_metadata (data_tblname TEXT, a INTEGER)",
        &[],
    )
    .unwrap();
    db.execute(
        "INSERT INTO foo_metadata VALUES (?, ?)",
        &[text("bar"), Value::Integer(1)],
    )
    .unwrap();
    db.execute("CREATE TABLE bar (x REAL)", &[]).unwrap();
    db.execute("CREATE TABLE plain (y TEXT)", &[]).unwrap();
    db.execute("CREATE VIEW plain_view AS SELECT y FROM plain", &[])
        .unwrap();
    db.commit().unwrap();

    let names = db.reload().unwrap();
    assert_eq!(names.len(), 4);

    assert_eq!(db.kind_of("foo_metadata"), Some(TableKind::MetaTable));
    assert_eq!(db.kind_of("bar"), Some(TableKind::DataTable));
    assert_eq!(db.kind_of("plain"), Some(TableKind::Ordinary));
    assert_eq!(db.kind_of("plain_view"), Some(TableKind::View));
    assert_eq!(db.kind_of("missing"), None);

    match &db.catalog().get("foo_metadata").unwrap().kind {
        EntryKind::MetaTable { data_tables, .. } => {
            assert_eq!(data_tables.iter().collect::<Vec<_>>(), vec!["bar"]);
        }
        other => panic!("expected metadata table, got {other:?}"),
    }
    assert_eq!(
        db.data_table("bar").unwrap().metadata_table_name(),
        "foo_metadata"
    );
}

#[test]
fn test_metadata_row_without_table_stays_unlinked() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_meta_table(runs_meta_desc(), "runs_metadata", CreateOptions::default())
        .unwrap();
    db.table("runs_metadata")
        .unwrap()
        .insert_one(
            &[text("ghost"), text("ann"), Value::Real(1.0)],
            InsertOptions::default(),
        )
        .unwrap();
    db.reload().unwrap();

    assert!(db.meta_table("runs_metadata").unwrap().linked_data_tables().is_empty());

    // A table created later under that name picks up the pairing.
    db.create_table(samples_desc(), "ghost", CreateOptions::default())
        .unwrap();
    assert_eq!(db.kind_of("ghost"), Some(TableKind::DataTable));
    assert_matches_reload(&mut db);
}

#[test]
fn test_relationships_follow_foreign_keys() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();
    db.create_table(child_desc(), "child", CreateOptions::default())
        .unwrap();

    let children = db.relationships().children_of("parent", "id").unwrap();
    assert_eq!(
        children.iter().collect::<Vec<_>>(),
        vec![&ColumnRef::new("child", "col2")]
    );
    assert_eq!(db.relationships().len(), 1);
    assert_matches_reload(&mut db);

    db.drop_table("child", true).unwrap();
    assert!(db.relationships().is_empty());
    assert_matches_reload(&mut db);
}

#[test]
fn test_reload_is_idempotent() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();
    db.create_table(child_desc(), "child", CreateOptions::default())
        .unwrap();
    db.create_meta_table(runs_meta_desc(), "runs_metadata", CreateOptions::default())
        .unwrap();

    let first = db.reload().unwrap();
    let snapshot = db.catalog().clone();
    let second = db.reload().unwrap();
    assert_eq!(first, second);
    assert_eq!(&snapshot, db.catalog());
}

#[test]
fn test_create_data_table_links_metadata() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_meta_table(runs_meta_desc(), "runs_metadata", CreateOptions::default())
        .unwrap();
    db.create_data_table(
        samples_desc(),
        "run_a",
        &[text("ann"), Value::Real(4.2)],
        "runs_metadata",
        DataTableOptions {
            commit_now: true,
            ..DataTableOptions::default()
        },
    )
    .unwrap();

    assert_eq!(db.kind_of("run_a"), Some(TableKind::DataTable));
    let row = db.data_table("run_a").unwrap().metadata().unwrap();
    assert_eq!(row.value("operator").unwrap(), &text("ann"));
    assert_eq!(row.value("temperature").unwrap(), &Value::Real(4.2));
    assert_matches_reload(&mut db);
}

#[test]
fn test_create_data_table_rejects_bad_metadata() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_meta_table(runs_meta_desc(), "runs_metadata", CreateOptions::default())
        .unwrap();

    let err = db
        .create_data_table(
            samples_desc(),
            "run_a",
            &[text("ann")],
            "runs_metadata",
            DataTableOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SewError::ValidationError(ValidationError::MetadataArity {
            expected: 3,
            actual: 2,
            ..
        })
    ));

    let err = db
        .create_data_table(
            samples_desc(),
            "run_a",
            &[text("ann"), Value::Real(1.0)],
            "nope_metadata",
            DataTableOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SewError::ValidationError(ValidationError::UnknownMetaTable(_))
    ));
    assert!(!db.catalog().contains("run_a"));
}

#[test]
fn test_failed_data_table_leaves_no_metadata_row() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();
    db.create_meta_table(runs_meta_desc(), "runs_metadata", CreateOptions::default())
        .unwrap();

    // "parent" already exists, so the create statement fails after the insert.
    let err = db
        .create_data_table(
            samples_desc(),
            "parent",
            &[text("ann"), Value::Real(1.0)],
            "runs_metadata",
            DataTableOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, SewError::EngineError(_)));

    let mut meta = db.meta_table("runs_metadata").unwrap();
    assert!(meta.data_tables().unwrap().is_empty());
    assert_eq!(db.kind_of("parent"), Some(TableKind::Ordinary));
    assert_matches_reload(&mut db);
}

#[test]
fn test_meta_table_validation() {
    let mut db = Database::open_in_memory().unwrap();

    let err = db
        .create_meta_table(runs_meta_desc(), "runs", CreateOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        SewError::ValidationError(ValidationError::MissingMetaSuffix(_))
    ));

    let err = db
        .create_table(samples_desc(), "samples_metadata", CreateOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        SewError::ValidationError(ValidationError::MissingDataTableColumn(_))
    ));
    assert!(db.table_names().is_empty());
}

#[test]
fn test_dropping_meta_table_downgrades_data_tables() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_meta_table(runs_meta_desc(), "runs_metadata", CreateOptions::default())
        .unwrap();
    db.create_data_table(
        samples_desc(),
        "run_a",
        &[text("ann"), Value::Real(1.0)],
        "runs_metadata",
        DataTableOptions::default(),
    )
    .unwrap();

    db.drop_table("runs_metadata", false).unwrap();
    assert_eq!(db.kind_of("run_a"), Some(TableKind::Ordinary));
    assert_matches_reload(&mut db);
}

#[test]
fn test_dropping_data_table_keeps_metadata_row() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_meta_table(runs_meta_desc(), "runs_metadata", CreateOptions::default())
        .unwrap();
    db.create_data_table(
        samples_desc(),
        "run_a",
        &[text("ann"), Value::Real(1.0)],
        "runs_metadata",
        DataTableOptions::default(),
    )
    .unwrap();

    db.drop_table("run_a", false).unwrap();
    assert!(!db.catalog().contains("run_a"));
    let mut meta = db.meta_table("runs_metadata").unwrap();
    assert_eq!(meta.data_tables().unwrap(), vec!["run_a"]);
    assert!(meta.linked_data_tables().is_empty());
    assert_matches_reload(&mut db);
}

#[test]
fn test_if_not_exists_keeps_existing_entry() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();

    let other = TableDescriptor::builder().column("z", "TEXT").build().unwrap();
    let sql = db
        .create_table(
            other,
            "parent",
            CreateOptions {
                if_not_exists: true,
                commit_now: false,
            },
        )
        .unwrap();
    assert!(sql.starts_with("create table if not exists"));
    assert_eq!(db.table("parent").unwrap().column_names(), vec!["id", "val"]);
    assert_matches_reload(&mut db);
}

#[test]
fn test_alter_table_updates_catalog() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();

    let mut parent = db.table("parent").unwrap();
    let sql = parent
        .add_column(ColumnDescriptor::new("extra", "REAL"), true)
        .unwrap();
    assert_eq!(sql, r#"alter table "parent" add column extra REAL"#);

    let err = parent
        .add_column(ColumnDescriptor::new("val", "TEXT"), true)
        .unwrap_err();
    assert!(matches!(
        err,
        SewError::ValidationError(ValidationError::DuplicateColumn(_))
    ));

    let err = parent.drop_column("nope", true).unwrap_err();
    assert!(matches!(err, SewError::ColumnNotFound(_)));

    assert_eq!(
        db.catalog()
            .get("parent")
            .and_then(|e| e.descriptor())
            .unwrap()
            .column_names(),
        vec!["id", "val", "extra"]
    );
    assert_matches_reload(&mut db);
}

#[test]
fn test_drop_column_refuses_constrained_column() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();

    let mut parent = db.table("parent").unwrap();
    let err = parent.drop_column("id", true).unwrap_err();
    assert!(matches!(
        err,
        SewError::ValidationError(ValidationError::UnknownUniqueColumn(_))
    ));
    assert_eq!(parent.column_names(), vec!["id", "val"]);
    assert_matches_reload(&mut db);
}

#[test]
fn test_awkward_identifiers_survive_reload() {
    let mut db = Database::open_in_memory().unwrap();
    let parent = TableDescriptor::builder()
        .column("the id", "INTEGER ")
        .unique(["the id"])
        .build()
        .unwrap();
    db.create_table(parent, "parent table", CreateOptions::default())
        .unwrap();

    let child = TableDescriptor::builder()
        .column("my col", "TEXT")
        .column("order", "INTEGER")
        .column("say \"hi\"", "")
        .with_foreign_key(
            ForeignKeyDescriptor::new("order", "parent table", "the id").named("fk order"),
        )
        .build()
        .unwrap();
    db.create_table(child, "child", CreateOptions::default())
        .unwrap();
    assert_matches_reload(&mut db);

    let entry = db.catalog().get("child").unwrap();
    let desc = entry.descriptor().unwrap();
    assert_eq!(desc.column_names(), vec!["my col", "order", "say \"hi\""]);
    assert_eq!(desc.foreign_keys()[0].name.as_deref(), Some("fk order"));
    assert_eq!(
        db.relationships()
            .children_of("parent table", "the id")
            .map(|children| children.len()),
        Some(1)
    );

    let mut table = db.table("child").unwrap();
    let sql = table
        .insert_named(
            &["my col", "order"],
            &[text("x"), Value::Null],
            InsertOptions::default(),
        )
        .unwrap();
    assert_eq!(sql, r#"insert into "child"("my col","order") values(?,?)"#);
    let rows = table.rows(0, 10).unwrap();
    assert_eq!(rows[0].values()[0], text("x"));

    table.drop_column("say \"hi\"", true).unwrap();
    assert_eq!(table.column_names(), vec!["my col", "order"]);
    assert_matches_reload(&mut db);
}

#[test]
fn test_insert_select_delete() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();

    let mut parent = db.table("parent").unwrap();
    parent
        .insert_many_named(
            &["val", "id"],
            &[
                vec![text("one"), Value::Integer(1)],
                vec![text("two"), Value::Integer(2)],
                vec![text("three"), Value::Integer(3)],
            ],
            InsertOptions {
                or_replace: false,
                commit_now: true,
            },
        )
        .unwrap();

    parent
        .select_with_params(
            &SelectQuery::columns(["val"]).filter(Condition::new("id").gt("?")),
            &[Value::Integer(1)],
        )
        .unwrap();
    assert_eq!(parent.fetch_all().unwrap().len(), 2);

    // Replace on the unique id.
    parent
        .insert_one(
            &[Value::Integer(2), text("deux")],
            InsertOptions {
                or_replace: true,
                commit_now: false,
            },
        )
        .unwrap();
    parent
        .select(&SelectQuery::columns(["val"]).filter(Condition::new("id").eq(2)))
        .unwrap();
    let row = parent.fetch_one().unwrap().unwrap();
    assert_eq!(row.get(0), Some(&text("deux")));

    let id = Condition::new("id");
    parent
        .delete(&[id.eq(1).or(id.eq(3))], true)
        .unwrap();
    parent.select(&SelectQuery::all()).unwrap();
    assert_eq!(parent.fetch_all().unwrap().len(), 1);
}

#[test]
fn test_retrieve_parent_through_handles() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();
    db.create_table(child_desc(), "child", CreateOptions::default())
        .unwrap();
    db.table("parent")
        .unwrap()
        .insert_one(&[Value::Integer(10), text("ten")], InsertOptions::default())
        .unwrap();

    let mut child = db.table("child").unwrap();
    child
        .insert_one(&[text("c"), Value::Integer(10)], InsertOptions::default())
        .unwrap();
    let row = child.row(0).unwrap().unwrap();
    let parent = child.retrieve_parent_row(&row, None).unwrap().unwrap();
    assert_eq!(parent.values(), &[Value::Integer(10), text("ten")]);
}

#[test]
fn test_foreign_keys_enforced_by_default() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(parent_desc(), "parent", CreateOptions::default())
        .unwrap();
    db.create_table(child_desc(), "child", CreateOptions::default())
        .unwrap();

    let err = db
        .table("child")
        .unwrap()
        .insert_one(&[text("c"), Value::Integer(99)], InsertOptions::default())
        .unwrap_err();
    assert!(matches!(err, SewError::EngineError(_)));
}

#[test]
fn test_file_database_with_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sew.yaml");
    let db_path = dir.path().join("data.db");

    let config = DatabaseConfig {
        enclose_table_names: false,
        busy_timeout_ms: Some(100),
        ..DatabaseConfig::default()
    };
    config.save(&config_path).unwrap();
    let loaded = DatabaseConfig::load(&config_path).unwrap();
    assert_eq!(loaded, config);

    {
        let mut db = Database::open_with_config(&db_path, loaded.clone()).unwrap();
        let sql = db
            .create_meta_table(
                runs_meta_desc(),
                "runs_metadata",
                CreateOptions {
                    if_not_exists: false,
                    commit_now: true,
                },
            )
            .unwrap();
        assert!(sql.starts_with("create table runs_metadata("));
        db.create_data_table(
            samples_desc(),
            "run_a",
            &[text("ann"), Value::Real(2.0)],
            "runs_metadata",
            DataTableOptions {
                commit_now: true,
                ..DataTableOptions::default()
            },
        )
        .unwrap();
    }

    let db = Database::open_with_config(&db_path, loaded).unwrap();
    assert_eq!(db.table_names(), vec!["run_a", "runs_metadata"]);
    assert_eq!(db.kind_of("run_a"), Some(TableKind::DataTable));
    assert_eq!(db.kind_of("runs_metadata"), Some(TableKind::MetaTable));
}

#[test]
fn test_uncommitted_changes_roll_back() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");

    {
        let mut db = Database::open(&db_path).unwrap();
        db.create_table(parent_desc(), "parent", CreateOptions::default())
            .unwrap();
        db.rollback().unwrap();
    }

    let db = Database::open(&db_path).unwrap();
    assert!(db.table_names().is_empty());
}
