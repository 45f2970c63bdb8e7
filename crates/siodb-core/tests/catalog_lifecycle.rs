//! End-to-end catalog scenarios driven through a full instance.

use siodb_commons::constants::{
    FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID, FIRST_USER_TABLE_ID, SUPER_USER_ID,
};
use siodb_commons::{
    compute_database_uuid, ColumnDataType, ConstraintExpression, ConstraintType, TableType, Value,
};
use siodb_configs::{ConfigError, InstanceOptions};
use siodb_core::{ColumnSpecification, DbError, Instance};
use tempfile::tempdir;

fn test_options(dir: &std::path::Path) -> InstanceOptions {
    InstanceOptions::with_defaults("test", dir.to_str().unwrap())
}

#[test]
fn create_database_then_reopen_instance() {
    let dir = tempdir().unwrap();

    let database_uuid;
    {
        let instance = Instance::new(&test_options(dir.path())).unwrap();
        let database = instance
            .create_database("DB1", None, None, SUPER_USER_ID)
            .unwrap();
        database_uuid = database.uuid();

        // The database UUID is the MD5 of the name and the little-endian
        // creation timestamp, so directory names are reproducible.
        assert_eq!(
            database_uuid,
            compute_database_uuid("DB1", database.create_timestamp())
        );
        assert!(database
            .data_dir()
            .to_string_lossy()
            .contains(&format!("db-{}", database_uuid)));

        database.release().unwrap();
        instance.close().unwrap();
    }

    // A fresh instance over the same data directory sees the database
    // and its catalog tables.
    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database = instance.get_database_checked("DB1").unwrap();
    assert_eq!(database.uuid(), database_uuid);
    database.get_table_checked("SYS_TABLES").unwrap();
    database.release().unwrap();
}

#[test]
fn duplicate_constraint_name_produces_compound_error() {
    let dir = tempdir().unwrap();
    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database = instance
        .create_database("DB1", None, None, SUPER_USER_ID)
        .unwrap();

    let not_null = || ConstraintExpression::constant(Value::Bool(true));
    let specs = vec![
        ColumnSpecification::new("C1", ColumnDataType::Int32).with_constraint(
            "nn1",
            ConstraintType::NotNull,
            not_null(),
        ),
        ColumnSpecification::new("C2", ColumnDataType::Int32).with_constraint(
            "nn1",
            ConstraintType::NotNull,
            not_null(),
        ),
    ];
    let err = database
        .create_user_table("T", TableType::Disk, &specs, SUPER_USER_ID)
        .unwrap_err();

    let DbError::Compound(compound) = err else {
        panic!("expected a compound error, got: {err}");
    };
    assert_eq!(compound.errors.len(), 1);
    assert!(compound.errors[0].message.contains("nn1"));

    // Atomicity: no table, column or constraint was registered.
    assert!(!database.is_table_exists("T"));
    assert!(!database.is_constraint_exists("nn1"));

    database.release().unwrap();
}

#[test]
fn constraint_definition_interning_is_idempotent() {
    let dir = tempdir().unwrap();
    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database = instance
        .create_database("DB1", None, None, SUPER_USER_ID)
        .unwrap();

    let expression = ConstraintExpression::constant(Value::Bool(true));
    let (first, first_existing) = database
        .create_constraint_definition(false, ConstraintType::NotNull, expression.clone())
        .unwrap();
    let (second, second_existing) = database
        .create_constraint_definition(false, ConstraintType::NotNull, expression.clone())
        .unwrap();

    assert!(!first_existing);
    assert!(second_existing);
    assert_eq!(first.id(), second.id());

    // The serialized form finds the same definition again.
    let serialized = expression.serialize().unwrap();
    let found = database
        .find_or_create_constraint_definition(false, ConstraintType::NotNull, &serialized)
        .unwrap();
    assert_eq!(found.id(), first.id());

    database.release().unwrap();
}

#[test]
fn table_of_one_database_is_rejected_by_another() {
    let dir = tempdir().unwrap();
    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database_a = instance
        .create_database("A", None, None, SUPER_USER_ID)
        .unwrap();
    let database_b = instance
        .create_database("B", None, None, SUPER_USER_ID)
        .unwrap();

    let table = database_a
        .create_user_table("T", TableType::Disk, &[], SUPER_USER_ID)
        .unwrap();
    let (definition, _) = database_b
        .create_constraint_definition(
            false,
            ConstraintType::NotNull,
            ConstraintExpression::constant(Value::Bool(true)),
        )
        .unwrap();

    let err = database_b
        .create_constraint(&table, None, Some("NN1"), &definition)
        .unwrap_err();
    assert!(matches!(err, DbError::TableDoesNotBelongToDatabase { .. }));

    database_a.release().unwrap();
    database_b.release().unwrap();
}

#[test]
fn system_and_user_constraint_definitions_never_alias() {
    let dir = tempdir().unwrap();
    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database = instance
        .create_database("DB1", None, None, SUPER_USER_ID)
        .unwrap();

    let expression = ConstraintExpression::constant(Value::Bool(true));
    let (system_def, _) = database
        .create_constraint_definition(true, ConstraintType::NotNull, expression.clone())
        .unwrap();
    let (user_def, _) = database
        .create_constraint_definition(false, ConstraintType::NotNull, expression)
        .unwrap();

    assert!(system_def.id() < FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID);
    assert!(user_def.id() >= FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID);
    assert_ne!(system_def.id(), user_def.id());
    assert_eq!(
        system_def.serialized_expression(),
        user_def.serialized_expression()
    );

    database.release().unwrap();
}

#[test]
fn iomgr_port_collision_is_rejected_at_configuration_load() {
    let content = r#"
ipv4_port = 50000
data_dir = "/var/lib/siodb/test/data"

[iomgr]
ipv4_port = 50000
"#;
    let err = InstanceOptions::from_toml_str("test", content).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOption(_)));
    assert!(err.to_string().contains("same IPv4 port number"));
}

#[test]
fn reopening_preserves_table_names_and_ids() {
    let dir = tempdir().unwrap();

    let mut expected: Vec<(String, u32)> = Vec::new();
    {
        let instance = Instance::new(&test_options(dir.path())).unwrap();
        let database = instance
            .create_database("DB1", None, None, SUPER_USER_ID)
            .unwrap();
        for name in ["ORDERS", "ITEMS", "CUSTOMERS"] {
            let table = database
                .create_user_table(
                    name,
                    TableType::Disk,
                    &[ColumnSpecification::new("NAME", ColumnDataType::Text)],
                    SUPER_USER_ID,
                )
                .unwrap();
            expected.push((name.to_string(), table.id()));
        }
        database.release().unwrap();
        instance.close().unwrap();
    }

    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database = instance.get_database_checked("DB1").unwrap();
    for (name, id) in &expected {
        let table = database.get_table_checked(name).unwrap();
        assert_eq!(table.id(), *id, "table '{}' must keep its id", name);
        assert!(table.id() >= FIRST_USER_TABLE_ID);
        assert!(table.find_column("NAME").is_some());
    }
    database.check_data_consistency().unwrap();
    database.release().unwrap();
}

#[test]
fn allocator_ids_are_unique_and_monotonic_per_branch() {
    let dir = tempdir().unwrap();
    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database = instance
        .create_database("DB1", None, None, SUPER_USER_ID)
        .unwrap();

    let mut table_ids = Vec::new();
    for i in 0..5 {
        let table = database
            .create_user_table(&format!("T{}", i), TableType::Disk, &[], SUPER_USER_ID)
            .unwrap();
        table_ids.push(table.id());
    }
    let mut sorted = table_ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), table_ids.len(), "ids must be unique");
    assert_eq!(sorted, table_ids, "ids must be monotonically increasing");

    database.release().unwrap();
}

#[test]
fn encrypted_database_end_to_end() {
    let dir = tempdir().unwrap();
    let key = vec![0x11u8; 16];

    {
        let instance = Instance::new(&test_options(dir.path())).unwrap();
        let database = instance
            .create_database(
                "VAULT",
                Some("aes128".to_string()),
                Some(key.clone()),
                SUPER_USER_ID,
            )
            .unwrap();
        assert_eq!(database.cipher_id(), Some("aes128"));
        database
            .create_user_table("SECRETS", TableType::Disk, &[], SUPER_USER_ID)
            .unwrap();
        database.release().unwrap();
        instance.close().unwrap();
    }

    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database = instance.get_database_checked("VAULT").unwrap();
    database.get_table_checked("SECRETS").unwrap();
    database.release().unwrap();
}

#[test]
fn use_count_cannot_go_below_zero() {
    let dir = tempdir().unwrap();
    let instance = Instance::new(&test_options(dir.path())).unwrap();
    let database = instance
        .create_database("DB1", None, None, SUPER_USER_ID)
        .unwrap();
    database.release().unwrap();
    let err = database.release().unwrap_err();
    assert!(matches!(err, DbError::CannotReleaseUnusedDatabase { .. }));
}
