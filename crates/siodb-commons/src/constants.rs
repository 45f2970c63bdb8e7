//! Reserved ranges, well-known object names and on-disk file names.
//!
//! Identifiers below the `FIRST_USER_*` threshold of their kind denote
//! system objects; identifiers at or above it denote user objects. The id
//! allocators never mint an id on the wrong side of the partition for the
//! caller, so system-catalog bootstrap can never alias user DDL.

use crate::ids::{
    ColumnDefinitionConstraintId, ColumnDefinitionId, ColumnId, ColumnSetColumnId, ColumnSetId,
    ConstraintDefinitionId, ConstraintId, DatabaseId, IndexColumnId, IndexId, TableId, UserId,
};

/// First database id available to user databases.
pub const FIRST_USER_DATABASE_ID: DatabaseId = 256;

/// First table id available to user tables.
pub const FIRST_USER_TABLE_ID: TableId = 4096;

/// First column id available to user table columns.
pub const FIRST_USER_TABLE_COLUMN_ID: ColumnId = 4096;

/// First column set id available to user tables.
pub const FIRST_USER_TABLE_COLUMN_SET_ID: ColumnSetId = 4096;

/// First column set column id available to user tables.
pub const FIRST_USER_TABLE_COLUMN_SET_COLUMN_ID: ColumnSetColumnId = 4096;

/// First column definition id available to user table columns.
pub const FIRST_USER_TABLE_COLUMN_DEFINITION_ID: ColumnDefinitionId = 4096;

/// First constraint definition id available to user table constraints.
pub const FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID: ConstraintDefinitionId = 4096;

/// First constraint id available to user table constraints.
pub const FIRST_USER_TABLE_CONSTRAINT_ID: ConstraintId = 4096;

/// First column definition constraint id available to user tables.
pub const FIRST_USER_TABLE_COLUMN_DEFINITION_CONSTRAINT_ID: ColumnDefinitionConstraintId = 4096;

/// First index id available to user tables.
pub const FIRST_USER_TABLE_INDEX_ID: IndexId = 4096;

/// First index column id available to user tables.
pub const FIRST_USER_TABLE_INDEX_COLUMN_ID: IndexColumnId = 4096;

/// First user id available to regular user accounts.
pub const FIRST_USER_USER_ID: UserId = 256;

/// First user access key id available to regular user accounts.
pub const FIRST_USER_USER_ACCESS_KEY_ID: u64 = 4096;

/// First user permission id available to regular user accounts.
pub const FIRST_USER_USER_PERMISSION_ID: u64 = 4096;

/// Reserved id of the system database.
pub const SYSTEM_DATABASE_ID: DatabaseId = 1;

/// Reserved id of the superuser.
pub const SUPER_USER_ID: UserId = 1;

/// Superuser account name.
pub const SUPER_USER_NAME: &str = "root";

/// Name of the system database.
pub const SYSTEM_DATABASE_NAME: &str = "SYS";

/// Name of the implicit first column of every disk table.
pub const MASTER_COLUMN_NAME: &str = "TRID";

/// Maximum length of a database object name, in bytes.
pub const MAX_OBJECT_NAME_LENGTH: usize = 255;

/// Default size of the data area of a column block file, in bytes.
pub const DEFAULT_DATA_FILE_DATA_AREA_SIZE: u32 = 32768;

/// Catalog tables hosted by every database.
pub const SYSTEM_TABLE_NAMES: &[&str] = &[
    "SYS_TABLES",
    "SYS_DUMMY",
    "SYS_COLUMN_SETS",
    "SYS_COLUMNS",
    "SYS_COLUMN_DEFS",
    "SYS_COLUMN_SET_COLUMNS",
    "SYS_CONSTRAINT_DEFS",
    "SYS_CONSTRAINTS",
    "SYS_COLUMN_DEF_CONSTRAINTS",
    "SYS_INDICES",
    "SYS_INDEX_COLUMNS",
];

/// Catalog tables hosted only by the system database.
pub const SYSTEM_DATABASE_ONLY_TABLE_NAMES: &[&str] = &[
    "SYS_USERS",
    "SYS_USER_KEYS",
    "SYS_DATABASES",
    "SYS_USER_PERMISSIONS",
];

/// Prefix of a database data directory under the instance data directory.
pub const DATABASE_DATA_DIR_PREFIX: &str = "db-";

/// Name of the database initialization flag file.
pub const INITIALIZATION_FLAG_FILE: &str = "initialized";

/// Name of the memory-mapped database metadata file.
pub const METADATA_FILE_NAME: &str = "metadata";

/// Name of the durable system object snapshot file.
pub const SYSTEM_OBJECTS_FILE_NAME: &str = "system_objects";

/// Name of the instance metadata file.
pub const INSTANCE_METADATA_FILE_NAME: &str = "instance_metadata";

/// Name of the instance initialization lock file.
pub const INSTANCE_INITIALIZATION_LOCK_FILE: &str = "initlock";

/// Name of the flag file IOMgr creates once database initialization completes.
pub const IOMGR_INITIALIZATION_FLAG_FILE: &str = "iomgr_initialized";

/// Smallest valid TCP port number for listener options.
pub const MIN_PORT_NUMBER: u16 = 1;

/// Largest valid TCP port number for listener options.
pub const MAX_PORT_NUMBER: u16 = 65535;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_ranges_are_nonempty() {
        assert!(FIRST_USER_TABLE_ID > 1);
        assert!(FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID > 1);
        assert!(FIRST_USER_DATABASE_ID > 1);
    }

    #[test]
    fn test_system_table_names_unique() {
        let mut names: Vec<&str> = SYSTEM_TABLE_NAMES
            .iter()
            .chain(SYSTEM_DATABASE_ONLY_TABLE_NAMES.iter())
            .copied()
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
