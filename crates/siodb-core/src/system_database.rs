//! The system database.
//!
//! A `SystemDatabase` is a regular database whose
//! `is_system_database()` is true and which additionally hosts the
//! instance-wide catalog tables: known users, known databases, user
//! access keys and permissions. The id streams for users and databases
//! are backed by the TRID counters of those tables.

use crate::database::{Database, DatabaseContext};
use crate::error::{DbError, DbResult};
use crate::reg::{DatabaseRecord, UserRecord};
use crate::table::Table;
use siodb_commons::constants::{
    SUPER_USER_ID, SUPER_USER_NAME, SYSTEM_DATABASE_ID, SYSTEM_DATABASE_NAME,
    SYSTEM_DATABASE_ONLY_TABLE_NAMES,
};
use siodb_commons::{DatabaseId, UserId};
use std::sync::Arc;

/// The system database of an instance.
pub struct SystemDatabase {
    database: Arc<Database>,
}

impl SystemDatabase {
    /// Creates the system database for a new instance and records the
    /// superuser and the system database itself into its catalog.
    pub(crate) fn create(
        ctx: &DatabaseContext,
        cipher_id: Option<String>,
        cipher_key: Vec<u8>,
        create_timestamp: i64,
    ) -> DbResult<Self> {
        let database = Database::create(
            ctx,
            SYSTEM_DATABASE_ID,
            SYSTEM_DATABASE_NAME,
            cipher_id.clone(),
            cipher_key.clone(),
            create_timestamp,
            true,
        )?;
        for &name in SYSTEM_DATABASE_ONLY_TABLE_NAMES {
            database.create_system_table(name)?;
        }

        // The superuser and the system database itself occupy the first
        // system-range rows of their tables; their row ids are reserved
        // before anything else is recorded.
        database
            .get_table_checked("SYS_USERS")?
            .set_last_system_trid(SUPER_USER_ID as u64);
        database
            .get_table_checked("SYS_DATABASES")?
            .set_last_system_trid(SYSTEM_DATABASE_ID as u64);

        let system = SystemDatabase { database };
        system.record_user(UserRecord {
            id: SUPER_USER_ID,
            name: SUPER_USER_NAME.to_string(),
            real_name: None,
            active: true,
        })?;
        system.record_database(DatabaseRecord {
            id: SYSTEM_DATABASE_ID,
            uuid: system.database.uuid(),
            name: SYSTEM_DATABASE_NAME.to_string(),
            cipher_id,
            cipher_key,
            create_timestamp,
        })?;
        Ok(system)
    }

    /// Opens the system database of an existing instance.
    pub(crate) fn open(ctx: &DatabaseContext, record: &DatabaseRecord) -> DbResult<Self> {
        let database = Database::open(ctx, record, true)?;
        for &name in SYSTEM_DATABASE_ONLY_TABLE_NAMES {
            database.load_system_table(name)?;
        }
        Ok(SystemDatabase { database })
    }

    /// The underlying database object.
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Always true.
    pub fn is_system_database(&self) -> bool {
        self.database.is_system_database()
    }

    /// Looks up a table of the system database.
    pub fn get_table_checked(&self, table_name: &str) -> DbResult<Arc<Table>> {
        self.database.get_table_checked(table_name)
    }

    /// Generates the next unique database id.
    pub fn generate_next_database_id(&self, system: bool) -> DbResult<DatabaseId> {
        self.database.generate_next_database_id(system)
    }

    /// Generates the next unique user id.
    pub fn generate_next_user_id(&self) -> DbResult<UserId> {
        self.database.generate_next_user_id()
    }

    /// Records a database into the appropriate system table.
    pub fn record_database(&self, record: DatabaseRecord) -> DbResult<()> {
        self.database.insert_database_record(record)
    }

    /// Deletes a database record.
    pub fn delete_database(&self, database_id: DatabaseId) -> DbResult<()> {
        if database_id == SYSTEM_DATABASE_ID {
            return Err(DbError::CannotDropSystemObject {
                object: SYSTEM_DATABASE_NAME.to_string(),
            });
        }
        self.database.erase_database_record(database_id)
    }

    /// Reads the list of known databases from the system table.
    pub fn read_all_databases(&self) -> Vec<DatabaseRecord> {
        self.database.database_records()
    }

    /// Records a user into the appropriate system table.
    pub fn record_user(&self, record: UserRecord) -> DbResult<()> {
        self.database.insert_user_record(record)
    }

    /// Reads the list of known users from the system table.
    pub fn read_all_users(&self) -> Vec<UserRecord> {
        self.database.user_records()
    }

    /// Flushes durable state.
    pub fn close(&self) -> DbResult<()> {
        self.database.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siodb_commons::constants::{FIRST_USER_DATABASE_ID, FIRST_USER_USER_ID};
    use std::path::Path;
    use tempfile::tempdir;

    fn context(dir: &Path) -> DatabaseContext {
        DatabaseContext {
            instance_data_dir: dir.to_path_buf(),
            table_cache_capacity: 32,
        }
    }

    fn create_system_database(dir: &Path) -> SystemDatabase {
        SystemDatabase::create(&context(dir), None, Vec::new(), 1_600_000_000).unwrap()
    }

    #[test]
    fn test_system_database_flag_and_tables() {
        let dir = tempdir().unwrap();
        let system = create_system_database(dir.path());
        assert!(system.is_system_database());
        system.get_table_checked("SYS_TABLES").unwrap();
        system.get_table_checked("SYS_USERS").unwrap();
        system.get_table_checked("SYS_DATABASES").unwrap();
        system.get_table_checked("SYS_USER_PERMISSIONS").unwrap();
    }

    #[test]
    fn test_super_user_and_self_record_present() {
        let dir = tempdir().unwrap();
        let system = create_system_database(dir.path());

        let users = system.read_all_users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, SUPER_USER_ID);
        assert_eq!(users[0].name, SUPER_USER_NAME);

        let databases = system.read_all_databases();
        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].id, SYSTEM_DATABASE_ID);
        assert_eq!(databases[0].name, SYSTEM_DATABASE_NAME);
    }

    #[test]
    fn test_database_and_user_id_generation() {
        let dir = tempdir().unwrap();
        let system = create_system_database(dir.path());

        let first = system.generate_next_database_id(false).unwrap();
        let second = system.generate_next_database_id(false).unwrap();
        assert_eq!(first, FIRST_USER_DATABASE_ID);
        assert_eq!(second, FIRST_USER_DATABASE_ID + 1);

        // System-range database ids continue after the system database
        // itself.
        let system_id = system.generate_next_database_id(true).unwrap();
        assert_eq!(system_id, SYSTEM_DATABASE_ID + 1);
        assert!(system_id < FIRST_USER_DATABASE_ID);

        let user_id = system.generate_next_user_id().unwrap();
        assert_eq!(user_id, FIRST_USER_USER_ID);
    }

    #[test]
    fn test_cannot_delete_system_database_record() {
        let dir = tempdir().unwrap();
        let system = create_system_database(dir.path());
        let err = system.delete_database(SYSTEM_DATABASE_ID).unwrap_err();
        assert!(matches!(err, DbError::CannotDropSystemObject { .. }));
    }

    #[test]
    fn test_reopen_system_database() {
        let dir = tempdir().unwrap();
        let record;
        {
            let system = create_system_database(dir.path());
            record = system.read_all_databases()[0].clone();
            system.close().unwrap();
        }
        let reopened = SystemDatabase::open(&context(dir.path()), &record).unwrap();
        assert!(reopened.is_system_database());
        reopened.get_table_checked("SYS_USERS").unwrap();
        assert_eq!(reopened.read_all_users().len(), 1);
        // Id generation continues after the counters persisted.
        let id = reopened.generate_next_database_id(false).unwrap();
        assert_eq!(id, FIRST_USER_DATABASE_ID);
    }
}
