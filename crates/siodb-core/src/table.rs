//! Loaded table object.
//!
//! A table holds a non-owning back-reference to its database, valid only
//! while the database is alive; operations that cross databases verify
//! the reference instead of trusting the caller. The table also owns the
//! row id allocator of its two TRID branches: ids below
//! `first_user_trid` identify system objects stored in this table, ids
//! at or above it identify user objects.

use crate::column::Column;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::reg::{ColumnSetColumnRecord, ColumnSetRecord, TableRecord};
use parking_lot::Mutex;
use siodb_commons::constants::{FIRST_USER_TABLE_ID, MASTER_COLUMN_NAME};
use siodb_commons::{ColumnSetColumnId, ColumnSetId, TableId, TableType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Current column set of a table.
#[derive(Debug)]
pub(crate) struct CurrentColumnSet {
    pub id: ColumnSetId,
    pub closed: bool,
    pub columns: Vec<ColumnSetColumnRecord>,
}

#[derive(Debug)]
struct TableInner {
    /// Columns in positional order; the master column comes first.
    columns: Vec<Arc<Column>>,
    current_column_set: CurrentColumnSet,
}

/// A loaded table.
#[derive(Debug)]
pub struct Table {
    database: Weak<Database>,
    database_name: String,
    database_uuid: Uuid,
    id: TableId,
    name: String,
    table_type: TableType,
    first_user_trid: u64,
    last_system_trid: AtomicU64,
    last_user_trid: AtomicU64,
    inner: Mutex<TableInner>,
}

impl Table {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        database: Weak<Database>,
        database_name: String,
        database_uuid: Uuid,
        id: TableId,
        name: String,
        table_type: TableType,
        first_user_trid: u64,
        column_set_id: ColumnSetId,
    ) -> Self {
        Table {
            database,
            database_name,
            database_uuid,
            id,
            name,
            table_type,
            first_user_trid,
            last_system_trid: AtomicU64::new(0),
            last_user_trid: AtomicU64::new(first_user_trid.saturating_sub(1)),
            inner: Mutex::new(TableInner {
                columns: Vec::new(),
                current_column_set: CurrentColumnSet {
                    id: column_set_id,
                    closed: false,
                    columns: Vec::new(),
                },
            }),
        }
    }

    /// Rebuilds the object from its registry record. Columns are
    /// attached afterwards by the load path.
    pub(crate) fn from_record(
        database: Weak<Database>,
        database_name: String,
        database_uuid: Uuid,
        record: &TableRecord,
    ) -> Self {
        let table = Table::new(
            database,
            database_name,
            database_uuid,
            record.id,
            record.name.clone(),
            record.table_type,
            record.first_user_trid,
            record.current_column_set_id,
        );
        table
            .last_system_trid
            .store(record.last_system_trid, Ordering::Relaxed);
        table
            .last_user_trid
            .store(record.last_user_trid, Ordering::Relaxed);
        // A persisted table always has its column set closed.
        table.inner.lock().current_column_set.closed = true;
        table
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    pub fn first_user_trid(&self) -> u64 {
        self.first_user_trid
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn database_uuid(&self) -> Uuid {
        self.database_uuid
    }

    /// The owning database, while it is alive.
    pub fn database(&self) -> Option<Arc<Database>> {
        self.database.upgrade()
    }

    pub(crate) fn database_weak(&self) -> &Weak<Database> {
        &self.database
    }

    /// Returns true when this table is a catalog table.
    pub fn is_system_table(&self) -> bool {
        self.id < FIRST_USER_TABLE_ID
    }

    /// Quoted `'DB'.'TABLE'` form for messages.
    pub fn display_name(&self) -> String {
        format!("'{}'.'{}'", self.database_name, self.name)
    }

    /// Most recently allocated system-range row id.
    pub fn last_system_trid(&self) -> u64 {
        self.last_system_trid.load(Ordering::Relaxed)
    }

    /// Most recently allocated user-range row id.
    pub fn last_user_trid(&self) -> u64 {
        self.last_user_trid.load(Ordering::Relaxed)
    }

    pub(crate) fn set_last_system_trid(&self, value: u64) {
        self.last_system_trid.store(value, Ordering::Relaxed);
    }

    pub(crate) fn restore_last_user_trid(&self, value: u64) {
        self.last_user_trid.store(value, Ordering::Relaxed);
    }

    /// Allocates the next row id in the system range.
    ///
    /// Callers serialize through the database mutex.
    pub fn generate_next_system_trid(&self) -> DbResult<u64> {
        let next = self.last_system_trid.load(Ordering::Relaxed) + 1;
        if next >= self.first_user_trid {
            return Err(DbError::ResourceExhausted {
                database: self.database_name.clone(),
                resource: format!("system row id of table '{}'", self.name),
            });
        }
        self.last_system_trid.store(next, Ordering::Relaxed);
        Ok(next)
    }

    /// Allocates the next row id in the user range.
    pub fn generate_next_user_trid(&self) -> DbResult<u64> {
        let last = self.last_user_trid.load(Ordering::Relaxed);
        if last == u64::MAX - 1 {
            return Err(DbError::ResourceExhausted {
                database: self.database_name.clone(),
                resource: format!("row id of table '{}'", self.name),
            });
        }
        let next = last + 1;
        self.last_user_trid.store(next, Ordering::Relaxed);
        Ok(next)
    }

    /// The implicit first column of the table.
    pub fn master_column(&self) -> Option<Arc<Column>> {
        let inner = self.inner.lock();
        inner
            .columns
            .iter()
            .find(|c| c.name() == MASTER_COLUMN_NAME)
            .cloned()
    }

    /// Finds a column by name.
    pub fn find_column(&self, name: &str) -> Option<Arc<Column>> {
        let inner = self.inner.lock();
        inner.columns.iter().find(|c| c.name() == name).cloned()
    }

    /// Columns in positional order.
    pub fn columns(&self) -> Vec<Arc<Column>> {
        self.inner.lock().columns.clone()
    }

    pub fn column_count(&self) -> usize {
        self.inner.lock().columns.len()
    }

    /// Id of the column set currently in effect.
    pub fn current_column_set_id(&self) -> ColumnSetId {
        self.inner.lock().current_column_set.id
    }

    /// Checks that a column belongs to this table.
    pub fn check_column_belongs_to_table(
        &self,
        column: &Column,
        operation: &str,
    ) -> DbResult<()> {
        if column.table_id() != self.id {
            return Err(DbError::ColumnDoesNotBelongToTable {
                operation: operation.to_string(),
                column: column.name().to_string(),
                table: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Attaches a newly created column to the open column set.
    pub(crate) fn add_column(
        &self,
        column: Arc<Column>,
        column_set_column_id: ColumnSetColumnId,
    ) -> DbResult<()> {
        let mut inner = self.inner.lock();
        if inner.current_column_set.closed {
            return Err(DbError::CatalogIntegrityViolation {
                database: self.database_name.clone(),
                message: format!(
                    "cannot add column '{}' to table '{}': current column set is closed",
                    column.name(),
                    self.name
                ),
            });
        }
        let position = inner.current_column_set.columns.len() as u32;
        let column_set_id = inner.current_column_set.id;
        inner.current_column_set.columns.push(ColumnSetColumnRecord {
            id: column_set_column_id,
            column_set_id,
            column_id: column.id(),
            position,
        });
        inner.columns.push(column);
        Ok(())
    }

    /// Attaches an already-persisted column during table load.
    pub(crate) fn attach_loaded_column(&self, column: Arc<Column>) {
        self.inner.lock().columns.push(column);
    }

    /// Closes the current column set, freezing its membership, and
    /// returns the final record for registration.
    pub(crate) fn close_current_column_set(&self) -> ColumnSetRecord {
        let mut inner = self.inner.lock();
        inner.current_column_set.closed = true;
        ColumnSetRecord {
            id: inner.current_column_set.id,
            table_id: self.id,
            columns: inner.current_column_set.columns.clone(),
        }
    }

    pub(crate) fn to_record(&self) -> TableRecord {
        TableRecord {
            id: self.id,
            table_type: self.table_type,
            name: self.name.clone(),
            first_user_trid: self.first_user_trid,
            current_column_set_id: self.current_column_set_id(),
            last_system_trid: self.last_system_trid(),
            last_user_trid: self.last_user_trid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siodb_commons::ColumnDataType;

    fn table(first_user_trid: u64) -> Table {
        Table::new(
            Weak::new(),
            "DB1".to_string(),
            Uuid::nil(),
            4096,
            "T1".to_string(),
            TableType::Disk,
            first_user_trid,
            4096,
        )
    }

    #[test]
    fn test_trid_branches_are_partitioned() {
        let table = table(4096);
        assert_eq!(table.generate_next_system_trid().unwrap(), 1);
        assert_eq!(table.generate_next_system_trid().unwrap(), 2);
        assert_eq!(table.generate_next_user_trid().unwrap(), 4096);
        assert_eq!(table.generate_next_user_trid().unwrap(), 4097);
        // The branches do not disturb each other.
        assert_eq!(table.generate_next_system_trid().unwrap(), 3);
    }

    #[test]
    fn test_system_trid_exhaustion() {
        let table = table(3);
        assert_eq!(table.generate_next_system_trid().unwrap(), 1);
        assert_eq!(table.generate_next_system_trid().unwrap(), 2);
        assert!(matches!(
            table.generate_next_system_trid(),
            Err(DbError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_user_trid_exhaustion() {
        let table = table(1);
        table.last_user_trid.store(u64::MAX - 1, Ordering::Relaxed);
        assert!(matches!(
            table.generate_next_user_trid(),
            Err(DbError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_add_column_and_close_column_set() {
        let table = table(1);
        let column = Arc::new(Column::new(
            1,
            4096,
            "T1".to_string(),
            MASTER_COLUMN_NAME.to_string(),
            ColumnDataType::UInt64,
            32768,
        ));
        table.add_column(column, 1).unwrap();

        let record = table.close_current_column_set();
        assert_eq!(record.columns.len(), 1);
        assert_eq!(record.columns[0].position, 0);

        // The set is frozen now.
        let another = Arc::new(Column::new(
            2,
            4096,
            "T1".to_string(),
            "A".to_string(),
            ColumnDataType::Int32,
            32768,
        ));
        assert!(table.add_column(another, 2).is_err());
    }

    #[test]
    fn test_check_column_belongs_to_table() {
        let table = table(1);
        let foreign = Column::new(
            9,
            9999,
            "OTHER".to_string(),
            "C".to_string(),
            ColumnDataType::Int32,
            32768,
        );
        assert!(matches!(
            table.check_column_belongs_to_table(&foreign, "create_constraint"),
            Err(DbError::ColumnDoesNotBelongToTable { .. })
        ));
    }

    #[test]
    fn test_record_roundtrip_preserves_trid_counters() {
        let table = table(4096);
        table.generate_next_system_trid().unwrap();
        table.generate_next_user_trid().unwrap();
        let record = table.to_record();
        let restored = Table::from_record(
            Weak::new(),
            "DB1".to_string(),
            Uuid::nil(),
            &record,
        );
        assert_eq!(restored.last_system_trid(), 1);
        assert_eq!(restored.last_user_trid(), 4096);
        assert_eq!(restored.generate_next_user_trid().unwrap(), 4097);
    }

    #[test]
    fn test_system_table_predicate() {
        let system = Table::new(
            Weak::new(),
            "SYS".to_string(),
            Uuid::nil(),
            1,
            "SYS_TABLES".to_string(),
            TableType::Disk,
            FIRST_USER_TABLE_ID as u64,
            1,
        );
        assert!(system.is_system_table());
        assert!(!table(1).is_system_table());
    }
}
