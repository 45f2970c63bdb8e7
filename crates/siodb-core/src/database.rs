//! The database catalog façade.
//!
//! A `Database` owns every registry, cache and durable metadata file of
//! one database, all protected by a single engine mutex. Public lookup
//! methods come in a `checked` variant that raises on absence and an
//! `unlocked` variant used internally once the mutex is held; composite
//! operations call the unlocked forms so several lookups stay atomic.
//!
//! Catalog mutations follow a persist-then-commit discipline: the
//! operation stages its changes under the mutex, writes the system
//! object snapshot, and restores the previous in-memory state if
//! persistence fails, so no partial mutation is ever observable.

use crate::cache::LruCache;
use crate::column::Column;
use crate::column_spec::{ColumnSpecification, SimpleColumnSpecification};
use crate::constraint::Constraint;
use crate::constraint_definition::ConstraintDefinition;
use crate::error::{DbError, DbResult, ErrorRecord};
use crate::reg::{
    compute_constraint_definition_hash, ColumnDefinitionConstraintRecord, ColumnDefinitionRecord,
    ColumnRecord, ColumnSetRecord, ConstraintDefinitionRecord, ConstraintRecord, DatabaseRecord,
    IndexRecord, TableRecord, UserRecord,
};
use crate::system_objects::{Registries, SystemObjectsSnapshot};
use crate::table::Table;
use chrono::Utc;
use parking_lot::Mutex;
use siodb_commons::constants::{
    DATABASE_DATA_DIR_PREFIX, FIRST_USER_DATABASE_ID, FIRST_USER_TABLE_COLUMN_DEFINITION_CONSTRAINT_ID,
    FIRST_USER_TABLE_COLUMN_DEFINITION_ID, FIRST_USER_TABLE_COLUMN_ID,
    FIRST_USER_TABLE_COLUMN_SET_COLUMN_ID, FIRST_USER_TABLE_COLUMN_SET_ID,
    FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID, FIRST_USER_TABLE_CONSTRAINT_ID,
    FIRST_USER_TABLE_ID, FIRST_USER_TABLE_INDEX_COLUMN_ID, FIRST_USER_TABLE_INDEX_ID,
    FIRST_USER_USER_ACCESS_KEY_ID, FIRST_USER_USER_ID, FIRST_USER_USER_PERMISSION_ID,
    INITIALIZATION_FLAG_FILE, MASTER_COLUMN_NAME, METADATA_FILE_NAME, SUPER_USER_ID,
    SYSTEM_OBJECTS_FILE_NAME, SYSTEM_TABLE_NAMES,
};
use siodb_commons::{
    compute_database_uuid, is_valid_object_name, ColumnDataType, ColumnDefinitionId, ColumnId,
    ColumnSetId, ConstraintDefinitionId, ConstraintExpression, ConstraintId, ConstraintType,
    DatabaseId, TableId, TableType, TransactionId, UserId, Value,
};
use siodb_store::{
    create_cipher_contexts, DataFileRef, DatabaseMetadataFile, EncryptedFile, PlainFile,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Capacity of the constraint definition cache of one database.
const CONSTRAINT_DEFINITION_CACHE_CAPACITY: usize = 256;

/// Identity of the transaction a catalog mutation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionParameters {
    pub user_id: UserId,
    pub transaction_id: TransactionId,
}

/// Construction parameters a database inherits from its instance.
#[derive(Debug, Clone)]
pub(crate) struct DatabaseContext {
    pub instance_data_dir: PathBuf,
    pub table_cache_capacity: usize,
}

/// In-memory counters used to mint system object ids before the system
/// tables themselves exist.
#[derive(Debug, Clone, Default)]
struct TemporaryTridCounters {
    last_table_id: u64,
    last_column_id: u64,
    last_column_set_id: u64,
    last_column_set_column_id: u64,
    last_column_definition_id: u64,
    last_constraint_definition_id: u64,
    last_constraint_id: u64,
    last_column_definition_constraint_id: u64,
    last_index_id: u64,
    last_index_column_id: u64,
}

struct DatabaseState {
    registries: Registries,
    table_cache: LruCache<TableId, Arc<Table>>,
    constraint_definition_cache: LruCache<ConstraintDefinitionId, Arc<ConstraintDefinition>>,
    metadata: DatabaseMetadataFile,
    sys_table_handles: HashMap<&'static str, Arc<Table>>,
    tmp_trid_counters: TemporaryTridCounters,
    closed: bool,
}

/// Saved pre-mutation state used to undo a failed catalog operation.
struct StateBackup {
    registries: Registries,
    tmp_trid_counters: TemporaryTridCounters,
    trid_counters: Vec<(Arc<Table>, u64, u64)>,
}

impl StateBackup {
    fn capture(state: &DatabaseState) -> Self {
        StateBackup {
            registries: state.registries.clone(),
            tmp_trid_counters: state.tmp_trid_counters.clone(),
            trid_counters: state
                .sys_table_handles
                .values()
                .map(|t| (t.clone(), t.last_system_trid(), t.last_user_trid()))
                .collect(),
        }
    }

    fn restore(self, state: &mut DatabaseState) {
        state.registries = self.registries;
        state.tmp_trid_counters = self.tmp_trid_counters;
        for (table, last_system_trid, last_user_trid) in self.trid_counters {
            table.set_last_system_trid(last_system_trid);
            table.restore_last_user_trid(last_user_trid);
        }
    }
}

/// A database of the instance.
pub struct Database {
    self_ref: Weak<Database>,
    id: DatabaseId,
    name: String,
    uuid: Uuid,
    system: bool,
    cipher_id: Option<String>,
    cipher_key: Vec<u8>,
    create_timestamp: i64,
    instance_data_dir: PathBuf,
    data_dir: PathBuf,
    use_count: AtomicU64,
    state: Mutex<DatabaseState>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("system", &self.system)
            .finish()
    }
}

impl Database {
    // ----- construction -----

    /// Creates a new database with all of its on-disk structures.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        ctx: &DatabaseContext,
        id: DatabaseId,
        name: &str,
        cipher_id: Option<String>,
        cipher_key: Vec<u8>,
        create_timestamp: i64,
        system: bool,
    ) -> DbResult<Arc<Database>> {
        let name = Self::validate_database_name(name)?;
        let uuid = compute_database_uuid(name, create_timestamp);
        log::info!("Creating database '{}' ({})", name, uuid);

        let data_dir = Self::ensure_data_dir_at(&ctx.instance_data_dir, name, uuid, true)?;
        let metadata_path = data_dir.join(METADATA_FILE_NAME);
        let metadata = DatabaseMetadataFile::create(&metadata_path, SUPER_USER_ID).map_err(|e| {
            DbError::CannotCreateDatabaseMetadataFile {
                path: metadata_path.display().to_string(),
                database: name.to_string(),
                message: e.to_string(),
            }
        })?;

        let database = Self::new_arc(
            ctx, id, name, uuid, system, cipher_id, cipher_key, create_timestamp, data_dir,
            metadata,
        );

        {
            let mut state = database.state.lock();
            database.create_system_tables_locked(&mut state)?;
            database.save_system_objects_locked(&mut state)?;
        }
        database.create_initialization_flag_file()?;
        Ok(database)
    }

    /// Opens an existing database from its durable state.
    pub(crate) fn open(
        ctx: &DatabaseContext,
        record: &DatabaseRecord,
        system: bool,
    ) -> DbResult<Arc<Database>> {
        log::info!("Opening database '{}' ({})", record.name, record.uuid);
        let data_dir = Self::ensure_data_dir_at(&ctx.instance_data_dir, &record.name, record.uuid, false)?;
        let metadata_path = data_dir.join(METADATA_FILE_NAME);
        let metadata = DatabaseMetadataFile::open(&metadata_path).map_err(|e| {
            DbError::CannotOpenDatabaseMetadataFile {
                path: metadata_path.display().to_string(),
                database: record.name.clone(),
                message: e.to_string(),
            }
        })?;

        let database = Self::new_arc(
            ctx,
            record.id,
            &record.name,
            record.uuid,
            system,
            record.cipher_id.clone(),
            record.cipher_key.clone(),
            record.create_timestamp,
            data_dir,
            metadata,
        );

        {
            let mut state = database.state.lock();
            database.load_system_objects_locked(&mut state)?;
            database.load_system_table_handles_locked(&mut state)?;
        }
        Ok(database)
    }

    #[allow(clippy::too_many_arguments)]
    fn new_arc(
        ctx: &DatabaseContext,
        id: DatabaseId,
        name: &str,
        uuid: Uuid,
        system: bool,
        cipher_id: Option<String>,
        cipher_key: Vec<u8>,
        create_timestamp: i64,
        data_dir: PathBuf,
        metadata: DatabaseMetadataFile,
    ) -> Arc<Database> {
        let cipher_id = cipher_id.filter(|c| c != siodb_store::NO_CIPHER_ID);
        Arc::new_cyclic(|self_ref| Database {
            self_ref: self_ref.clone(),
            id,
            name: name.to_string(),
            uuid,
            system,
            cipher_id,
            cipher_key,
            create_timestamp,
            instance_data_dir: ctx.instance_data_dir.clone(),
            data_dir,
            use_count: AtomicU64::new(0),
            state: Mutex::new(DatabaseState {
                registries: Registries::default(),
                table_cache: LruCache::new(ctx.table_cache_capacity),
                constraint_definition_cache: LruCache::new(CONSTRAINT_DEFINITION_CACHE_CAPACITY),
                metadata,
                sys_table_handles: HashMap::new(),
                tmp_trid_counters: TemporaryTridCounters::default(),
                closed: false,
            }),
        })
    }

    // ----- accessors -----

    pub fn id(&self) -> DatabaseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns true for the system database.
    pub fn is_system_database(&self) -> bool {
        self.system
    }

    pub fn cipher_id(&self) -> Option<&str> {
        self.cipher_id.as_deref()
    }

    pub fn create_timestamp(&self) -> i64 {
        self.create_timestamp
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Quoted display form of the database name.
    pub fn display_name(&self) -> String {
        format!("'{}'", self.name)
    }

    pub fn use_count(&self) -> u64 {
        self.use_count.load(Ordering::Acquire)
    }

    pub(crate) fn acquire_use(&self) {
        self.use_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Releases one use of the database.
    ///
    /// Fails on the transition from zero; the use count can never go
    /// negative.
    pub fn release(&self) -> DbResult<()> {
        loop {
            let current = self.use_count.load(Ordering::Acquire);
            if current == 0 {
                return Err(DbError::CannotReleaseUnusedDatabase {
                    database: self.name.clone(),
                    uuid: self.uuid,
                });
            }
            if self
                .use_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    // ----- table lookup -----

    /// Looks up a table by name, loading it if necessary.
    pub fn get_table_checked(&self, table_name: &str) -> DbResult<Arc<Table>> {
        let mut state = self.state.lock();
        match self.get_table_unlocked(&mut state, table_name)? {
            Some(table) => Ok(table),
            None => Err(DbError::TableDoesNotExist {
                database: self.name.clone(),
                table: table_name.to_string(),
            }),
        }
    }

    /// Looks up a table by id, loading it if necessary.
    pub fn get_table_checked_by_id(&self, table_id: TableId) -> DbResult<Arc<Table>> {
        let mut state = self.state.lock();
        match self.get_table_by_id_unlocked(&mut state, table_id)? {
            Some(table) => Ok(table),
            None => Err(DbError::TableDoesNotExist {
                database: self.name.clone(),
                table: table_id.to_string(),
            }),
        }
    }

    /// Looks up a table by name; `None` when it does not exist.
    pub fn get_table(&self, table_name: &str) -> DbResult<Option<Arc<Table>>> {
        let mut state = self.state.lock();
        self.get_table_unlocked(&mut state, table_name)
    }

    /// Returns true when the table exists in the registry.
    pub fn is_table_exists(&self, table_name: &str) -> bool {
        self.state.lock().registries.tables.contains_name(table_name)
    }

    /// Table names in ascending order.
    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().registries.tables.names_ordered()
    }

    fn get_table_unlocked(
        &self,
        state: &mut DatabaseState,
        table_name: &str,
    ) -> DbResult<Option<Arc<Table>>> {
        // System table handles stay live for the database's lifetime;
        // they must never be shadowed by a reloaded copy.
        if let Some(table) = state.sys_table_handles.get(table_name) {
            return Ok(Some(table.clone()));
        }
        let record = match state.registries.tables.get_by_name(table_name) {
            Some(record) => record.clone(),
            None => return Ok(None),
        };
        if let Some(table) = state.table_cache.get(&record.id) {
            return Ok(Some(table));
        }
        Ok(Some(self.load_table_unlocked(state, &record)?))
    }

    fn get_table_by_id_unlocked(
        &self,
        state: &mut DatabaseState,
        table_id: TableId,
    ) -> DbResult<Option<Arc<Table>>> {
        if let Some(table) = state
            .sys_table_handles
            .values()
            .find(|table| table.id() == table_id)
        {
            return Ok(Some(table.clone()));
        }
        let record = match state.registries.tables.get_by_id(table_id) {
            Some(record) => record.clone(),
            None => return Ok(None),
        };
        if let Some(table) = state.table_cache.get(&table_id) {
            return Ok(Some(table));
        }
        Ok(Some(self.load_table_unlocked(state, &record)?))
    }

    /// Rebuilds a table object from registry records and caches it.
    fn load_table_unlocked(
        &self,
        state: &mut DatabaseState,
        record: &TableRecord,
    ) -> DbResult<Arc<Table>> {
        let table = Arc::new(Table::from_record(
            self.self_ref.clone(),
            self.name.clone(),
            self.uuid,
            record,
        ));

        let column_set = state
            .registries
            .column_sets
            .get_by_id(record.current_column_set_id)
            .cloned()
            .ok_or(DbError::ColumnSetDoesNotExist {
                database: self.name.clone(),
                column_set_id: record.current_column_set_id,
            })?;

        let ordered_column_ids: Vec<ColumnId> = if column_set.columns.is_empty() {
            state
                .registries
                .columns
                .get_by_table(record.id)
                .iter()
                .map(|c| c.id)
                .collect()
        } else {
            let mut members = column_set.columns.clone();
            members.sort_by_key(|m| m.position);
            members.iter().map(|m| m.column_id).collect()
        };

        for column_id in ordered_column_ids {
            let column_record = state
                .registries
                .columns
                .get_by_id(column_id)
                .cloned()
                .ok_or(DbError::ColumnDoesNotExist {
                    database: self.name.clone(),
                    column_id,
                })?;
            let column = Arc::new(Column::from_record(&column_record, table.name().to_string()));
            self.apply_column_constraints_unlocked(state, &column)?;
            table.attach_loaded_column(column);
        }

        state.table_cache.emplace(table.id(), table.clone());
        log::debug!("Database {}: loaded table {}", self.name, table.display_name());
        Ok(table)
    }

    /// Restores the NOT NULL flag and current definition of a loaded
    /// column from its latest column definition.
    fn apply_column_constraints_unlocked(
        &self,
        state: &DatabaseState,
        column: &Arc<Column>,
    ) -> DbResult<()> {
        let definition_id = match state
            .registries
            .column_definitions
            .latest_for_column(column.id())
        {
            Some(id) => id,
            None => return Ok(()),
        };
        column.set_current_column_definition_id(definition_id);

        let definition = state
            .registries
            .column_definitions
            .get_by_id(definition_id)
            .cloned()
            .ok_or(DbError::ColumnDefinitionDoesNotExist {
                database: self.name.clone(),
                column_definition_id: definition_id,
            })?;
        for link in &definition.constraints {
            let constraint = match state.registries.constraints.get_by_id(link.constraint_id) {
                Some(constraint) => constraint,
                None => continue,
            };
            let def_record = match state
                .registries
                .constraint_definitions
                .get_by_id(constraint.constraint_definition_id)
            {
                Some(def_record) => def_record,
                None => continue,
            };
            if def_record.constraint_type == ConstraintType::NotNull {
                if let Ok(ConstraintExpression::Constant(Value::Bool(true))) =
                    ConstraintExpression::deserialize(&def_record.expression)
                {
                    column.set_not_null(true);
                }
            }
        }
        Ok(())
    }

    // ----- constraint definitions -----

    /// Creates or reuses a constraint definition.
    ///
    /// Returns the definition and a flag telling whether an existing one
    /// was reused. Definitions are interned by (partition, type,
    /// serialized expression); identical content on opposite sides of the
    /// system/user partition is never shared.
    pub fn create_constraint_definition(
        &self,
        system: bool,
        constraint_type: ConstraintType,
        expression: ConstraintExpression,
    ) -> DbResult<(Arc<ConstraintDefinition>, bool)> {
        let mut state = self.state.lock();
        let backup = StateBackup::capture(&state);
        let mut existing = false;
        let result = self
            .create_constraint_definition_unlocked(
                &mut state,
                system,
                constraint_type,
                expression,
                &mut existing,
            )
            .and_then(|definition| {
                if !existing {
                    self.save_system_objects_locked(&mut state)?;
                }
                Ok(definition)
            });
        match result {
            Ok(definition) => Ok((definition, existing)),
            Err(e) => {
                backup.restore(&mut state);
                Err(e)
            }
        }
    }

    /// Like [`Database::create_constraint_definition`], but accepts the
    /// pre-serialized expression used by load paths. The expression is
    /// deserialized only when no matching definition exists yet.
    pub fn find_or_create_constraint_definition(
        &self,
        system: bool,
        constraint_type: ConstraintType,
        serialized_expression: &[u8],
    ) -> DbResult<Arc<ConstraintDefinition>> {
        let mut state = self.state.lock();

        let found = state
            .registries
            .constraint_definitions
            .find_matching(system, constraint_type, serialized_expression)
            .map(|record| record.id);
        if let Some(id) = found {
            return self
                .get_constraint_definition_unlocked(&mut state, id)?
                .ok_or(DbError::ConstraintDefinitionDoesNotExist {
                    database: self.name.clone(),
                    constraint_definition_id: id,
                });
        }

        let expression = ConstraintExpression::deserialize(serialized_expression)?;
        let backup = StateBackup::capture(&state);
        let mut existing = false;
        let result = self
            .create_constraint_definition_unlocked(
                &mut state,
                system,
                constraint_type,
                expression,
                &mut existing,
            )
            .and_then(|definition| {
                self.save_system_objects_locked(&mut state)?;
                Ok(definition)
            });
        match result {
            Ok(definition) => Ok(definition),
            Err(e) => {
                backup.restore(&mut state);
                Err(e)
            }
        }
    }

    /// Looks up a constraint definition by id, loading it if necessary.
    pub fn get_constraint_definition_checked(
        &self,
        constraint_definition_id: ConstraintDefinitionId,
    ) -> DbResult<Arc<ConstraintDefinition>> {
        let mut state = self.state.lock();
        self.get_constraint_definition_unlocked(&mut state, constraint_definition_id)?
            .ok_or(DbError::ConstraintDefinitionDoesNotExist {
                database: self.name.clone(),
                constraint_definition_id,
            })
    }

    fn get_constraint_definition_unlocked(
        &self,
        state: &mut DatabaseState,
        id: ConstraintDefinitionId,
    ) -> DbResult<Option<Arc<ConstraintDefinition>>> {
        let record = match state.registries.constraint_definitions.get_by_id(id) {
            Some(record) => record.clone(),
            None => return Ok(None),
        };
        if let Some(definition) = state.constraint_definition_cache.get(&id) {
            return Ok(Some(definition));
        }
        let definition = Arc::new(ConstraintDefinition::from_record(&self.name, &record)?);
        state.constraint_definition_cache.emplace(id, definition.clone());
        Ok(Some(definition))
    }

    fn create_constraint_definition_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
        constraint_type: ConstraintType,
        expression: ConstraintExpression,
        existing: &mut bool,
    ) -> DbResult<Arc<ConstraintDefinition>> {
        let serialized = expression.serialize()?;

        let found = state
            .registries
            .constraint_definitions
            .find_matching(system, constraint_type, &serialized)
            .map(|record| record.id);
        if let Some(id) = found {
            *existing = true;
            return self
                .get_constraint_definition_unlocked(state, id)?
                .ok_or(DbError::ConstraintDefinitionDoesNotExist {
                    database: self.name.clone(),
                    constraint_definition_id: id,
                });
        }

        *existing = false;
        let id = self.generate_next_constraint_definition_id_unlocked(state, system)?;
        let hash = compute_constraint_definition_hash(constraint_type, &serialized);
        let definition = Arc::new(ConstraintDefinition::new(
            id,
            constraint_type,
            expression,
            serialized,
            hash,
        ));
        state
            .registries
            .constraint_definitions
            .insert(definition.to_record())
            .map_err(|e| self.integrity_violation(e))?;
        state.constraint_definition_cache.emplace(id, definition.clone());
        Ok(definition)
    }

    // ----- constraints -----

    /// Creates a named constraint on a table, optionally bound to one of
    /// its columns.
    pub fn create_constraint(
        &self,
        table: &Arc<Table>,
        column: Option<&Arc<Column>>,
        name: Option<&str>,
        definition: &Arc<ConstraintDefinition>,
    ) -> DbResult<Arc<Constraint>> {
        self.check_table_belongs_to_this_database(table, "create_constraint")?;
        if let Some(column) = column {
            table.check_column_belongs_to_table(column, "create_constraint")?;
        }

        let mut state = self.state.lock();
        let backup = StateBackup::capture(&state);
        let result = self
            .create_constraint_unlocked(&mut state, table, column.map(|c| c.as_ref()), name, definition)
            .and_then(|constraint| {
                self.save_system_objects_locked(&mut state)?;
                Ok(constraint)
            });
        match result {
            Ok(constraint) => Ok(constraint),
            Err(e) => {
                backup.restore(&mut state);
                Err(e)
            }
        }
    }

    /// Returns true when a constraint with this name exists.
    pub fn is_constraint_exists(&self, constraint_name: &str) -> bool {
        self.state
            .lock()
            .registries
            .constraints
            .contains_name(constraint_name)
    }

    fn create_constraint_unlocked(
        &self,
        state: &mut DatabaseState,
        table: &Arc<Table>,
        column: Option<&Column>,
        name: Option<&str>,
        definition: &Arc<ConstraintDefinition>,
    ) -> DbResult<Arc<Constraint>> {
        if !definition.constraint_type().is_supported() {
            return Err(DbError::ConstraintNotSupported {
                database: self.name.clone(),
                constraint_definition_id: definition.id(),
                constraint_type: definition.constraint_type() as u32,
            });
        }

        let id = self.generate_next_constraint_id_unlocked(state, table.is_system_table())?;
        let name = match name {
            Some(name) if !name.is_empty() => {
                if !is_valid_object_name(name) {
                    return Err(DbError::InvalidConstraintName {
                        name: name.to_string(),
                    });
                }
                name.to_string()
            }
            _ => format!(
                "{}_{}_{}",
                definition.constraint_type().auto_name_prefix(),
                table.id(),
                id
            ),
        };
        if state.registries.constraints.contains_name(&name) {
            return Err(DbError::ConstraintAlreadyExists {
                database: self.name.clone(),
                constraint: name,
            });
        }

        let constraint = Arc::new(Constraint::new(
            id,
            name,
            table.id(),
            table.name().to_string(),
            column.map(|c| c.id()),
            definition.clone(),
        ));
        state
            .registries
            .constraints
            .insert(constraint.to_record())
            .map_err(|e| self.integrity_violation(e))?;
        Ok(constraint)
    }

    /// Checks that a constraint definition has the expected type.
    pub fn check_constraint_type(
        &self,
        table: &Table,
        column: Option<&Column>,
        constraint_name: &str,
        definition: &ConstraintDefinition,
        expected: ConstraintType,
    ) -> DbResult<()> {
        if definition.constraint_type() == expected {
            return Ok(());
        }
        Err(self.constraint_type_mismatch(
            table,
            column,
            constraint_name,
            definition.constraint_type(),
            expected,
        ))
    }

    /// Checks that a constraint record's definition has the expected type.
    pub fn check_constraint_type_of_record(
        &self,
        table: &Table,
        column: Option<&Column>,
        constraint_record: &ConstraintRecord,
        expected: ConstraintType,
    ) -> DbResult<()> {
        let state = self.state.lock();
        let definition = state
            .registries
            .constraint_definitions
            .get_by_id(constraint_record.constraint_definition_id)
            .ok_or(DbError::ConstraintDefinitionDoesNotExist {
                database: self.name.clone(),
                constraint_definition_id: constraint_record.constraint_definition_id,
            })?;
        if definition.constraint_type == expected {
            return Ok(());
        }
        Err(self.constraint_type_mismatch(
            table,
            column,
            &constraint_record.name,
            definition.constraint_type,
            expected,
        ))
    }

    fn constraint_type_mismatch(
        &self,
        table: &Table,
        column: Option<&Column>,
        constraint_name: &str,
        actual: ConstraintType,
        expected: ConstraintType,
    ) -> DbError {
        match column {
            Some(column) => DbError::ColumnConstraintTypeDoesNotMatch {
                actual_type: actual as u32,
                expected_type: expected as u32,
                database: self.name.clone(),
                table: table.name().to_string(),
                column: column.name().to_string(),
                constraint: constraint_name.to_string(),
            },
            None => DbError::TableConstraintTypeDoesNotMatch {
                actual_type: actual as u32,
                expected_type: expected as u32,
                database: self.name.clone(),
                table: table.name().to_string(),
                constraint: constraint_name.to_string(),
            },
        }
    }

    // ----- user table creation -----

    /// Creates a user table from shorthand column specifications.
    pub fn create_user_table_simple(
        &self,
        name: &str,
        table_type: TableType,
        column_specs: Vec<SimpleColumnSpecification>,
        current_user_id: UserId,
    ) -> DbResult<Arc<Table>> {
        let specs: Vec<ColumnSpecification> =
            column_specs.into_iter().map(ColumnSpecification::from).collect();
        self.create_user_table(name, table_type, &specs, current_user_id)
    }

    /// Creates a user table.
    ///
    /// Validation examines the whole batch of column specifications and
    /// reports every problem at once as a compound error; nothing is
    /// registered unless the whole batch is valid and persisted.
    pub fn create_user_table(
        &self,
        name: &str,
        table_type: TableType,
        column_specs: &[ColumnSpecification],
        current_user_id: UserId,
    ) -> DbResult<Arc<Table>> {
        if table_type != TableType::Disk {
            return Err(DbError::TableTypeNotSupported {
                table_type: table_type as u32,
            });
        }
        if !is_valid_object_name(name) {
            return Err(DbError::InvalidTableName {
                name: name.to_string(),
            });
        }

        log::debug!("Database {}: creating user table {}", self.name, name);

        let mut state = self.state.lock();
        self.validate_user_table_specs(&state, column_specs)?;

        let backup = StateBackup::capture(&state);
        let result =
            self.create_user_table_locked(&mut state, name, table_type, column_specs, current_user_id);
        match result {
            Ok(table) => {
                state.table_cache.emplace(table.id(), table.clone());
                Ok(table)
            }
            Err(e) => {
                backup.restore(&mut state);
                Err(e)
            }
        }
    }

    /// Batch validation of column and constraint specifications.
    ///
    /// Empty constraint names are exempt from the uniqueness checks; they
    /// receive an automatically generated name at creation time.
    fn validate_user_table_specs(
        &self,
        state: &DatabaseState,
        column_specs: &[ColumnSpecification],
    ) -> DbResult<()> {
        let mut errors: Vec<ErrorRecord> = Vec::new();
        let mut known_columns = std::collections::HashSet::new();
        let mut known_constraints = std::collections::HashSet::new();
        let mut constraint_counts: HashMap<u32, usize> = HashMap::new();

        for column_spec in column_specs {
            if !is_valid_object_name(&column_spec.name) {
                errors.push(ErrorRecord::from_error(&DbError::InvalidColumnName {
                    name: column_spec.name.clone(),
                }));
                continue;
            }

            if !known_columns.insert(column_spec.name.as_str()) {
                errors.push(ErrorRecord::from_error(
                    &DbError::CreateTableDuplicateColumnName {
                        name: column_spec.name.clone(),
                    },
                ));
                continue;
            }

            constraint_counts.clear();
            for constraint_spec in &column_spec.constraints {
                *constraint_counts
                    .entry(constraint_spec.constraint_type as u32)
                    .or_insert(0) += 1;
                if constraint_spec.name.is_empty() {
                    continue;
                }
                if !is_valid_object_name(&constraint_spec.name) {
                    errors.push(ErrorRecord::from_error(&DbError::InvalidConstraintName {
                        name: constraint_spec.name.clone(),
                    }));
                    continue;
                }
                if !known_constraints.insert(constraint_spec.name.as_str()) {
                    errors.push(ErrorRecord::from_error(
                        &DbError::CreateTableDuplicateConstraintName {
                            name: constraint_spec.name.clone(),
                        },
                    ));
                }
                if state
                    .registries
                    .constraints
                    .contains_name(&constraint_spec.name)
                {
                    errors.push(ErrorRecord::from_error(&DbError::ConstraintAlreadyExists {
                        database: self.name.clone(),
                        constraint: constraint_spec.name.clone(),
                    }));
                }
            }

            for (constraint_type, count) in &constraint_counts {
                if *count > 1 {
                    let type_name = match *constraint_type {
                        0 => ConstraintType::NotNull.name(),
                        1 => ConstraintType::DefaultValue.name(),
                        _ => "constraint",
                    };
                    errors.push(ErrorRecord::from_error(
                        &DbError::CreateTableDuplicateColumnConstraintType {
                            constraint_type: type_name.to_string(),
                            column: column_spec.name.clone(),
                        },
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            log::error!(
                "Database {}: create table validation produced {} errors",
                self.name,
                errors.len()
            );
            for error in &errors {
                log::error!("[{}] {}", error.code, error.message);
            }
            Err(DbError::compound(errors))
        }
    }

    fn create_user_table_locked(
        &self,
        state: &mut DatabaseState,
        name: &str,
        table_type: TableType,
        column_specs: &[ColumnSpecification],
        current_user_id: UserId,
    ) -> DbResult<Arc<Table>> {
        let table = self.create_table_unlocked(state, name, table_type, 0, false)?;

        for column_spec in column_specs {
            self.create_column_unlocked(state, &table, column_spec, false)?;
        }

        let column_set_record = table.close_current_column_set();
        state
            .registries
            .column_sets
            .replace(column_set_record)
            .map_err(|e| self.integrity_violation(e))?;

        let tp = TransactionParameters {
            user_id: current_user_id,
            transaction_id: state.metadata.generate_next_transaction_id(),
        };
        self.record_table_definition_locked(state, &table, &tp)?;
        Ok(table)
    }

    /// Creates a table and its master column; no caching, the caller
    /// decides when the table becomes visible.
    fn create_table_unlocked(
        &self,
        state: &mut DatabaseState,
        name: &str,
        table_type: TableType,
        first_user_trid: u64,
        system: bool,
    ) -> DbResult<Arc<Table>> {
        if state.registries.tables.contains_name(name) {
            return Err(DbError::TableAlreadyExists {
                database: self.name.clone(),
                table: name.to_string(),
            });
        }

        let table_id = self.generate_next_table_id_unlocked(state, system)?;
        let column_set_id = self.generate_next_column_set_id_unlocked(state, system)?;
        let first_user_trid = if first_user_trid == 0 { 1 } else { first_user_trid };

        let table = Arc::new(Table::new(
            self.self_ref.clone(),
            self.name.clone(),
            self.uuid,
            table_id,
            name.to_string(),
            table_type,
            first_user_trid,
            column_set_id,
        ));

        state
            .registries
            .column_sets
            .insert(ColumnSetRecord {
                id: column_set_id,
                table_id,
                columns: Vec::new(),
            })
            .map_err(|e| self.integrity_violation(e))?;
        state
            .registries
            .tables
            .insert(table.to_record())
            .map_err(|e| self.integrity_violation(e))?;

        // Every disk table starts with the master column.
        let master_spec = ColumnSpecification::new(MASTER_COLUMN_NAME, ColumnDataType::UInt64)
            .with_constraint(
                "",
                ConstraintType::NotNull,
                ConstraintExpression::constant(Value::Bool(true)),
            );
        self.create_column_unlocked(state, &table, &master_spec, system)?;

        Ok(table)
    }

    /// Creates a column, its first column definition and its constraints.
    fn create_column_unlocked(
        &self,
        state: &mut DatabaseState,
        table: &Arc<Table>,
        column_spec: &ColumnSpecification,
        system: bool,
    ) -> DbResult<Arc<Column>> {
        if !is_valid_object_name(&column_spec.name) {
            return Err(DbError::InvalidColumnName {
                name: column_spec.name.clone(),
            });
        }
        if table.find_column(&column_spec.name).is_some() {
            return Err(DbError::CreateTableDuplicateColumnName {
                name: column_spec.name.clone(),
            });
        }

        let column_id = self.generate_next_column_id_unlocked(state, system)?;
        let column = Arc::new(Column::new(
            column_id,
            table.id(),
            table.name().to_string(),
            column_spec.name.clone(),
            column_spec.data_type,
            column_spec.block_data_area_size,
        ));
        state
            .registries
            .columns
            .insert(column.to_record())
            .map_err(|e| self.integrity_violation(e))?;

        let column_set_column_id =
            self.generate_next_column_set_column_id_unlocked(state, system)?;
        table.add_column(column.clone(), column_set_column_id)?;

        let column_definition_id =
            self.generate_next_column_definition_id_unlocked(state, system)?;
        let mut constraint_links = Vec::with_capacity(column_spec.constraints.len());
        for constraint_spec in &column_spec.constraints {
            let mut existing = false;
            let definition = self.create_constraint_definition_unlocked(
                state,
                system,
                constraint_spec.constraint_type,
                constraint_spec.expression.clone(),
                &mut existing,
            )?;
            let constraint_name = if constraint_spec.name.is_empty() {
                None
            } else {
                Some(constraint_spec.name.as_str())
            };
            let constraint = self.create_constraint_unlocked(
                state,
                table,
                Some(&column),
                constraint_name,
                &definition,
            )?;
            if constraint.not_null() {
                column.set_not_null(true);
            }
            let link_id =
                self.generate_next_column_definition_constraint_id_unlocked(state, system)?;
            constraint_links.push(ColumnDefinitionConstraintRecord {
                id: link_id,
                column_definition_id,
                constraint_id: constraint.id(),
            });
        }

        state
            .registries
            .column_definitions
            .insert(ColumnDefinitionRecord {
                id: column_definition_id,
                column_id,
                constraints: constraint_links,
            })
            .map_err(|e| self.integrity_violation(e))?;
        column.set_current_column_definition_id(column_definition_id);

        Ok(column)
    }

    /// Persists the table definition to the system tables.
    fn record_table_definition_locked(
        &self,
        state: &mut DatabaseState,
        table: &Arc<Table>,
        tp: &TransactionParameters,
    ) -> DbResult<()> {
        log::debug!(
            "Database {}: recording definition of table {} (transaction #{}, user #{})",
            self.name,
            table.display_name(),
            tp.transaction_id,
            tp.user_id
        );
        self.save_system_objects_locked(state)
    }

    // ----- system tables -----

    /// Bootstraps the catalog tables of a new database.
    ///
    /// The id service cannot use the system tables before they exist, so
    /// creation runs on temporary in-memory counters; once every table is
    /// present, the allocated ranges are handed over to the tables'
    /// system TRID counters in one shot.
    fn create_system_tables_locked(&self, state: &mut DatabaseState) -> DbResult<()> {
        let mut created: Vec<(&'static str, Arc<Table>)> = Vec::new();
        for &name in SYSTEM_TABLE_NAMES {
            let table = self.create_table_unlocked(
                state,
                name,
                TableType::Disk,
                system_table_first_user_trid(name),
                true,
            )?;
            let column_set_record = table.close_current_column_set();
            state
                .registries
                .column_sets
                .replace(column_set_record)
                .map_err(|e| self.integrity_violation(e))?;
            state.table_cache.emplace(table.id(), table.clone());
            created.push((name, table));
        }
        for (name, table) in created {
            state.sys_table_handles.insert(name, table);
        }
        self.handover_trid_counters_locked(state);
        Ok(())
    }

    /// Creates one additional catalog table after bootstrap; used by the
    /// system database for its extra tables.
    pub(crate) fn create_system_table(&self, name: &'static str) -> DbResult<Arc<Table>> {
        let mut state = self.state.lock();
        let backup = StateBackup::capture(&state);
        let result = (|| {
            let table = self.create_table_unlocked(
                &mut state,
                name,
                TableType::Disk,
                system_table_first_user_trid(name),
                true,
            )?;
            let column_set_record = table.close_current_column_set();
            state
                .registries
                .column_sets
                .replace(column_set_record)
                .map_err(|e| self.integrity_violation(e))?;
            self.save_system_objects_locked(&mut state)?;
            Ok(table)
        })();
        match result {
            Ok(table) => {
                state.table_cache.emplace(table.id(), table.clone());
                state.sys_table_handles.insert(name, table.clone());
                Ok(table)
            }
            Err(e) => {
                backup.restore(&mut state);
                Err(e)
            }
        }
    }

    fn handover_trid_counters_locked(&self, state: &mut DatabaseState) {
        let tmp = state.tmp_trid_counters.clone();
        let assignments: [(&str, u64); 10] = [
            ("SYS_TABLES", tmp.last_table_id),
            ("SYS_COLUMNS", tmp.last_column_id),
            ("SYS_COLUMN_SETS", tmp.last_column_set_id),
            ("SYS_COLUMN_SET_COLUMNS", tmp.last_column_set_column_id),
            ("SYS_COLUMN_DEFS", tmp.last_column_definition_id),
            ("SYS_CONSTRAINT_DEFS", tmp.last_constraint_definition_id),
            ("SYS_CONSTRAINTS", tmp.last_constraint_id),
            (
                "SYS_COLUMN_DEF_CONSTRAINTS",
                tmp.last_column_definition_constraint_id,
            ),
            ("SYS_INDICES", tmp.last_index_id),
            ("SYS_INDEX_COLUMNS", tmp.last_index_column_id),
        ];
        for (name, last_system_trid) in assignments {
            if let Some(table) = state.sys_table_handles.get(name) {
                table.set_last_system_trid(last_system_trid);
            }
        }
    }

    /// Loads a catalog table during open; the registry must already hold
    /// its record.
    fn load_system_table_handles_locked(&self, state: &mut DatabaseState) -> DbResult<()> {
        for &name in SYSTEM_TABLE_NAMES {
            let table = self.get_table_unlocked(state, name)?.ok_or_else(|| {
                DbError::MissingSystemTable {
                    database: self.name.clone(),
                    table: name.to_string(),
                }
            })?;
            state.sys_table_handles.insert(name, table);
        }
        Ok(())
    }

    /// Loads one extra catalog table handle; used by the system database.
    pub(crate) fn load_system_table(&self, name: &'static str) -> DbResult<Arc<Table>> {
        let mut state = self.state.lock();
        let table = self.get_table_unlocked(&mut state, name)?.ok_or_else(|| {
            DbError::MissingSystemTable {
                database: self.name.clone(),
                table: name.to_string(),
            }
        })?;
        state.sys_table_handles.insert(name, table.clone());
        Ok(table)
    }

    // ----- id generation -----

    fn system_table_unlocked(
        state: &DatabaseState,
        name: &'static str,
    ) -> Option<Arc<Table>> {
        state.sys_table_handles.get(name).cloned()
    }

    fn require_system_table(&self, state: &DatabaseState, name: &'static str) -> DbResult<Arc<Table>> {
        Self::system_table_unlocked(state, name).ok_or_else(|| DbError::MissingSystemTable {
            database: self.name.clone(),
            table: name.to_string(),
        })
    }

    fn generate_next_table_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<TableId> {
        let id = if system {
            match Self::system_table_unlocked(state, "SYS_TABLES") {
                Some(table) => table.generate_next_system_trid()?,
                None => {
                    state.tmp_trid_counters.last_table_id += 1;
                    state.tmp_trid_counters.last_table_id
                }
            }
        } else {
            self.require_system_table(state, "SYS_TABLES")?
                .generate_next_user_trid()?
        };
        if id >= TableId::MAX as u64 {
            return Err(DbError::ResourceExhausted {
                database: self.name.clone(),
                resource: "Table ID".to_string(),
            });
        }
        Ok(id as TableId)
    }

    fn generate_next_column_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<ColumnId> {
        if system {
            match Self::system_table_unlocked(state, "SYS_COLUMNS") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_column_id += 1;
                    Ok(state.tmp_trid_counters.last_column_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_COLUMNS")?
                .generate_next_user_trid()
        }
    }

    fn generate_next_column_set_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<ColumnSetId> {
        if system {
            match Self::system_table_unlocked(state, "SYS_COLUMN_SETS") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_column_set_id += 1;
                    Ok(state.tmp_trid_counters.last_column_set_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_COLUMN_SETS")?
                .generate_next_user_trid()
        }
    }

    fn generate_next_column_set_column_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<u64> {
        if system {
            match Self::system_table_unlocked(state, "SYS_COLUMN_SET_COLUMNS") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_column_set_column_id += 1;
                    Ok(state.tmp_trid_counters.last_column_set_column_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_COLUMN_SET_COLUMNS")?
                .generate_next_user_trid()
        }
    }

    fn generate_next_column_definition_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<ColumnDefinitionId> {
        if system {
            match Self::system_table_unlocked(state, "SYS_COLUMN_DEFS") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_column_definition_id += 1;
                    Ok(state.tmp_trid_counters.last_column_definition_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_COLUMN_DEFS")?
                .generate_next_user_trid()
        }
    }

    fn generate_next_constraint_definition_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<ConstraintDefinitionId> {
        if system {
            match Self::system_table_unlocked(state, "SYS_CONSTRAINT_DEFS") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_constraint_definition_id += 1;
                    Ok(state.tmp_trid_counters.last_constraint_definition_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_CONSTRAINT_DEFS")?
                .generate_next_user_trid()
        }
    }

    fn generate_next_constraint_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<ConstraintId> {
        if system {
            match Self::system_table_unlocked(state, "SYS_CONSTRAINTS") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_constraint_id += 1;
                    Ok(state.tmp_trid_counters.last_constraint_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_CONSTRAINTS")?
                .generate_next_user_trid()
        }
    }

    fn generate_next_column_definition_constraint_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<u64> {
        if system {
            match Self::system_table_unlocked(state, "SYS_COLUMN_DEF_CONSTRAINTS") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_column_definition_constraint_id += 1;
                    Ok(state.tmp_trid_counters.last_column_definition_constraint_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_COLUMN_DEF_CONSTRAINTS")?
                .generate_next_user_trid()
        }
    }

    fn generate_next_index_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<u64> {
        if system {
            match Self::system_table_unlocked(state, "SYS_INDICES") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_index_id += 1;
                    Ok(state.tmp_trid_counters.last_index_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_INDICES")?
                .generate_next_user_trid()
        }
    }

    fn generate_next_index_column_id_unlocked(
        &self,
        state: &mut DatabaseState,
        system: bool,
    ) -> DbResult<u64> {
        if system {
            match Self::system_table_unlocked(state, "SYS_INDEX_COLUMNS") {
                Some(table) => table.generate_next_system_trid(),
                None => {
                    state.tmp_trid_counters.last_index_column_id += 1;
                    Ok(state.tmp_trid_counters.last_index_column_id)
                }
            }
        } else {
            self.require_system_table(state, "SYS_INDEX_COLUMNS")?
                .generate_next_user_trid()
        }
    }

    /// Allocates the next transaction id of this database.
    pub fn generate_next_transaction_id(&self) -> TransactionId {
        self.state.lock().metadata.generate_next_transaction_id()
    }

    // ----- registration wrappers -----

    /// Registers a table record.
    pub fn register_table(&self, record: TableRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        let name = record.name.clone();
        state.registries.tables.insert(record).map_err(|e| match e {
            crate::reg::RegistryError::DuplicateName(_) => DbError::TableAlreadyExists {
                database: self.name.clone(),
                table: name,
            },
            other => self.integrity_violation(other),
        })
    }

    /// Registers a column record.
    pub fn register_column(&self, record: ColumnRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        state
            .registries
            .columns
            .insert(record)
            .map_err(|e| self.integrity_violation(e))
    }

    /// Registers a column definition record.
    pub fn register_column_definition(&self, record: ColumnDefinitionRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        state
            .registries
            .column_definitions
            .insert(record)
            .map_err(|e| self.integrity_violation(e))
    }

    /// Re-registers an updated column definition record.
    pub fn update_column_definition_registration(
        &self,
        record: ColumnDefinitionRecord,
    ) -> DbResult<()> {
        let mut state = self.state.lock();
        let id = record.id;
        state
            .registries
            .column_definitions
            .replace(record)
            .map_err(|e| match e {
                crate::reg::RegistryError::NotFound(_) => DbError::ColumnDefinitionDoesNotExist {
                    database: self.name.clone(),
                    column_definition_id: id,
                },
                other => self.integrity_violation(other),
            })
    }

    /// Registers a column set record.
    pub fn register_column_set(&self, record: ColumnSetRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        state
            .registries
            .column_sets
            .insert(record)
            .map_err(|e| self.integrity_violation(e))
    }

    /// Re-registers an updated column set record.
    pub fn update_column_set_registration(&self, record: ColumnSetRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        let id = record.id;
        state
            .registries
            .column_sets
            .replace(record)
            .map_err(|e| match e {
                crate::reg::RegistryError::NotFound(_) => DbError::ColumnSetDoesNotExist {
                    database: self.name.clone(),
                    column_set_id: id,
                },
                other => self.integrity_violation(other),
            })
    }

    /// Registers a constraint definition record.
    pub fn register_constraint_definition(
        &self,
        record: ConstraintDefinitionRecord,
    ) -> DbResult<()> {
        let mut state = self.state.lock();
        state
            .registries
            .constraint_definitions
            .insert(record)
            .map_err(|e| self.integrity_violation(e))
    }

    /// Registers a constraint record.
    pub fn register_constraint(&self, record: ConstraintRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        let name = record.name.clone();
        state.registries.constraints.insert(record).map_err(|e| match e {
            crate::reg::RegistryError::DuplicateName(_) => DbError::ConstraintAlreadyExists {
                database: self.name.clone(),
                constraint: name,
            },
            other => self.integrity_violation(other),
        })
    }

    /// Registers an index record.
    pub fn register_index(&self, record: IndexRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        state
            .registries
            .indexes
            .insert(record)
            .map_err(|e| self.integrity_violation(e))
    }

    /// Creates an index on a table and registers it.
    pub fn create_index(
        &self,
        table: &Arc<Table>,
        name: &str,
        index_type: crate::reg::IndexType,
        unique: bool,
        columns: &[(ColumnId, bool)],
    ) -> DbResult<IndexRecord> {
        self.check_table_belongs_to_this_database(table, "create_index")?;
        if !is_valid_object_name(name) {
            return Err(DbError::InvalidTableName {
                name: name.to_string(),
            });
        }
        let mut state = self.state.lock();
        let backup = StateBackup::capture(&state);
        let result = (|| {
            let system = table.is_system_table();
            let index_id = self.generate_next_index_id_unlocked(&mut state, system)?;
            let mut column_records = Vec::with_capacity(columns.len());
            for (column_id, sort_descending) in columns {
                let id = self.generate_next_index_column_id_unlocked(&mut state, system)?;
                column_records.push(crate::reg::IndexColumnRecord {
                    id,
                    index_id,
                    column_id: *column_id,
                    sort_descending: *sort_descending,
                });
            }
            let record = IndexRecord {
                id: index_id,
                table_id: table.id(),
                index_type,
                unique,
                name: name.to_string(),
                columns: column_records,
            };
            state
                .registries
                .indexes
                .insert(record.clone())
                .map_err(|e| self.integrity_violation(e))?;
            self.save_system_objects_locked(&mut state)?;
            Ok(record)
        })();
        match result {
            Ok(record) => Ok(record),
            Err(e) => {
                backup.restore(&mut state);
                Err(e)
            }
        }
    }

    // ----- record getters -----

    /// Returns the column set record with the given id.
    pub fn get_column_set_record(&self, column_set_id: ColumnSetId) -> DbResult<ColumnSetRecord> {
        let state = self.state.lock();
        state
            .registries
            .column_sets
            .get_by_id(column_set_id)
            .cloned()
            .ok_or(DbError::ColumnSetDoesNotExist {
                database: self.name.clone(),
                column_set_id,
            })
    }

    /// Returns the column record with the given id.
    pub fn get_column_record(&self, column_id: ColumnId) -> DbResult<ColumnRecord> {
        let state = self.state.lock();
        state
            .registries
            .columns
            .get_by_id(column_id)
            .cloned()
            .ok_or(DbError::ColumnDoesNotExist {
                database: self.name.clone(),
                column_id,
            })
    }

    /// Returns the column definition record with the given id.
    pub fn get_column_definition_record(
        &self,
        column_definition_id: ColumnDefinitionId,
    ) -> DbResult<ColumnDefinitionRecord> {
        let state = self.state.lock();
        state
            .registries
            .column_definitions
            .get_by_id(column_definition_id)
            .cloned()
            .ok_or(DbError::ColumnDefinitionDoesNotExist {
                database: self.name.clone(),
                column_definition_id,
            })
    }

    /// Id of the most recent column definition of the given column.
    pub fn get_latest_column_definition_id_for_column(
        &self,
        table_id: TableId,
        column_id: ColumnId,
    ) -> DbResult<ColumnDefinitionId> {
        let state = self.state.lock();
        state
            .registries
            .column_definitions
            .latest_for_column(column_id)
            .ok_or(DbError::MissingColumnDefinitionsForColumn {
                database_uuid: self.uuid,
                table_id,
                column_id,
            })
    }

    /// Returns the constraint record with the given id.
    pub fn get_constraint_record(&self, constraint_id: ConstraintId) -> DbResult<ConstraintRecord> {
        let state = self.state.lock();
        state
            .registries
            .constraints
            .get_by_id(constraint_id)
            .cloned()
            .ok_or(DbError::ConstraintDoesNotExist {
                database: self.name.clone(),
                constraint_id,
            })
    }

    /// Returns the index record with the given id.
    pub fn get_index_record(&self, index_id: u64) -> DbResult<IndexRecord> {
        let state = self.state.lock();
        state
            .registries
            .indexes
            .get_by_id(index_id)
            .cloned()
            .ok_or(DbError::IndexDoesNotExist {
                database: self.name.clone(),
                index_id,
            })
    }

    // ----- integrity checks -----

    /// Checks that a table belongs to this database.
    pub fn check_table_belongs_to_this_database(
        &self,
        table: &Table,
        operation: &str,
    ) -> DbResult<()> {
        if !table.database_weak().ptr_eq(&self.self_ref) {
            return Err(DbError::TableDoesNotBelongToDatabase {
                operation: operation.to_string(),
                table: table.name().to_string(),
                table_database: table.database_name().to_string(),
                table_database_uuid: table.database_uuid(),
                database: self.name.clone(),
                database_uuid: self.uuid,
            });
        }
        Ok(())
    }

    /// Loads every table in the registry; any load error indicates an
    /// inconsistency and surfaces to the caller.
    pub fn check_data_consistency(&self) -> DbResult<()> {
        let mut state = self.state.lock();
        let names = state.registries.tables.names_ordered();
        for name in names {
            let table = self.get_table_unlocked(&mut state, &name)?.ok_or_else(|| {
                DbError::TableDoesNotExist {
                    database: self.name.clone(),
                    table: name.clone(),
                }
            })?;
            log::debug!("Table {} OK", table.display_name());
        }
        Ok(())
    }

    // ----- files -----

    /// Validates a database name.
    pub fn validate_database_name(name: &str) -> DbResult<&str> {
        if is_valid_object_name(name) {
            Ok(name)
        } else {
            Err(DbError::InvalidDatabaseName {
                name: name.to_string(),
            })
        }
    }

    /// Creates a data file, encrypted when the database has a cipher.
    pub fn create_file<P: AsRef<Path>>(&self, path: P, initial_size: u64) -> DbResult<DataFileRef> {
        match &self.cipher_id {
            Some(cipher_id) => {
                match create_cipher_contexts(cipher_id, &self.cipher_key)? {
                    Some((encryption, decryption)) => Ok(Box::new(EncryptedFile::create(
                        path,
                        initial_size,
                        encryption,
                        decryption,
                    )?)),
                    None => Ok(Box::new(PlainFile::create(path, initial_size)?)),
                }
            }
            None => Ok(Box::new(PlainFile::create(path, initial_size)?)),
        }
    }

    /// Opens an existing data file, encrypted when the database has a
    /// cipher.
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> DbResult<DataFileRef> {
        match &self.cipher_id {
            Some(cipher_id) => match create_cipher_contexts(cipher_id, &self.cipher_key)? {
                Some((encryption, decryption)) => {
                    Ok(Box::new(EncryptedFile::open(path, encryption, decryption)?))
                }
                None => Ok(Box::new(PlainFile::open(path)?)),
            },
            None => Ok(Box::new(PlainFile::open(path)?)),
        }
    }

    /// Resolves (and on `create`, re-creates) the database data directory.
    pub fn ensure_data_dir(&self, create: bool) -> DbResult<PathBuf> {
        Self::ensure_data_dir_at(&self.instance_data_dir, &self.name, self.uuid, create)
    }

    pub(crate) fn ensure_data_dir_at(
        instance_data_dir: &Path,
        name: &str,
        uuid: Uuid,
        create: bool,
    ) -> DbResult<PathBuf> {
        let data_dir = instance_data_dir.join(format!("{}{}", DATABASE_DATA_DIR_PREFIX, uuid));
        let init_flag_file = data_dir.join(INITIALIZATION_FLAG_FILE);
        let init_flag_file_exists = init_flag_file.exists();
        if create {
            if init_flag_file_exists {
                return Err(DbError::DatabaseAlreadyExists {
                    database: name.to_string(),
                });
            }
            // A directory without the flag file is a leftover of an
            // interrupted creation; remove it and start over.
            if data_dir.exists() {
                std::fs::remove_dir_all(&data_dir).map_err(|e| {
                    DbError::CannotCreateDatabaseDataDir {
                        path: data_dir.display().to_string(),
                        database: name.to_string(),
                        message: e.to_string(),
                    }
                })?;
            }
            std::fs::create_dir_all(&data_dir).map_err(|e| DbError::CannotCreateDatabaseDataDir {
                path: data_dir.display().to_string(),
                database: name.to_string(),
                message: e.to_string(),
            })?;
        } else {
            if !data_dir.exists() {
                return Err(DbError::DatabaseDataFolderDoesNotExist {
                    database: name.to_string(),
                    path: data_dir.display().to_string(),
                });
            }
            if !init_flag_file_exists {
                return Err(DbError::DatabaseInitFileDoesNotExist {
                    database: name.to_string(),
                    path: init_flag_file.display().to_string(),
                });
            }
        }
        Ok(data_dir)
    }

    /// Writes the durable "database created" marker.
    pub fn create_initialization_flag_file(&self) -> DbResult<()> {
        let path = self.data_dir.join(INITIALIZATION_FLAG_FILE);
        let mut file = std::fs::File::create(&path).map_err(|_| {
            DbError::CannotCreateDatabaseInitializationFlagFile {
                path: path.display().to_string(),
                database: self.name.clone(),
                message: "create file failed".to_string(),
            }
        })?;
        use std::io::Write;
        write!(file, "{}", Utc::now().timestamp()).map_err(|_| {
            DbError::CannotCreateDatabaseInitializationFlagFile {
                path: path.display().to_string(),
                database: self.name.clone(),
                message: "write failed".to_string(),
            }
        })?;
        Ok(())
    }

    fn system_objects_file_path(&self) -> PathBuf {
        self.data_dir.join(SYSTEM_OBJECTS_FILE_NAME)
    }

    /// Super user id recorded in the metadata file.
    pub fn metadata_super_user_id(&self) -> u32 {
        self.state.lock().metadata.super_user_id()
    }

    // ----- durability -----

    fn sync_system_table_trid_counters_locked(&self, state: &mut DatabaseState) {
        let handles: Vec<Arc<Table>> = state.sys_table_handles.values().cloned().collect();
        for table in handles {
            if let Some(record) = state.registries.tables.get_by_id(table.id()) {
                let mut updated = record.clone();
                updated.last_system_trid = table.last_system_trid();
                updated.last_user_trid = table.last_user_trid();
                // The record is present, replace cannot fail.
                let _ = state.registries.tables.replace(updated);
            }
        }
    }

    fn save_system_objects_locked(&self, state: &mut DatabaseState) -> DbResult<()> {
        self.sync_system_table_trid_counters_locked(state);
        let snapshot = state.registries.to_snapshot();
        let path = self.system_objects_file_path();
        let mut file = self.create_file(&path, 0)?;
        snapshot
            .write_to(&mut *file)
            .map_err(|message| DbError::CannotSaveSystemObjects {
                database: self.name.clone(),
                message,
            })
    }

    fn load_system_objects_locked(&self, state: &mut DatabaseState) -> DbResult<()> {
        let path = self.system_objects_file_path();
        let file = self.open_file(&path)?;
        let snapshot =
            SystemObjectsSnapshot::read_from(&*file).map_err(|message| {
                DbError::CannotLoadSystemObjects {
                    database: self.name.clone(),
                    message,
                }
            })?;
        state.registries = Registries::from_snapshot(snapshot).map_err(|e| {
            DbError::CannotLoadSystemObjects {
                database: self.name.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    /// Flushes all durable state and marks the database closed.
    ///
    /// Only valid while no user holds the database.
    pub fn close(&self) -> DbResult<()> {
        if self.use_count() != 0 {
            return Err(DbError::DatabaseInUse {
                database: self.name.clone(),
            });
        }
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        self.save_system_objects_locked(&mut state)?;
        state.metadata.flush().map_err(|e| {
            DbError::CannotWriteDatabaseMetadataFile {
                database: self.name.clone(),
                message: e.to_string(),
            }
        })?;
        state.closed = true;
        log::info!("Closed database '{}'", self.name);
        Ok(())
    }

    // ----- system database support -----

    pub(crate) fn insert_database_record(&self, record: DatabaseRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        let backup = StateBackup::capture(&state);
        let name = record.name.clone();
        let result = state
            .registries
            .databases
            .insert(record)
            .map_err(|e| match e {
                crate::reg::RegistryError::DuplicateName(_) => DbError::DatabaseAlreadyExists {
                    database: name,
                },
                other => self.integrity_violation(other),
            })
            .and_then(|()| self.save_system_objects_locked(&mut state));
        if let Err(e) = result {
            backup.restore(&mut state);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn erase_database_record(&self, id: DatabaseId) -> DbResult<()> {
        let mut state = self.state.lock();
        let backup = StateBackup::capture(&state);
        let result = state
            .registries
            .databases
            .erase(id)
            .map_err(|e| self.integrity_violation(e))
            .and_then(|_| self.save_system_objects_locked(&mut state));
        if let Err(e) = result {
            backup.restore(&mut state);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn database_records(&self) -> Vec<DatabaseRecord> {
        self.state
            .lock()
            .registries
            .databases
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) fn insert_user_record(&self, record: UserRecord) -> DbResult<()> {
        let mut state = self.state.lock();
        let backup = StateBackup::capture(&state);
        let result = state
            .registries
            .users
            .insert(record)
            .map_err(|e| self.integrity_violation(e))
            .and_then(|()| self.save_system_objects_locked(&mut state));
        if let Err(e) = result {
            backup.restore(&mut state);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn user_records(&self) -> Vec<UserRecord> {
        self.state.lock().registries.users.iter().cloned().collect()
    }

    pub(crate) fn generate_next_database_id(&self, system: bool) -> DbResult<DatabaseId> {
        let state = self.state.lock();
        let table = self.require_system_table(&state, "SYS_DATABASES")?;
        let id = if system {
            table.generate_next_system_trid()?
        } else {
            table.generate_next_user_trid()?
        };
        if id >= DatabaseId::MAX as u64 {
            return Err(DbError::ResourceExhausted {
                database: self.name.clone(),
                resource: "Database ID".to_string(),
            });
        }
        Ok(id as DatabaseId)
    }

    pub(crate) fn generate_next_user_id(&self) -> DbResult<UserId> {
        let state = self.state.lock();
        let table = self.require_system_table(&state, "SYS_USERS")?;
        let id = table.generate_next_user_trid()?;
        if id >= UserId::MAX as u64 {
            return Err(DbError::ResourceExhausted {
                database: self.name.clone(),
                resource: "User ID".to_string(),
            });
        }
        Ok(id as UserId)
    }

    fn integrity_violation(&self, e: impl std::fmt::Display) -> DbError {
        DbError::CatalogIntegrityViolation {
            database: self.name.clone(),
            message: e.to_string(),
        }
    }
}

/// First user-range row id of a catalog table, by table name.
///
/// Rows of a catalog table are catalog objects, so the table's user TRID
/// range begins at the object kind's first user id.
fn system_table_first_user_trid(name: &str) -> u64 {
    match name {
        "SYS_TABLES" => FIRST_USER_TABLE_ID as u64,
        "SYS_COLUMNS" => FIRST_USER_TABLE_COLUMN_ID,
        "SYS_COLUMN_SETS" => FIRST_USER_TABLE_COLUMN_SET_ID,
        "SYS_COLUMN_SET_COLUMNS" => FIRST_USER_TABLE_COLUMN_SET_COLUMN_ID,
        "SYS_COLUMN_DEFS" => FIRST_USER_TABLE_COLUMN_DEFINITION_ID,
        "SYS_CONSTRAINT_DEFS" => FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID,
        "SYS_CONSTRAINTS" => FIRST_USER_TABLE_CONSTRAINT_ID,
        "SYS_COLUMN_DEF_CONSTRAINTS" => FIRST_USER_TABLE_COLUMN_DEFINITION_CONSTRAINT_ID,
        "SYS_INDICES" => FIRST_USER_TABLE_INDEX_ID,
        "SYS_INDEX_COLUMNS" => FIRST_USER_TABLE_INDEX_COLUMN_ID,
        "SYS_USERS" => FIRST_USER_USER_ID as u64,
        "SYS_USER_KEYS" => FIRST_USER_USER_ACCESS_KEY_ID,
        "SYS_DATABASES" => FIRST_USER_DATABASE_ID as u64,
        "SYS_USER_PERMISSIONS" => FIRST_USER_USER_PERMISSION_ID,
        _ => FIRST_USER_TABLE_ID as u64,
    }
}
