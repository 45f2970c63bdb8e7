//! The DBMS instance.
//!
//! An instance exclusively owns its databases: the registry of database
//! records, the bounded cache of open database objects, and the system
//! database that hosts the instance-wide catalog tables. On first start
//! the instance creates its on-disk structures and the system database;
//! on later starts it loads them back and resumes every id sequence.

use crate::cache::LruCache;
use crate::database::{Database, DatabaseContext};
use crate::error::{DbError, DbResult};
use crate::reg::{DatabaseRecord, DatabaseRegistry, UserRecord, UserRegistry};
use crate::system_database::SystemDatabase;
use chrono::Utc;
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use siodb_commons::constants::{
    DATABASE_DATA_DIR_PREFIX, INITIALIZATION_FLAG_FILE, INSTANCE_METADATA_FILE_NAME,
    SYSTEM_DATABASE_NAME,
};
use siodb_commons::{is_valid_object_name, DatabaseId, UserId};
use siodb_configs::InstanceOptions;
use siodb_store::{get_cipher, NO_CIPHER_ID};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Name of the file holding the system database encryption key.
const SYSTEM_DB_KEY_FILE_NAME: &str = "system_db_key";

/// Durable identity of an instance.
#[derive(Debug, Serialize, Deserialize)]
struct InstanceMetadata {
    version: u32,
    uuid: Uuid,
    system_db_create_timestamp: i64,
}

const INSTANCE_METADATA_VERSION: u32 = 1;

struct InstanceState {
    database_registry: DatabaseRegistry,
    database_cache: LruCache<DatabaseId, Arc<Database>>,
    /// Every database object handed out this session, by id. Cache
    /// eviction drops only the cache's reference; this map keeps sight
    /// of objects callers still hold so the use count stays observable.
    open_databases: HashMap<DatabaseId, Weak<Database>>,
    user_registry: UserRegistry,
}

/// A DBMS instance.
pub struct Instance {
    uuid: Uuid,
    name: String,
    data_dir: PathBuf,
    default_cipher_id: String,
    table_cache_capacity: usize,
    block_cache_capacity: usize,
    user_cache_capacity: usize,
    system_database: SystemDatabase,
    state: Mutex<InstanceState>,
}

impl Instance {
    /// Creates or loads the instance described by the options.
    pub fn new(options: &InstanceOptions) -> DbResult<Instance> {
        let data_dir = PathBuf::from(&options.general.data_dir);
        std::fs::create_dir_all(&data_dir)?;

        let init_flag_path = data_dir.join(INITIALIZATION_FLAG_FILE);
        if init_flag_path.exists() {
            Self::load(options, data_dir)
        } else {
            Self::create(options, data_dir)
        }
    }

    fn create(options: &InstanceOptions, data_dir: PathBuf) -> DbResult<Instance> {
        log::info!(
            "Creating instance '{}' in {}",
            options.general.name,
            data_dir.display()
        );

        let uuid = Uuid::new_v4();
        let system_db_create_timestamp = Utc::now().timestamp();
        let metadata = InstanceMetadata {
            version: INSTANCE_METADATA_VERSION,
            uuid,
            system_db_create_timestamp,
        };
        let encoded = bincode::serialize(&metadata).map_err(|e| {
            DbError::CannotWriteDatabaseMetadataFile {
                database: options.general.name.clone(),
                message: e.to_string(),
            }
        })?;
        std::fs::write(data_dir.join(INSTANCE_METADATA_FILE_NAME), encoded)?;

        let cipher_id = normalize_cipher_id(&options.encryption.system_db_cipher_id);
        let cipher_key = match &cipher_id {
            Some(id) => load_or_create_key(&data_dir, id)?,
            None => Vec::new(),
        };

        let ctx = database_context(&data_dir, options);
        let system_database = SystemDatabase::create(
            &ctx,
            cipher_id,
            cipher_key,
            system_db_create_timestamp,
        )?;

        let instance = Instance::assemble(options, uuid, data_dir, system_database);
        instance.create_initialization_flag_file()?;
        Ok(instance)
    }

    fn load(options: &InstanceOptions, data_dir: PathBuf) -> DbResult<Instance> {
        log::info!(
            "Loading instance '{}' from {}",
            options.general.name,
            data_dir.display()
        );

        let encoded = std::fs::read(data_dir.join(INSTANCE_METADATA_FILE_NAME))?;
        let metadata: InstanceMetadata = bincode::deserialize(&encoded).map_err(|e| {
            DbError::CannotOpenDatabaseMetadataFile {
                path: data_dir
                    .join(INSTANCE_METADATA_FILE_NAME)
                    .display()
                    .to_string(),
                database: options.general.name.clone(),
                message: e.to_string(),
            }
        })?;

        let cipher_id = normalize_cipher_id(&options.encryption.system_db_cipher_id);
        let cipher_key = match &cipher_id {
            Some(_) => std::fs::read(data_dir.join(SYSTEM_DB_KEY_FILE_NAME))?,
            None => Vec::new(),
        };

        let system_db_record = DatabaseRecord {
            id: siodb_commons::constants::SYSTEM_DATABASE_ID,
            uuid: siodb_commons::compute_database_uuid(
                SYSTEM_DATABASE_NAME,
                metadata.system_db_create_timestamp,
            ),
            name: SYSTEM_DATABASE_NAME.to_string(),
            cipher_id,
            cipher_key,
            create_timestamp: metadata.system_db_create_timestamp,
        };

        let ctx = database_context(&data_dir, options);
        let system_database = SystemDatabase::open(&ctx, &system_db_record)?;

        Ok(Instance::assemble(
            options,
            metadata.uuid,
            data_dir,
            system_database,
        ))
    }

    fn assemble(
        options: &InstanceOptions,
        uuid: Uuid,
        data_dir: PathBuf,
        system_database: SystemDatabase,
    ) -> Instance {
        let mut database_registry = DatabaseRegistry::new();
        for record in system_database.read_all_databases() {
            // Records come from a registry, duplicates cannot occur.
            let _ = database_registry.insert(record);
        }
        let mut user_registry = UserRegistry::new();
        for record in system_database.read_all_users() {
            let _ = user_registry.insert(record);
        }

        Instance {
            uuid,
            name: options.general.name.clone(),
            data_dir,
            default_cipher_id: options.encryption.default_cipher_id.clone(),
            table_cache_capacity: options.iomgr.table_cache_capacity,
            block_cache_capacity: options.iomgr.block_cache_capacity,
            user_cache_capacity: options.iomgr.user_cache_capacity,
            system_database,
            state: Mutex::new(InstanceState {
                database_registry,
                database_cache: LruCache::new(options.iomgr.database_cache_capacity),
                open_databases: HashMap::new(),
                user_registry,
            }),
        }
    }

    fn create_initialization_flag_file(&self) -> DbResult<()> {
        let path = self.data_dir.join(INITIALIZATION_FLAG_FILE);
        std::fs::write(&path, format!("{}", Utc::now().timestamp()))?;
        Ok(())
    }

    fn database_context(&self) -> DatabaseContext {
        DatabaseContext {
            instance_data_dir: self.data_dir.clone(),
            table_cache_capacity: self.table_cache_capacity,
        }
    }

    // ----- accessors -----

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn display_name(&self) -> String {
        format!("'{}'", self.name)
    }

    pub fn default_cipher_id(&self) -> &str {
        &self.default_cipher_id
    }

    pub fn table_cache_capacity(&self) -> usize {
        self.table_cache_capacity
    }

    pub fn block_cache_capacity(&self) -> usize {
        self.block_cache_capacity
    }

    pub fn user_cache_capacity(&self) -> usize {
        self.user_cache_capacity
    }

    /// The system database of this instance.
    pub fn system_database(&self) -> &SystemDatabase {
        &self.system_database
    }

    /// Number of known databases, the system database included.
    pub fn database_count(&self) -> usize {
        self.state.lock().database_registry.len()
    }

    /// Database records ordered by name.
    pub fn database_records_ordered_by_name(&self) -> Vec<DatabaseRecord> {
        self.state.lock().database_registry.records_ordered_by_name()
    }

    // ----- database lookup -----

    /// Looks up a database, opening it if necessary, and marks it used.
    pub fn get_database_checked(&self, database_name: &str) -> DbResult<Arc<Database>> {
        if database_name == SYSTEM_DATABASE_NAME {
            let database = self.system_database.database().clone();
            database.acquire_use();
            return Ok(database);
        }

        let mut state = self.state.lock();
        let record = state
            .database_registry
            .get_by_name(database_name)
            .cloned()
            .ok_or_else(|| DbError::DatabaseDoesNotExist {
                database: database_name.to_string(),
            })?;
        if let Some(database) = state.database_cache.get(&record.id) {
            database.acquire_use();
            return Ok(database);
        }

        // An evicted database that a caller still holds must not be
        // shadowed by a second object over the same files; re-cache it.
        if let Some(database) = state
            .open_databases
            .get(&record.id)
            .and_then(Weak::upgrade)
        {
            state.database_cache.emplace(record.id, database.clone());
            database.acquire_use();
            return Ok(database);
        }

        let database = Database::open(&self.database_context(), &record, false)?;
        state.database_cache.emplace(record.id, database.clone());
        state
            .open_databases
            .insert(record.id, Arc::downgrade(&database));
        database.acquire_use();
        Ok(database)
    }

    /// Looks up a database; `None` when it does not exist.
    pub fn get_database(&self, database_name: &str) -> DbResult<Option<Arc<Database>>> {
        match self.get_database_checked(database_name) {
            Ok(database) => Ok(Some(database)),
            Err(DbError::DatabaseDoesNotExist { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creates a new database with all its on-disk structures and marks
    /// it used.
    pub fn create_database(
        &self,
        name: &str,
        cipher_id: Option<String>,
        cipher_key: Option<Vec<u8>>,
        current_user_id: UserId,
    ) -> DbResult<Arc<Database>> {
        Database::validate_database_name(name)?;

        let mut state = self.state.lock();
        if state.database_registry.contains_name(name) {
            return Err(DbError::DatabaseAlreadyExists {
                database: name.to_string(),
            });
        }

        let cipher_id = match cipher_id {
            Some(id) => normalize_cipher_id(&id),
            None => normalize_cipher_id(&self.default_cipher_id),
        };
        let cipher_key = match (&cipher_id, cipher_key) {
            (Some(_), Some(key)) => key,
            (Some(id), None) => generate_cipher_key(id)?,
            (None, _) => Vec::new(),
        };

        let id = self.system_database.generate_next_database_id(false)?;
        let create_timestamp = Utc::now().timestamp();
        let database = Database::create(
            &self.database_context(),
            id,
            name,
            cipher_id.clone(),
            cipher_key.clone(),
            create_timestamp,
            false,
        )?;

        let record = DatabaseRecord {
            id,
            uuid: database.uuid(),
            name: name.to_string(),
            cipher_id,
            cipher_key,
            create_timestamp,
        };
        // Persist the record first; the instance state is mutated only
        // once the system database has it durably. On failure the
        // just-created data directory is removed again.
        if let Err(e) = self.system_database.record_database(record.clone()) {
            if let Err(cleanup) = std::fs::remove_dir_all(database.data_dir()) {
                log::warn!(
                    "Cannot remove data directory of unrecorded database '{}': {}",
                    name,
                    cleanup
                );
            }
            return Err(e);
        }
        if let Err(e) = state.database_registry.insert(record) {
            let _ = self.system_database.delete_database(id);
            if let Err(cleanup) = std::fs::remove_dir_all(database.data_dir()) {
                log::warn!(
                    "Cannot remove data directory of unregistered database '{}': {}",
                    name,
                    cleanup
                );
            }
            return Err(DbError::CatalogIntegrityViolation {
                database: name.to_string(),
                message: e.to_string(),
            });
        }

        state.database_cache.emplace(id, database.clone());
        state.open_databases.insert(id, Arc::downgrade(&database));
        database.acquire_use();
        log::info!(
            "Created database '{}' ({}) on behalf of user #{}",
            name,
            database.uuid(),
            current_user_id
        );
        Ok(database)
    }

    /// Drops a database and removes its on-disk structures.
    ///
    /// Returns false when the database does not exist and
    /// `database_must_exist` is false.
    pub fn drop_database(
        &self,
        name: &str,
        database_must_exist: bool,
        current_user_id: UserId,
    ) -> DbResult<bool> {
        if name == SYSTEM_DATABASE_NAME {
            return Err(DbError::CannotDropSystemObject {
                object: SYSTEM_DATABASE_NAME.to_string(),
            });
        }

        let mut state = self.state.lock();
        let record = match state.database_registry.get_by_name(name) {
            Some(record) => record.clone(),
            None => {
                if database_must_exist {
                    return Err(DbError::DatabaseDoesNotExist {
                        database: name.to_string(),
                    });
                }
                return Ok(false);
            }
        };

        // The use count must be checked on the live object regardless of
        // cache residency; eviction drops only the cache's reference
        // while callers may still hold the database.
        if let Some(database) = state
            .open_databases
            .get(&record.id)
            .and_then(Weak::upgrade)
        {
            if database.use_count() > 0 {
                return Err(DbError::DatabaseInUse {
                    database: name.to_string(),
                });
            }
        }

        // Remove the durable record first; the instance state is only
        // mutated once the system database no longer knows the database.
        self.system_database.delete_database(record.id)?;

        state.database_cache.remove(&record.id);
        state.open_databases.remove(&record.id);
        state
            .database_registry
            .erase(record.id)
            .map_err(|e| DbError::CatalogIntegrityViolation {
                database: name.to_string(),
                message: e.to_string(),
            })?;

        let database_dir = self
            .data_dir
            .join(format!("{}{}", DATABASE_DATA_DIR_PREFIX, record.uuid));
        if database_dir.exists() {
            std::fs::remove_dir_all(&database_dir)?;
        }
        log::info!(
            "Dropped database '{}' ({}) on behalf of user #{}",
            name,
            record.uuid,
            current_user_id
        );
        Ok(true)
    }

    // ----- users -----

    /// Looks up a user by name.
    pub fn get_user_checked(&self, user_name: &str) -> DbResult<UserRecord> {
        self.state
            .lock()
            .user_registry
            .get_by_name(user_name)
            .cloned()
            .ok_or_else(|| DbError::UserDoesNotExist {
                user: user_name.to_string(),
            })
    }

    /// Creates a new user.
    pub fn create_user(
        &self,
        name: &str,
        real_name: Option<String>,
        active: bool,
        current_user_id: UserId,
    ) -> DbResult<UserId> {
        if !is_valid_object_name(name) {
            return Err(DbError::InvalidUserName {
                name: name.to_string(),
            });
        }
        let mut state = self.state.lock();
        if state.user_registry.get_by_name(name).is_some() {
            return Err(DbError::UserAlreadyExists {
                user: name.to_string(),
            });
        }
        let id = self.system_database.generate_next_user_id()?;
        let record = UserRecord {
            id,
            name: name.to_string(),
            real_name,
            active,
        };
        state
            .user_registry
            .insert(record.clone())
            .map_err(|e| DbError::CatalogIntegrityViolation {
                database: SYSTEM_DATABASE_NAME.to_string(),
                message: e.to_string(),
            })?;
        self.system_database.record_user(record)?;
        log::info!("Created user '{}' (#{}) on behalf of user #{}", name, id, current_user_id);
        Ok(id)
    }

    // ----- maintenance -----

    /// Loads every database and every table to verify catalog
    /// consistency; the first failure surfaces.
    pub fn check_data_consistency(&self) -> DbResult<()> {
        self.system_database.database().check_data_consistency()?;
        let names: Vec<String> = self
            .database_records_ordered_by_name()
            .into_iter()
            .filter(|record| record.name != SYSTEM_DATABASE_NAME)
            .map(|record| record.name)
            .collect();
        for name in names {
            let database = self.get_database_checked(&name)?;
            let result = database.check_data_consistency();
            database.release()?;
            result?;
        }
        Ok(())
    }

    /// Flushes all durable state of the instance and its databases.
    pub fn close(&self) -> DbResult<()> {
        let state = self.state.lock();
        for database in state.open_databases.values().filter_map(Weak::upgrade) {
            if let Err(e) = database.close() {
                log::warn!("Cannot close database '{}': {}", database.name(), e);
            }
        }
        drop(state);
        self.system_database.close()?;
        log::info!("Closed instance '{}'", self.name);
        Ok(())
    }
}

fn database_context(data_dir: &Path, options: &InstanceOptions) -> DatabaseContext {
    DatabaseContext {
        instance_data_dir: data_dir.to_path_buf(),
        table_cache_capacity: options.iomgr.table_cache_capacity,
    }
}

fn normalize_cipher_id(cipher_id: &str) -> Option<String> {
    if cipher_id == NO_CIPHER_ID {
        None
    } else {
        Some(cipher_id.to_string())
    }
}

fn generate_cipher_key(cipher_id: &str) -> DbResult<Vec<u8>> {
    let cipher = get_cipher(cipher_id)?.ok_or_else(|| {
        DbError::InvalidConfigurationOption(format!("unknown cipher '{}'", cipher_id))
    })?;
    let mut key = vec![0u8; cipher.key_size() / 8];
    rand::thread_rng().fill_bytes(&mut key);
    Ok(key)
}

fn load_or_create_key(data_dir: &Path, cipher_id: &str) -> DbResult<Vec<u8>> {
    let key_path = data_dir.join(SYSTEM_DB_KEY_FILE_NAME);
    if key_path.exists() {
        return Ok(std::fs::read(&key_path)?);
    }
    let key = generate_cipher_key(cipher_id)?;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(&key_path)?;
    file.write_all(&key)?;
    Ok(key)
}
