//! Database records and their registry.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::DatabaseId;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Persistent description of a database known to the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub id: DatabaseId,
    pub uuid: Uuid,
    pub name: String,
    /// Cipher id; `None` means the database is not encrypted.
    pub cipher_id: Option<String>,
    /// Encryption key. Empty when the database is not encrypted. The
    /// record itself is persisted through the system database's own
    /// (encrypted) storage.
    pub cipher_key: Vec<u8>,
    /// Creation timestamp, unix seconds.
    pub create_timestamp: i64,
}

/// Registry of databases, indexed by id, by unique name, and by UUID.
#[derive(Debug, Clone, Default)]
pub struct DatabaseRegistry {
    by_id: BTreeMap<DatabaseId, DatabaseRecord>,
    id_by_name: HashMap<String, DatabaseId>,
    id_by_uuid: HashMap<Uuid, DatabaseId>,
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, record: DatabaseRecord) -> RegistryResult<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(RegistryError::DuplicateId(record.id as u64));
        }
        if self.id_by_name.contains_key(&record.name) {
            return Err(RegistryError::DuplicateName(record.name));
        }
        if self.id_by_uuid.contains_key(&record.uuid) {
            return Err(RegistryError::DuplicateName(record.uuid.to_string()));
        }
        self.id_by_name.insert(record.name.clone(), record.id);
        self.id_by_uuid.insert(record.uuid, record.id);
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn erase(&mut self, id: DatabaseId) -> RegistryResult<DatabaseRecord> {
        let record = self
            .by_id
            .remove(&id)
            .ok_or(RegistryError::NotFound(id as u64))?;
        self.id_by_name.remove(&record.name);
        self.id_by_uuid.remove(&record.uuid);
        Ok(record)
    }

    pub fn get_by_id(&self, id: DatabaseId) -> Option<&DatabaseRecord> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&DatabaseRecord> {
        self.id_by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn get_by_uuid(&self, uuid: &Uuid) -> Option<&DatabaseRecord> {
        self.id_by_uuid.get(uuid).and_then(|id| self.by_id.get(id))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.id_by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatabaseRecord> {
        self.by_id.values()
    }

    /// Records ordered by database name.
    pub fn records_ordered_by_name(&self) -> Vec<DatabaseRecord> {
        let mut records: Vec<DatabaseRecord> = self.by_id.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siodb_commons::compute_database_uuid;

    fn record(id: DatabaseId, name: &str) -> DatabaseRecord {
        DatabaseRecord {
            id,
            uuid: compute_database_uuid(name, 1_600_000_000),
            name: name.to_string(),
            cipher_id: Some("aes128".to_string()),
            cipher_key: vec![0u8; 16],
            create_timestamp: 1_600_000_000,
        }
    }

    #[test]
    fn test_lookup_by_name_and_uuid() {
        let mut registry = DatabaseRegistry::new();
        let db = record(1, "SYS");
        let uuid = db.uuid;
        registry.insert(db).unwrap();
        assert_eq!(registry.get_by_name("SYS").unwrap().id, 1);
        assert_eq!(registry.get_by_uuid(&uuid).unwrap().id, 1);
    }

    #[test]
    fn test_records_ordered_by_name() {
        let mut registry = DatabaseRegistry::new();
        registry.insert(record(1, "ZULU")).unwrap();
        registry.insert(record(2, "ALPHA")).unwrap();
        let names: Vec<String> = registry
            .records_ordered_by_name()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["ALPHA", "ZULU"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = DatabaseRegistry::new();
        registry.insert(record(1, "DB1")).unwrap();
        assert!(registry.insert(record(2, "DB1")).is_err());
    }
}
