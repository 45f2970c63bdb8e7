//! Index records and their registry.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::{ColumnId, IndexColumnId, IndexId, TableId};
use std::collections::{BTreeMap, HashMap};

/// Kind of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum IndexType {
    BTree = 0,
    Hash = 1,
}

/// Membership of one column in an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumnRecord {
    pub id: IndexColumnId,
    pub index_id: IndexId,
    pub column_id: ColumnId,
    pub sort_descending: bool,
}

/// Persistent description of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: IndexId,
    pub table_id: TableId,
    pub index_type: IndexType,
    pub unique: bool,
    pub name: String,
    /// Indexed columns in key order.
    pub columns: Vec<IndexColumnRecord>,
}

/// Registry of indexes, indexed by id and by unique name.
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    by_id: BTreeMap<IndexId, IndexRecord>,
    id_by_name: HashMap<String, IndexId>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, record: IndexRecord) -> RegistryResult<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(RegistryError::DuplicateId(record.id));
        }
        if self.id_by_name.contains_key(&record.name) {
            return Err(RegistryError::DuplicateName(record.name));
        }
        self.id_by_name.insert(record.name.clone(), record.id);
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn replace(&mut self, record: IndexRecord) -> RegistryResult<()> {
        let existing = self
            .by_id
            .get(&record.id)
            .ok_or(RegistryError::NotFound(record.id))?;
        if existing.name != record.name {
            if self.id_by_name.contains_key(&record.name) {
                return Err(RegistryError::DuplicateName(record.name));
            }
            self.id_by_name.remove(&existing.name);
            self.id_by_name.insert(record.name.clone(), record.id);
        }
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn erase(&mut self, id: IndexId) -> RegistryResult<IndexRecord> {
        let record = self.by_id.remove(&id).ok_or(RegistryError::NotFound(id))?;
        self.id_by_name.remove(&record.name);
        Ok(record)
    }

    pub fn get_by_id(&self, id: IndexId) -> Option<&IndexRecord> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&IndexRecord> {
        self.id_by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexRecord> {
        self.by_id.values()
    }
}
