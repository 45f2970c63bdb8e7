//! Table records and their registry.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::{ColumnSetId, TableId, TableType};
use std::collections::{BTreeMap, HashMap};

/// Persistent description of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: TableId,
    pub table_type: TableType,
    pub name: String,
    /// First row id that belongs to the user range of this table.
    pub first_user_trid: u64,
    /// Column set currently in effect.
    pub current_column_set_id: ColumnSetId,
    /// Most recently allocated system-range row id.
    pub last_system_trid: u64,
    /// Most recently allocated user-range row id.
    pub last_user_trid: u64,
}

/// Registry of tables, indexed by id and by unique name.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    by_id: BTreeMap<TableId, TableRecord>,
    id_by_name: HashMap<String, TableId>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Adds a record to every index.
    pub fn insert(&mut self, record: TableRecord) -> RegistryResult<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(RegistryError::DuplicateId(record.id as u64));
        }
        if self.id_by_name.contains_key(&record.name) {
            return Err(RegistryError::DuplicateName(record.name));
        }
        self.id_by_name.insert(record.name.clone(), record.id);
        self.by_id.insert(record.id, record);
        Ok(())
    }

    /// Re-indexes an existing record in place. The id is immutable; the
    /// name may change as long as it remains unique.
    pub fn replace(&mut self, record: TableRecord) -> RegistryResult<()> {
        let existing = self
            .by_id
            .get(&record.id)
            .ok_or(RegistryError::NotFound(record.id as u64))?;
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

    /// Removes a record from every index.
    pub fn erase(&mut self, id: TableId) -> RegistryResult<TableRecord> {
        let record = self
            .by_id
            .remove(&id)
            .ok_or(RegistryError::NotFound(id as u64))?;
        self.id_by_name.remove(&record.name);
        Ok(record)
    }

    pub fn get_by_id(&self, id: TableId) -> Option<&TableRecord> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&TableRecord> {
        self.id_by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.id_by_name.contains_key(name)
    }

    /// Iterates records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TableRecord> {
        self.by_id.values()
    }

    /// Table names in ascending name order.
    pub fn names_ordered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.id_by_name.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}
