//! Column records and their registry.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::{ColumnDataType, ColumnId, TableId};
use std::collections::{BTreeMap, BTreeSet};

/// Persistent description of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub id: ColumnId,
    pub table_id: TableId,
    pub name: String,
    pub data_type: ColumnDataType,
    /// Size of the data area of this column's block files.
    pub block_data_area_size: u32,
}

/// Registry of columns, indexed by id and by owning table.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    by_id: BTreeMap<ColumnId, ColumnRecord>,
    by_table_and_id: BTreeSet<(TableId, ColumnId)>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, record: ColumnRecord) -> RegistryResult<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(RegistryError::DuplicateId(record.id));
        }
        self.by_table_and_id.insert((record.table_id, record.id));
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn replace(&mut self, record: ColumnRecord) -> RegistryResult<()> {
        let existing = self
            .by_id
            .get(&record.id)
            .ok_or(RegistryError::NotFound(record.id))?;
        if existing.table_id != record.table_id {
            self.by_table_and_id.remove(&(existing.table_id, existing.id));
            self.by_table_and_id.insert((record.table_id, record.id));
        }
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn erase(&mut self, id: ColumnId) -> RegistryResult<ColumnRecord> {
        let record = self.by_id.remove(&id).ok_or(RegistryError::NotFound(id))?;
        self.by_table_and_id.remove(&(record.table_id, record.id));
        Ok(record)
    }

    pub fn get_by_id(&self, id: ColumnId) -> Option<&ColumnRecord> {
        self.by_id.get(&id)
    }

    /// Columns of a table, in id order.
    pub fn get_by_table(&self, table_id: TableId) -> Vec<&ColumnRecord> {
        self.by_table_and_id
            .range((table_id, ColumnId::MIN)..=(table_id, ColumnId::MAX))
            .filter_map(|(_, column_id)| self.by_id.get(column_id))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnRecord> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: ColumnId, table_id: TableId, name: &str) -> ColumnRecord {
        ColumnRecord {
            id,
            table_id,
            name: name.to_string(),
            data_type: ColumnDataType::Int32,
            block_data_area_size: 32768,
        }
    }

    #[test]
    fn test_insert_and_scan_by_table() {
        let mut registry = ColumnRegistry::new();
        registry.insert(record(1, 10, "TRID")).unwrap();
        registry.insert(record(2, 10, "A")).unwrap();
        registry.insert(record(3, 11, "TRID")).unwrap();

        let columns = registry.get_by_table(10);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "TRID");
        assert_eq!(columns[1].name, "A");
        assert_eq!(registry.get_by_table(11).len(), 1);
        assert!(registry.get_by_table(12).is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = ColumnRegistry::new();
        registry.insert(record(1, 10, "A")).unwrap();
        assert_eq!(
            registry.insert(record(1, 11, "B")),
            Err(RegistryError::DuplicateId(1))
        );
    }

    #[test]
    fn test_erase() {
        let mut registry = ColumnRegistry::new();
        registry.insert(record(1, 10, "A")).unwrap();
        registry.erase(1).unwrap();
        assert!(registry.get_by_id(1).is_none());
        assert!(registry.get_by_table(10).is_empty());
    }

    #[test]
    fn test_same_column_name_allowed_in_different_tables() {
        let mut registry = ColumnRegistry::new();
        registry.insert(record(1, 10, "A")).unwrap();
        registry.insert(record(2, 11, "A")).unwrap();
        assert_eq!(registry.len(), 2);
    }
}
