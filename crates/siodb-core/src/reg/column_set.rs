//! Column set records and their registry.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::{ColumnId, ColumnSetColumnId, ColumnSetId, TableId};
use std::collections::BTreeMap;

/// Membership of one column in a column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSetColumnRecord {
    pub id: ColumnSetColumnId,
    pub column_set_id: ColumnSetId,
    pub column_id: ColumnId,
    /// Zero-based position of the column within the set.
    pub position: u32,
}

/// Persistent description of a column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSetRecord {
    pub id: ColumnSetId,
    pub table_id: TableId,
    /// Member columns in positional order. Empty while the set is still
    /// open during table creation; final once the set is closed.
    pub columns: Vec<ColumnSetColumnRecord>,
}

/// Registry of column sets, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct ColumnSetRegistry {
    by_id: BTreeMap<ColumnSetId, ColumnSetRecord>,
}

impl ColumnSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, record: ColumnSetRecord) -> RegistryResult<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(RegistryError::DuplicateId(record.id));
        }
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn replace(&mut self, record: ColumnSetRecord) -> RegistryResult<()> {
        if !self.by_id.contains_key(&record.id) {
            return Err(RegistryError::NotFound(record.id));
        }
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn erase(&mut self, id: ColumnSetId) -> RegistryResult<ColumnSetRecord> {
        self.by_id.remove(&id).ok_or(RegistryError::NotFound(id))
    }

    pub fn get_by_id(&self, id: ColumnSetId) -> Option<&ColumnSetRecord> {
        self.by_id.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnSetRecord> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replace_lookup() {
        let mut registry = ColumnSetRegistry::new();
        registry
            .insert(ColumnSetRecord {
                id: 1,
                table_id: 10,
                columns: vec![],
            })
            .unwrap();

        let closed = ColumnSetRecord {
            id: 1,
            table_id: 10,
            columns: vec![ColumnSetColumnRecord {
                id: 1,
                column_set_id: 1,
                column_id: 5,
                position: 0,
            }],
        };
        registry.replace(closed).unwrap();
        assert_eq!(registry.get_by_id(1).unwrap().columns.len(), 1);
    }

    #[test]
    fn test_duplicate_and_missing() {
        let mut registry = ColumnSetRegistry::new();
        let record = ColumnSetRecord {
            id: 1,
            table_id: 10,
            columns: vec![],
        };
        registry.insert(record.clone()).unwrap();
        assert_eq!(
            registry.insert(record.clone()),
            Err(RegistryError::DuplicateId(1))
        );
        assert_eq!(
            registry.replace(ColumnSetRecord {
                id: 2,
                table_id: 10,
                columns: vec![],
            }),
            Err(RegistryError::NotFound(2))
        );
    }
}
