//! Column definition records and their registry.
//!
//! A column accumulates definitions over its lifetime (one per ALTER that
//! affects it); the latest definition is found by scanning the compound
//! (column id, id) index backwards from the column's upper bound.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::{ColumnDefinitionConstraintId, ColumnDefinitionId, ColumnId, ConstraintId};
use std::collections::{BTreeMap, BTreeSet};

/// Attachment of a constraint to a column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinitionConstraintRecord {
    pub id: ColumnDefinitionConstraintId,
    pub column_definition_id: ColumnDefinitionId,
    pub constraint_id: ConstraintId,
}

/// Persistent description of one version of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinitionRecord {
    pub id: ColumnDefinitionId,
    pub column_id: ColumnId,
    pub constraints: Vec<ColumnDefinitionConstraintRecord>,
}

/// Registry of column definitions, indexed by id and by (column id, id).
#[derive(Debug, Clone, Default)]
pub struct ColumnDefinitionRegistry {
    by_id: BTreeMap<ColumnDefinitionId, ColumnDefinitionRecord>,
    by_column_and_id: BTreeSet<(ColumnId, ColumnDefinitionId)>,
}

impl ColumnDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, record: ColumnDefinitionRecord) -> RegistryResult<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(RegistryError::DuplicateId(record.id));
        }
        self.by_column_and_id.insert((record.column_id, record.id));
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn replace(&mut self, record: ColumnDefinitionRecord) -> RegistryResult<()> {
        let existing = self
            .by_id
            .get(&record.id)
            .ok_or(RegistryError::NotFound(record.id))?;
        if existing.column_id != record.column_id {
            self.by_column_and_id.remove(&(existing.column_id, existing.id));
            self.by_column_and_id.insert((record.column_id, record.id));
        }
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn erase(&mut self, id: ColumnDefinitionId) -> RegistryResult<ColumnDefinitionRecord> {
        let record = self.by_id.remove(&id).ok_or(RegistryError::NotFound(id))?;
        self.by_column_and_id.remove(&(record.column_id, record.id));
        Ok(record)
    }

    pub fn get_by_id(&self, id: ColumnDefinitionId) -> Option<&ColumnDefinitionRecord> {
        self.by_id.get(&id)
    }

    /// Id of the most recent definition of a column, if any.
    pub fn latest_for_column(&self, column_id: ColumnId) -> Option<ColumnDefinitionId> {
        self.by_column_and_id
            .range((column_id, ColumnDefinitionId::MIN)..=(column_id, ColumnDefinitionId::MAX))
            .next_back()
            .map(|(_, id)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDefinitionRecord> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: ColumnDefinitionId, column_id: ColumnId) -> ColumnDefinitionRecord {
        ColumnDefinitionRecord {
            id,
            column_id,
            constraints: vec![],
        }
    }

    #[test]
    fn test_latest_for_column() {
        let mut registry = ColumnDefinitionRegistry::new();
        registry.insert(record(1, 100)).unwrap();
        registry.insert(record(5, 100)).unwrap();
        registry.insert(record(3, 100)).unwrap();
        registry.insert(record(4, 101)).unwrap();

        assert_eq!(registry.latest_for_column(100), Some(5));
        assert_eq!(registry.latest_for_column(101), Some(4));
        assert_eq!(registry.latest_for_column(102), None);
    }

    #[test]
    fn test_latest_not_confused_by_adjacent_column() {
        let mut registry = ColumnDefinitionRegistry::new();
        // A definition of column 101 must never satisfy a query for 100.
        registry.insert(record(9, 101)).unwrap();
        assert_eq!(registry.latest_for_column(100), None);
    }

    #[test]
    fn test_replace_keeps_constraint_links() {
        let mut registry = ColumnDefinitionRegistry::new();
        registry.insert(record(1, 100)).unwrap();
        let mut updated = record(1, 100);
        updated.constraints.push(ColumnDefinitionConstraintRecord {
            id: 1,
            column_definition_id: 1,
            constraint_id: 77,
        });
        registry.replace(updated).unwrap();
        assert_eq!(registry.get_by_id(1).unwrap().constraints.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = ColumnDefinitionRegistry::new();
        registry.insert(record(1, 100)).unwrap();
        assert_eq!(
            registry.insert(record(1, 200)),
            Err(RegistryError::DuplicateId(1))
        );
    }
}
