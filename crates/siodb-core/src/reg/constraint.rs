//! Constraint records and their registry.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::{ColumnId, ConstraintDefinitionId, ConstraintId, TableId};
use std::collections::{BTreeMap, HashMap};

/// Persistent description of a named constraint attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRecord {
    pub id: ConstraintId,
    pub name: String,
    pub table_id: TableId,
    /// Target column; `None` for a table-level constraint.
    pub column_id: Option<ColumnId>,
    pub constraint_definition_id: ConstraintDefinitionId,
}

/// Registry of constraints, indexed by id and by unique name.
#[derive(Debug, Clone, Default)]
pub struct ConstraintRegistry {
    by_id: BTreeMap<ConstraintId, ConstraintRecord>,
    id_by_name: HashMap<String, ConstraintId>,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, record: ConstraintRecord) -> RegistryResult<()> {
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

    pub fn replace(&mut self, record: ConstraintRecord) -> RegistryResult<()> {
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

    pub fn erase(&mut self, id: ConstraintId) -> RegistryResult<ConstraintRecord> {
        let record = self.by_id.remove(&id).ok_or(RegistryError::NotFound(id))?;
        self.id_by_name.remove(&record.name);
        Ok(record)
    }

    pub fn get_by_id(&self, id: ConstraintId) -> Option<&ConstraintRecord> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ConstraintRecord> {
        self.id_by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.id_by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintRecord> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: ConstraintId, name: &str) -> ConstraintRecord {
        ConstraintRecord {
            id,
            name: name.to_string(),
            table_id: 10,
            column_id: Some(5),
            constraint_definition_id: 1,
        }
    }

    #[test]
    fn test_insert_and_lookup_by_name() {
        let mut registry = ConstraintRegistry::new();
        registry.insert(record(1, "NN_T_C")).unwrap();
        assert!(registry.contains_name("NN_T_C"));
        assert_eq!(registry.get_by_name("NN_T_C").unwrap().id, 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ConstraintRegistry::new();
        registry.insert(record(1, "NN1")).unwrap();
        assert_eq!(
            registry.insert(record(2, "NN1")),
            Err(RegistryError::DuplicateName("NN1".to_string()))
        );
    }

    #[test]
    fn test_erase_frees_name() {
        let mut registry = ConstraintRegistry::new();
        registry.insert(record(1, "NN1")).unwrap();
        registry.erase(1).unwrap();
        registry.insert(record(2, "NN1")).unwrap();
    }
}
