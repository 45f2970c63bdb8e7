//! User records and their registry.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::UserId;
use std::collections::{BTreeMap, HashMap};

/// Persistent description of a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub real_name: Option<String>,
    pub active: bool,
}

/// Registry of users, indexed by id and by unique name.
#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    by_id: BTreeMap<UserId, UserRecord>,
    id_by_name: HashMap<String, UserId>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, record: UserRecord) -> RegistryResult<()> {
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

    pub fn replace(&mut self, record: UserRecord) -> RegistryResult<()> {
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

    pub fn erase(&mut self, id: UserId) -> RegistryResult<UserRecord> {
        let record = self
            .by_id
            .remove(&id)
            .ok_or(RegistryError::NotFound(id as u64))?;
        self.id_by_name.remove(&record.name);
        Ok(record)
    }

    pub fn get_by_id(&self, id: UserId) -> Option<&UserRecord> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&UserRecord> {
        self.id_by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserRecord> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siodb_commons::constants::{SUPER_USER_ID, SUPER_USER_NAME};

    #[test]
    fn test_super_user_registration() {
        let mut registry = UserRegistry::new();
        registry
            .insert(UserRecord {
                id: SUPER_USER_ID,
                name: SUPER_USER_NAME.to_string(),
                real_name: None,
                active: true,
            })
            .unwrap();
        assert_eq!(
            registry.get_by_name(SUPER_USER_NAME).unwrap().id,
            SUPER_USER_ID
        );
    }

    #[test]
    fn test_update_user_state() {
        let mut registry = UserRegistry::new();
        registry
            .insert(UserRecord {
                id: 256,
                name: "alice".to_string(),
                real_name: Some("Alice".to_string()),
                active: true,
            })
            .unwrap();
        let mut updated = registry.get_by_id(256).unwrap().clone();
        updated.active = false;
        registry.replace(updated).unwrap();
        assert!(!registry.get_by_id(256).unwrap().active);
    }
}
