//! Constraint definition records, content hashing and their registry.
//!
//! Constraint definitions are interned by content: the registry keeps a
//! hash index over (type, serialized expression) so lookups touch only
//! one bucket. The hash is not a unique key; candidates in a bucket are
//! confirmed by byte comparison and id-range partition before a match is
//! accepted.

use super::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use siodb_commons::constants::FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID;
use siodb_commons::{ConstraintDefinitionId, ConstraintType};
use std::collections::{BTreeMap, HashMap};
use xxhash_rust::xxh64::xxh64;

const HASH_SEED: u64 = 0x0106_16b5_83cb_4c27;

/// Computes the content hash of a constraint definition.
pub fn compute_constraint_definition_hash(
    constraint_type: ConstraintType,
    expression: &[u8],
) -> u64 {
    let mut header = [0u8; 8];
    header[..4].copy_from_slice(&(constraint_type as u32).to_le_bytes());
    header[4..].copy_from_slice(&(expression.len() as u32).to_le_bytes());
    let hash = xxh64(&header, HASH_SEED);
    if expression.is_empty() {
        hash
    } else {
        xxh64(expression, hash)
    }
}

/// Persistent description of a constraint definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDefinitionRecord {
    pub id: ConstraintDefinitionId,
    pub constraint_type: ConstraintType,
    /// Serialized constraint expression, the interning key.
    pub expression: Vec<u8>,
    pub hash: u64,
}

impl ConstraintDefinitionRecord {
    /// Builds a record, computing the content hash.
    pub fn new(
        id: ConstraintDefinitionId,
        constraint_type: ConstraintType,
        expression: Vec<u8>,
    ) -> Self {
        let hash = compute_constraint_definition_hash(constraint_type, &expression);
        ConstraintDefinitionRecord {
            id,
            constraint_type,
            expression,
            hash,
        }
    }

    /// Returns true when this record denotes a system object.
    pub fn is_system(&self) -> bool {
        self.id < FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID
    }

    /// Returns true when the other record has the same definition
    /// content (type and expression bytes).
    pub fn is_equal_definition(&self, other: &ConstraintDefinitionRecord) -> bool {
        self.constraint_type == other.constraint_type && self.expression == other.expression
    }
}

/// Registry of constraint definitions, indexed by id and by content hash.
#[derive(Debug, Clone, Default)]
pub struct ConstraintDefinitionRegistry {
    by_id: BTreeMap<ConstraintDefinitionId, ConstraintDefinitionRecord>,
    ids_by_hash: HashMap<u64, Vec<ConstraintDefinitionId>>,
}

impl ConstraintDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert(&mut self, record: ConstraintDefinitionRecord) -> RegistryResult<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(RegistryError::DuplicateId(record.id));
        }
        self.ids_by_hash.entry(record.hash).or_default().push(record.id);
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn replace(&mut self, record: ConstraintDefinitionRecord) -> RegistryResult<()> {
        let existing = self
            .by_id
            .get(&record.id)
            .ok_or(RegistryError::NotFound(record.id))?;
        if existing.hash != record.hash {
            self.remove_from_hash_bucket(existing.hash, existing.id);
            self.ids_by_hash.entry(record.hash).or_default().push(record.id);
        }
        self.by_id.insert(record.id, record);
        Ok(())
    }

    pub fn erase(&mut self, id: ConstraintDefinitionId) -> RegistryResult<ConstraintDefinitionRecord> {
        let record = self.by_id.remove(&id).ok_or(RegistryError::NotFound(id))?;
        self.remove_from_hash_bucket(record.hash, record.id);
        Ok(record)
    }

    fn remove_from_hash_bucket(&mut self, hash: u64, id: ConstraintDefinitionId) {
        if let Some(bucket) = self.ids_by_hash.get_mut(&hash) {
            bucket.retain(|candidate| *candidate != id);
            if bucket.is_empty() {
                self.ids_by_hash.remove(&hash);
            }
        }
    }

    pub fn get_by_id(&self, id: ConstraintDefinitionId) -> Option<&ConstraintDefinitionRecord> {
        self.by_id.get(&id)
    }

    /// Candidate records whose content hash equals `hash`.
    pub fn get_by_hash(&self, hash: u64) -> Vec<&ConstraintDefinitionRecord> {
        self.ids_by_hash
            .get(&hash)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    /// Finds an existing definition with identical content on the given
    /// side of the system/user partition.
    pub fn find_matching(
        &self,
        system: bool,
        constraint_type: ConstraintType,
        expression: &[u8],
    ) -> Option<&ConstraintDefinitionRecord> {
        let hash = compute_constraint_definition_hash(constraint_type, expression);
        self.get_by_hash(hash).into_iter().find(|candidate| {
            candidate.is_system() == system
                && candidate.constraint_type == constraint_type
                && candidate.expression == expression
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintDefinitionRecord> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_depends_on_type_and_bytes() {
        let a = compute_constraint_definition_hash(ConstraintType::NotNull, b"abc");
        let b = compute_constraint_definition_hash(ConstraintType::DefaultValue, b"abc");
        let c = compute_constraint_definition_hash(ConstraintType::NotNull, b"abd");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a,
            compute_constraint_definition_hash(ConstraintType::NotNull, b"abc")
        );
    }

    #[test]
    fn test_empty_expression_hash_is_stable() {
        let a = compute_constraint_definition_hash(ConstraintType::NotNull, b"");
        let b = compute_constraint_definition_hash(ConstraintType::NotNull, b"");
        assert_eq!(a, b);
    }

    #[test]
    fn test_find_matching_respects_partition() {
        let mut registry = ConstraintDefinitionRegistry::new();
        let system_record =
            ConstraintDefinitionRecord::new(7, ConstraintType::NotNull, b"expr".to_vec());
        let user_record =
            ConstraintDefinitionRecord::new(5000, ConstraintType::NotNull, b"expr".to_vec());
        registry.insert(system_record).unwrap();
        registry.insert(user_record).unwrap();

        let found_system = registry
            .find_matching(true, ConstraintType::NotNull, b"expr")
            .unwrap();
        assert_eq!(found_system.id, 7);
        let found_user = registry
            .find_matching(false, ConstraintType::NotNull, b"expr")
            .unwrap();
        assert_eq!(found_user.id, 5000);
    }

    #[test]
    fn test_find_matching_rejects_different_content_with_same_bucket() {
        let mut registry = ConstraintDefinitionRegistry::new();
        registry
            .insert(ConstraintDefinitionRecord::new(
                1,
                ConstraintType::NotNull,
                b"one".to_vec(),
            ))
            .unwrap();
        assert!(registry
            .find_matching(true, ConstraintType::NotNull, b"two")
            .is_none());
        assert!(registry
            .find_matching(true, ConstraintType::DefaultValue, b"one")
            .is_none());
    }

    #[test]
    fn test_erase_cleans_hash_bucket() {
        let mut registry = ConstraintDefinitionRegistry::new();
        let record = ConstraintDefinitionRecord::new(1, ConstraintType::NotNull, b"x".to_vec());
        let hash = record.hash;
        registry.insert(record).unwrap();
        registry.erase(1).unwrap();
        assert!(registry.get_by_hash(hash).is_empty());
    }

    #[test]
    fn test_is_system_partition() {
        let system = ConstraintDefinitionRecord::new(1, ConstraintType::NotNull, vec![]);
        let user = ConstraintDefinitionRecord::new(
            FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID,
            ConstraintType::NotNull,
            vec![],
        );
        assert!(system.is_system());
        assert!(!user.is_system());
    }
}
