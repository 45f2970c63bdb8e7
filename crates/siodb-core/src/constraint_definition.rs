//! Loaded constraint definition object.

use crate::error::{DbError, DbResult};
use crate::reg::ConstraintDefinitionRecord;
use siodb_commons::constants::FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID;
use siodb_commons::{ConstraintDefinitionId, ConstraintExpression, ConstraintType};

/// Interned (type, expression) pair shared by any number of constraints.
#[derive(Debug)]
pub struct ConstraintDefinition {
    id: ConstraintDefinitionId,
    constraint_type: ConstraintType,
    expression: ConstraintExpression,
    serialized_expression: Vec<u8>,
    hash: u64,
}

impl ConstraintDefinition {
    pub(crate) fn new(
        id: ConstraintDefinitionId,
        constraint_type: ConstraintType,
        expression: ConstraintExpression,
        serialized_expression: Vec<u8>,
        hash: u64,
    ) -> Self {
        ConstraintDefinition {
            id,
            constraint_type,
            expression,
            serialized_expression,
            hash,
        }
    }

    /// Rebuilds the object from its registry record.
    pub(crate) fn from_record(
        database_name: &str,
        record: &ConstraintDefinitionRecord,
    ) -> DbResult<Self> {
        let expression =
            ConstraintExpression::deserialize(&record.expression).map_err(|e| {
                DbError::CatalogIntegrityViolation {
                    database: database_name.to_string(),
                    message: format!(
                        "constraint definition #{} has an undecodable expression: {}",
                        record.id, e
                    ),
                }
            })?;
        Ok(ConstraintDefinition {
            id: record.id,
            constraint_type: record.constraint_type,
            expression,
            serialized_expression: record.expression.clone(),
            hash: record.hash,
        })
    }

    pub fn id(&self) -> ConstraintDefinitionId {
        self.id
    }

    pub fn constraint_type(&self) -> ConstraintType {
        self.constraint_type
    }

    pub fn expression(&self) -> &ConstraintExpression {
        &self.expression
    }

    /// Canonical serialized form of the expression, the interning key.
    pub fn serialized_expression(&self) -> &[u8] {
        &self.serialized_expression
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Returns true when this definition lives in the system id range.
    pub fn is_system(&self) -> bool {
        self.id < FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID
    }

    pub(crate) fn to_record(&self) -> ConstraintDefinitionRecord {
        ConstraintDefinitionRecord {
            id: self.id,
            constraint_type: self.constraint_type,
            expression: self.serialized_expression.clone(),
            hash: self.hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::compute_constraint_definition_hash;
    use siodb_commons::Value;

    fn make(id: ConstraintDefinitionId) -> ConstraintDefinition {
        let expression = ConstraintExpression::constant(Value::Bool(true));
        let serialized = expression.serialize().unwrap();
        let hash = compute_constraint_definition_hash(ConstraintType::NotNull, &serialized);
        ConstraintDefinition::new(id, ConstraintType::NotNull, expression, serialized, hash)
    }

    #[test]
    fn test_record_roundtrip() {
        let definition = make(7);
        let record = definition.to_record();
        let restored = ConstraintDefinition::from_record("SYS", &record).unwrap();
        assert_eq!(restored.id(), 7);
        assert_eq!(restored.constraint_type(), ConstraintType::NotNull);
        assert_eq!(restored.expression(), definition.expression());
        assert_eq!(restored.hash(), definition.hash());
    }

    #[test]
    fn test_system_partition() {
        assert!(make(7).is_system());
        assert!(!make(FIRST_USER_TABLE_CONSTRAINT_DEFINITION_ID).is_system());
    }

    #[test]
    fn test_from_record_rejects_garbage_expression() {
        let mut record = make(7).to_record();
        record.expression = vec![0xff, 0xfe];
        assert!(matches!(
            ConstraintDefinition::from_record("SYS", &record),
            Err(DbError::CatalogIntegrityViolation { .. })
        ));
    }
}
