//! Loaded constraint object.

use crate::constraint_definition::ConstraintDefinition;
use crate::reg::ConstraintRecord;
use siodb_commons::{
    ColumnId, ConstraintExpression, ConstraintId, ConstraintType, TableId, Value,
};
use std::sync::Arc;

/// Named attachment of a constraint definition to a table, and
/// optionally to one of its columns.
#[derive(Debug)]
pub struct Constraint {
    id: ConstraintId,
    name: String,
    table_id: TableId,
    table_name: String,
    column_id: Option<ColumnId>,
    definition: Arc<ConstraintDefinition>,
}

impl Constraint {
    pub(crate) fn new(
        id: ConstraintId,
        name: String,
        table_id: TableId,
        table_name: String,
        column_id: Option<ColumnId>,
        definition: Arc<ConstraintDefinition>,
    ) -> Self {
        Constraint {
            id,
            name,
            table_id,
            table_name,
            column_id,
            definition,
        }
    }

    pub fn id(&self) -> ConstraintId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Target column id; `None` for a table-level constraint.
    pub fn column_id(&self) -> Option<ColumnId> {
        self.column_id
    }

    pub fn definition(&self) -> &Arc<ConstraintDefinition> {
        &self.definition
    }

    pub fn constraint_type(&self) -> ConstraintType {
        self.definition.constraint_type()
    }

    /// For a NOT NULL constraint, whether NULL values are forbidden.
    pub fn not_null(&self) -> bool {
        if self.constraint_type() != ConstraintType::NotNull {
            return false;
        }
        match self.definition.expression() {
            ConstraintExpression::Constant(Value::Bool(value)) => *value,
            _ => false,
        }
    }

    /// For a DEFAULT constraint, the default value.
    pub fn default_value(&self) -> Option<&Value> {
        if self.constraint_type() != ConstraintType::DefaultValue {
            return None;
        }
        match self.definition.expression() {
            ConstraintExpression::Constant(value) => Some(value),
        }
    }

    pub(crate) fn to_record(&self) -> ConstraintRecord {
        ConstraintRecord {
            id: self.id,
            name: self.name.clone(),
            table_id: self.table_id,
            column_id: self.column_id,
            constraint_definition_id: self.definition.id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::compute_constraint_definition_hash;

    fn definition(constraint_type: ConstraintType, value: Value) -> Arc<ConstraintDefinition> {
        let expression = ConstraintExpression::constant(value);
        let serialized = expression.serialize().unwrap();
        let hash = compute_constraint_definition_hash(constraint_type, &serialized);
        Arc::new(ConstraintDefinition::new(
            4096,
            constraint_type,
            expression,
            serialized,
            hash,
        ))
    }

    #[test]
    fn test_not_null_accessor() {
        let constraint = Constraint::new(
            4096,
            "NN1".to_string(),
            4096,
            "T1".to_string(),
            Some(4097),
            definition(ConstraintType::NotNull, Value::Bool(true)),
        );
        assert!(constraint.not_null());
        assert!(constraint.default_value().is_none());
    }

    #[test]
    fn test_default_value_accessor() {
        let constraint = Constraint::new(
            4097,
            "DEF1".to_string(),
            4096,
            "T1".to_string(),
            Some(4097),
            definition(ConstraintType::DefaultValue, Value::Int32(42)),
        );
        assert!(!constraint.not_null());
        assert_eq!(constraint.default_value(), Some(&Value::Int32(42)));
    }

    #[test]
    fn test_to_record() {
        let constraint = Constraint::new(
            4096,
            "NN1".to_string(),
            10,
            "T1".to_string(),
            None,
            definition(ConstraintType::NotNull, Value::Bool(true)),
        );
        let record = constraint.to_record();
        assert_eq!(record.id, 4096);
        assert_eq!(record.table_id, 10);
        assert_eq!(record.column_id, None);
        assert_eq!(record.constraint_definition_id, 4096);
    }
}
