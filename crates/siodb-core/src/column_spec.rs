//! Column and constraint specifications consumed by table creation.
//!
//! The SQL layer hands the catalog either a fully elaborated
//! [`ColumnSpecification`] or the shorthand [`SimpleColumnSpecification`]
//! used by internal callers; the shorthand expands NOT NULL and DEFAULT
//! into constant constraint expressions.

use siodb_commons::constants::DEFAULT_DATA_FILE_DATA_AREA_SIZE;
use siodb_commons::{ColumnDataType, ConstraintExpression, ConstraintType, Value};

/// Specification of a constraint to apply to a column.
#[derive(Debug, Clone)]
pub struct ColumnConstraintSpecification {
    /// Desired constraint name. An empty name causes automatic name
    /// generation.
    pub name: String,
    pub constraint_type: ConstraintType,
    pub expression: ConstraintExpression,
}

/// Full specification of a column for table creation.
#[derive(Debug, Clone)]
pub struct ColumnSpecification {
    pub name: String,
    pub data_type: ColumnDataType,
    pub block_data_area_size: u32,
    pub constraints: Vec<ColumnConstraintSpecification>,
}

impl ColumnSpecification {
    /// Plain column with no constraints.
    pub fn new(name: impl Into<String>, data_type: ColumnDataType) -> Self {
        ColumnSpecification {
            name: name.into(),
            data_type,
            block_data_area_size: DEFAULT_DATA_FILE_DATA_AREA_SIZE,
            constraints: Vec::new(),
        }
    }

    /// Adds a constraint specification.
    pub fn with_constraint(
        mut self,
        name: impl Into<String>,
        constraint_type: ConstraintType,
        expression: ConstraintExpression,
    ) -> Self {
        self.constraints.push(ColumnConstraintSpecification {
            name: name.into(),
            constraint_type,
            expression,
        });
        self
    }
}

/// Shorthand column specification used by internal callers.
#[derive(Debug, Clone)]
pub struct SimpleColumnSpecification {
    pub name: String,
    pub data_type: ColumnDataType,
    pub not_null: Option<bool>,
    pub default_value: Value,
}

impl SimpleColumnSpecification {
    pub fn new(name: impl Into<String>, data_type: ColumnDataType) -> Self {
        SimpleColumnSpecification {
            name: name.into(),
            data_type,
            not_null: None,
            default_value: Value::Null,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = Some(true);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }
}

impl From<SimpleColumnSpecification> for ColumnSpecification {
    fn from(src: SimpleColumnSpecification) -> Self {
        let mut constraints = Vec::new();
        if let Some(not_null) = src.not_null {
            constraints.push(ColumnConstraintSpecification {
                name: String::new(),
                constraint_type: ConstraintType::NotNull,
                expression: ConstraintExpression::constant(Value::Bool(not_null)),
            });
        }
        if !src.default_value.is_null() {
            constraints.push(ColumnConstraintSpecification {
                name: String::new(),
                constraint_type: ConstraintType::DefaultValue,
                expression: ConstraintExpression::constant(src.default_value),
            });
        }
        ColumnSpecification {
            name: src.name,
            data_type: src.data_type,
            block_data_area_size: DEFAULT_DATA_FILE_DATA_AREA_SIZE,
            constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_spec_expands_not_null_and_default() {
        let simple = SimpleColumnSpecification::new("QTY", ColumnDataType::Int32)
            .not_null()
            .with_default(Value::Int32(0));
        let spec: ColumnSpecification = simple.into();
        assert_eq!(spec.constraints.len(), 2);
        assert_eq!(spec.constraints[0].constraint_type, ConstraintType::NotNull);
        assert_eq!(
            spec.constraints[1].constraint_type,
            ConstraintType::DefaultValue
        );
        assert!(spec.constraints.iter().all(|c| c.name.is_empty()));
    }

    #[test]
    fn test_simple_spec_without_constraints() {
        let spec: ColumnSpecification =
            SimpleColumnSpecification::new("NOTE", ColumnDataType::Text).into();
        assert!(spec.constraints.is_empty());
        assert_eq!(spec.block_data_area_size, DEFAULT_DATA_FILE_DATA_AREA_SIZE);
    }
}
