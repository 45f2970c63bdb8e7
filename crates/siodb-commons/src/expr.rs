//! Constant expression model for constraint definitions.
//!
//! The SQL parser lives outside the engine; by the time a constraint
//! reaches the catalog its expression has been reduced to a constant.
//! Constraint definitions are interned by the serialized form of this
//! expression, so serialization must be deterministic: equal expressions
//! always produce equal bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced by expression serialization.
#[derive(Error, Debug)]
pub enum ExpressionError {
    #[error("cannot serialize constraint expression: {0}")]
    Serialize(String),

    #[error("cannot deserialize constraint expression: {0}")]
    Deserialize(String),
}

/// A constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Binary(Vec<u8>),
    /// Microseconds since the unix epoch.
    Timestamp(i64),
}

impl Value {
    /// Returns true for the SQL NULL value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "'{}'", v),
            Value::Binary(v) => write!(f, "x'{} bytes'", v.len()),
            Value::Timestamp(v) => write!(f, "TIMESTAMP({})", v),
        }
    }
}

/// A constraint expression.
///
/// Only constant expressions occur today: NOT NULL carries the boolean
/// `true`, DEFAULT carries the default value. The enum leaves room for
/// richer forms (CHECK) without changing the serialized format of the
/// existing arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintExpression {
    Constant(Value),
}

impl ConstraintExpression {
    /// Shorthand for a constant expression.
    pub fn constant(value: Value) -> Self {
        ConstraintExpression::Constant(value)
    }

    /// Serializes the expression into the canonical interning byte form.
    pub fn serialize(&self) -> Result<Vec<u8>, ExpressionError> {
        bincode::serialize(self).map_err(|e| ExpressionError::Serialize(e.to_string()))
    }

    /// Deserializes an expression from its canonical byte form.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ExpressionError> {
        bincode::deserialize(bytes).map_err(|e| ExpressionError::Deserialize(e.to_string()))
    }
}

impl fmt::Display for ConstraintExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintExpression::Constant(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_roundtrip() {
        let exprs = [
            ConstraintExpression::constant(Value::Bool(true)),
            ConstraintExpression::constant(Value::Null),
            ConstraintExpression::constant(Value::Int32(-7)),
            ConstraintExpression::constant(Value::Text("N/A".to_string())),
            ConstraintExpression::constant(Value::Binary(vec![0, 1, 2, 255])),
        ];
        for expr in exprs {
            let bytes = expr.serialize().unwrap();
            let back = ConstraintExpression::deserialize(&bytes).unwrap();
            assert_eq!(back, expr);
        }
    }

    #[test]
    fn test_equal_expressions_serialize_identically() {
        let a = ConstraintExpression::constant(Value::Text("X".into()));
        let b = ConstraintExpression::constant(Value::Text("X".into()));
        assert_eq!(a.serialize().unwrap(), b.serialize().unwrap());
    }

    #[test]
    fn test_different_expressions_serialize_differently() {
        let a = ConstraintExpression::constant(Value::Bool(true));
        let b = ConstraintExpression::constant(Value::Bool(false));
        assert_ne!(a.serialize().unwrap(), b.serialize().unwrap());
    }

    #[test]
    fn test_deserialize_garbage_fails() {
        assert!(ConstraintExpression::deserialize(&[0xff; 3]).is_err());
    }
}
