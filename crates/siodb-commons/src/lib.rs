//! Shared building blocks for the Siodb database engine.
//!
//! This crate holds the pieces every other engine crate needs: catalog
//! object identifiers and their reserved ranges, database object name
//! validation, column data types, constraint types, the constant
//! expression model used by constraint definitions, and deterministic
//! database UUID computation.

pub mod constants;
pub mod datatypes;
pub mod expr;
pub mod ids;
pub mod names;
pub mod schemas;
pub mod uuids;

pub use datatypes::ColumnDataType;
pub use expr::{ConstraintExpression, ExpressionError, Value};
pub use ids::{
    ColumnDefinitionConstraintId, ColumnDefinitionId, ColumnId, ColumnSetColumnId, ColumnSetId,
    ConstraintDefinitionId, ConstraintId, DatabaseId, IndexColumnId, IndexId, TableId,
    TransactionId, UserId,
};
pub use names::is_valid_object_name;
pub use schemas::{ConstraintType, TableType};
pub use uuids::compute_database_uuid;
