//! Catalog object identifier types.
//!
//! Tables and databases are numbered with 32-bit ids because they also act
//! as directory and file name components; all other catalog objects use
//! 64-bit ids. Each id kind is partitioned into a system range and a user
//! range, see [`crate::constants`].

/// Database identifier.
pub type DatabaseId = u32;

/// Table identifier.
pub type TableId = u32;

/// Column identifier.
pub type ColumnId = u64;

/// Column set identifier.
pub type ColumnSetId = u64;

/// Column set membership record identifier.
pub type ColumnSetColumnId = u64;

/// Column definition identifier.
pub type ColumnDefinitionId = u64;

/// Column definition constraint link identifier.
pub type ColumnDefinitionConstraintId = u64;

/// Constraint identifier.
pub type ConstraintId = u64;

/// Constraint definition identifier.
pub type ConstraintDefinitionId = u64;

/// Index identifier.
pub type IndexId = u64;

/// Index column record identifier.
pub type IndexColumnId = u64;

/// User identifier.
pub type UserId = u32;

/// Transaction identifier.
pub type TransactionId = u64;
