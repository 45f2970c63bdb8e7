//! Shared schema enums: table types and constraint types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage class of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TableType {
    /// Regular table persisted on disk.
    Disk = 0,
    /// In-memory table. Reserved, not yet supported.
    Memory = 1,
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableType::Disk => f.write_str("DISK"),
            TableType::Memory => f.write_str("MEMORY"),
        }
    }
}

/// Kind of a constraint definition.
///
/// The numeric discriminants appear in error messages and in the on-disk
/// record format; do not reorder. Only `NotNull` and `DefaultValue` are
/// supported today, the remaining arms are reserved and rejected with
/// `ConstraintNotSupported` when they reach the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ConstraintType {
    NotNull = 0,
    DefaultValue = 1,
    SingleColumnUnique = 2,
    MultiColumnUnique = 3,
    Check = 4,
    ForeignKey = 5,
}

impl ConstraintType {
    /// Returns the SQL-facing name of the constraint type.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintType::NotNull => "NOT NULL",
            ConstraintType::DefaultValue => "DEFAULT",
            ConstraintType::SingleColumnUnique => "UNIQUE",
            ConstraintType::MultiColumnUnique => "UNIQUE",
            ConstraintType::Check => "CHECK",
            ConstraintType::ForeignKey => "FOREIGN KEY",
        }
    }

    /// Returns true if the catalog can materialize this constraint type.
    pub fn is_supported(&self) -> bool {
        matches!(self, ConstraintType::NotNull | ConstraintType::DefaultValue)
    }

    /// Short prefix used when generating automatic constraint names.
    pub fn auto_name_prefix(&self) -> &'static str {
        match self {
            ConstraintType::NotNull => "NN",
            ConstraintType::DefaultValue => "DEF",
            ConstraintType::SingleColumnUnique => "UQ",
            ConstraintType::MultiColumnUnique => "MUQ",
            ConstraintType::Check => "CHK",
            ConstraintType::ForeignKey => "FK",
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_constraint_types() {
        assert!(ConstraintType::NotNull.is_supported());
        assert!(ConstraintType::DefaultValue.is_supported());
        assert!(!ConstraintType::Check.is_supported());
        assert!(!ConstraintType::ForeignKey.is_supported());
    }

    #[test]
    fn test_auto_name_prefixes_differ_for_supported_types() {
        assert_ne!(
            ConstraintType::NotNull.auto_name_prefix(),
            ConstraintType::DefaultValue.auto_name_prefix()
        );
    }
}
