//! Catalog object records and multi-index registries.
//!
//! A registry is the authoritative in-memory table of records for one
//! entity kind, with the secondary indexes catalog queries need: by id in
//! hot paths, by name in DDL, by content hash during constraint
//! deduplication, and by (column id, id) for column definition history.
//! All indexes of a registry are updated together inside the database
//! mutex, so readers never observe them out of sync.

mod column;
mod column_definition;
mod column_set;
mod constraint;
mod constraint_definition;
mod database;
mod index;
mod table;
mod user;

pub use column::{ColumnRecord, ColumnRegistry};
pub use column_definition::{
    ColumnDefinitionConstraintRecord, ColumnDefinitionRecord, ColumnDefinitionRegistry,
};
pub use column_set::{ColumnSetColumnRecord, ColumnSetRecord, ColumnSetRegistry};
pub use constraint::{ConstraintRecord, ConstraintRegistry};
pub use constraint_definition::{
    compute_constraint_definition_hash, ConstraintDefinitionRecord, ConstraintDefinitionRegistry,
};
pub use database::{DatabaseRecord, DatabaseRegistry};
pub use index::{IndexColumnRecord, IndexRecord, IndexRegistry, IndexType};
pub use table::{TableRecord, TableRegistry};
pub use user::{UserRecord, UserRegistry};

use thiserror::Error;

/// Errors raised by registry index maintenance.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("record #{0} already exists")]
    DuplicateId(u64),

    #[error("record named '{0}' already exists")]
    DuplicateName(String),

    #[error("record #{0} does not exist")]
    NotFound(u64),
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
