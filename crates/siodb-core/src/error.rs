//! Engine error taxonomy.
//!
//! Every error the catalog can raise maps to a stable numeric code that
//! the connection server puts into the wire-protocol status message next
//! to the human-readable text. DDL validation does not stop at the first
//! problem; the offending records are collected into a [`CompoundError`]
//! and raised together after the whole batch has been examined.

use siodb_commons::{ConstraintDefinitionId, ConstraintId, TableId};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations.
pub type DbResult<T> = std::result::Result<T, DbError>;

/// A single error record inside a compound error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub code: u32,
    pub message: String,
}

impl ErrorRecord {
    /// Captures an engine error as a compound error record.
    pub fn from_error(error: &DbError) -> Self {
        ErrorRecord {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Container for errors accumulated during DDL validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundError {
    pub errors: Vec<ErrorRecord>,
}

impl std::fmt::Display for CompoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} errors:", self.errors.len())?;
        for record in &self.errors {
            write!(f, " [{}] {};", record.code, record.message)?;
        }
        Ok(())
    }
}

/// Main error type of the catalog engine.
#[derive(Error, Debug)]
pub enum DbError {
    // ----- Not found -----
    #[error("Database '{database}' does not exist")]
    DatabaseDoesNotExist { database: String },

    #[error("Table '{table}' does not exist in the database '{database}'")]
    TableDoesNotExist { database: String, table: String },

    #[error("Column #{column_id} does not exist in the database '{database}'")]
    ColumnDoesNotExist { database: String, column_id: u64 },

    #[error("Column set #{column_set_id} does not exist in the database '{database}'")]
    ColumnSetDoesNotExist {
        database: String,
        column_set_id: u64,
    },

    #[error("Column definition #{column_definition_id} does not exist in the database '{database}'")]
    ColumnDefinitionDoesNotExist {
        database: String,
        column_definition_id: u64,
    },

    #[error("Constraint #{constraint_id} does not exist in the database '{database}'")]
    ConstraintDoesNotExist {
        database: String,
        constraint_id: ConstraintId,
    },

    #[error(
        "Constraint definition #{constraint_definition_id} does not exist in the database \
         '{database}'"
    )]
    ConstraintDefinitionDoesNotExist {
        database: String,
        constraint_definition_id: ConstraintDefinitionId,
    },

    #[error("Index #{index_id} does not exist in the database '{database}'")]
    IndexDoesNotExist { database: String, index_id: u64 },

    #[error("User '{user}' does not exist")]
    UserDoesNotExist { user: String },

    // ----- Already exists -----
    #[error("Database '{database}' already exists")]
    DatabaseAlreadyExists { database: String },

    #[error("Table '{table}' already exists in the database '{database}'")]
    TableAlreadyExists { database: String, table: String },

    #[error("Constraint '{constraint}' already exists in the database '{database}'")]
    ConstraintAlreadyExists {
        database: String,
        constraint: String,
    },

    #[error("User '{user}' already exists")]
    UserAlreadyExists { user: String },

    // ----- Validation -----
    #[error("Invalid database name '{name}'")]
    InvalidDatabaseName { name: String },

    #[error("Invalid table name '{name}'")]
    InvalidTableName { name: String },

    #[error("Invalid column name '{name}'")]
    InvalidColumnName { name: String },

    #[error("Invalid constraint name '{name}'")]
    InvalidConstraintName { name: String },

    #[error("Invalid user name '{name}'")]
    InvalidUserName { name: String },

    #[error("Duplicate column name '{name}'")]
    CreateTableDuplicateColumnName { name: String },

    #[error("Duplicate constraint name '{name}'")]
    CreateTableDuplicateConstraintName { name: String },

    #[error("Constraint of type '{constraint_type}' appears more than once for the column '{column}'")]
    CreateTableDuplicateColumnConstraintType {
        constraint_type: String,
        column: String,
    },

    // ----- Type mismatch -----
    #[error(
        "Constraint type #{actual_type} does not match expected type #{expected_type} for the \
         column constraint '{constraint}' on '{database}'.'{table}'.'{column}'"
    )]
    ColumnConstraintTypeDoesNotMatch {
        actual_type: u32,
        expected_type: u32,
        database: String,
        table: String,
        column: String,
        constraint: String,
    },

    #[error(
        "Constraint type #{actual_type} does not match expected type #{expected_type} for the \
         table constraint '{constraint}' on '{database}'.'{table}'"
    )]
    TableConstraintTypeDoesNotMatch {
        actual_type: u32,
        expected_type: u32,
        database: String,
        table: String,
        constraint: String,
    },

    #[error(
        "Constraint definition #{constraint_definition_id} of type #{constraint_type} is not \
         supported in the database '{database}'"
    )]
    ConstraintNotSupported {
        database: String,
        constraint_definition_id: ConstraintDefinitionId,
        constraint_type: u32,
    },

    #[error("Table type #{table_type} is not supported")]
    TableTypeNotSupported { table_type: u32 },

    // ----- Integrity -----
    #[error(
        "{operation}: table '{table}' belongs to the database '{table_database}' \
         ({table_database_uuid}), not to the database '{database}' ({database_uuid})"
    )]
    TableDoesNotBelongToDatabase {
        operation: String,
        table: String,
        table_database: String,
        table_database_uuid: Uuid,
        database: String,
        database_uuid: Uuid,
    },

    #[error("{operation}: column '{column}' does not belong to the table '{table}'")]
    ColumnDoesNotBelongToTable {
        operation: String,
        column: String,
        table: String,
    },

    #[error("Missing column definitions for the column #{column_id} of the table #{table_id} in \
             the database {database_uuid}")]
    MissingColumnDefinitionsForColumn {
        database_uuid: Uuid,
        table_id: TableId,
        column_id: u64,
    },

    #[error("Missing system table '{table}' in the database '{database}'")]
    MissingSystemTable { database: String, table: String },

    #[error("Catalog integrity violation in the database '{database}': {message}")]
    CatalogIntegrityViolation { database: String, message: String },

    // ----- Resource -----
    #[error("Resource exhausted in the database '{database}': {resource}")]
    ResourceExhausted { database: String, resource: String },

    #[error("Cannot release unused database '{database}' ({uuid})")]
    CannotReleaseUnusedDatabase { database: String, uuid: Uuid },

    #[error("Database '{database}' is in use")]
    DatabaseInUse { database: String },

    #[error("Cannot drop system object '{object}'")]
    CannotDropSystemObject { object: String },

    // ----- I/O and configuration -----
    #[error("Cannot create data directory '{path}' of the database '{database}': {message}")]
    CannotCreateDatabaseDataDir {
        path: String,
        database: String,
        message: String,
    },

    #[error(
        "Cannot create initialization flag file '{path}' of the database '{database}': {message}"
    )]
    CannotCreateDatabaseInitializationFlagFile {
        path: String,
        database: String,
        message: String,
    },

    #[error("Cannot create metadata file '{path}' of the database '{database}': {message}")]
    CannotCreateDatabaseMetadataFile {
        path: String,
        database: String,
        message: String,
    },

    #[error("Cannot open metadata file '{path}' of the database '{database}': {message}")]
    CannotOpenDatabaseMetadataFile {
        path: String,
        database: String,
        message: String,
    },

    #[error("Cannot write metadata file of the database '{database}': {message}")]
    CannotWriteDatabaseMetadataFile { database: String, message: String },

    #[error("Data folder '{path}' of the database '{database}' does not exist")]
    DatabaseDataFolderDoesNotExist { database: String, path: String },

    #[error("Initialization flag file '{path}' of the database '{database}' does not exist")]
    DatabaseInitFileDoesNotExist { database: String, path: String },

    #[error("Cannot save system objects of the database '{database}': {message}")]
    CannotSaveSystemObjects { database: String, message: String },

    #[error("Cannot load system objects of the database '{database}': {message}")]
    CannotLoadSystemObjects { database: String, message: String },

    #[error("Invalid configuration option: {0}")]
    InvalidConfigurationOption(String),

    // ----- Wrapped lower layers -----
    #[error(transparent)]
    Storage(#[from] siodb_store::StorageError),

    #[error(transparent)]
    Expression(#[from] siodb_commons::ExpressionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ----- Compound -----
    #[error("{0}")]
    Compound(CompoundError),
}

impl From<siodb_configs::ConfigError> for DbError {
    fn from(err: siodb_configs::ConfigError) -> Self {
        DbError::InvalidConfigurationOption(err.to_string())
    }
}

impl DbError {
    /// Builds a compound error from accumulated records.
    pub fn compound(errors: Vec<ErrorRecord>) -> Self {
        DbError::Compound(CompoundError { errors })
    }

    /// Stable numeric code of this error for the wire protocol.
    pub fn code(&self) -> u32 {
        match self {
            DbError::DatabaseDoesNotExist { .. } => 2000,
            DbError::TableDoesNotExist { .. } => 2001,
            DbError::ColumnDoesNotExist { .. } => 2002,
            DbError::ColumnSetDoesNotExist { .. } => 2003,
            DbError::ColumnDefinitionDoesNotExist { .. } => 2004,
            DbError::ConstraintDoesNotExist { .. } => 2005,
            DbError::ConstraintDefinitionDoesNotExist { .. } => 2006,
            DbError::IndexDoesNotExist { .. } => 2007,
            DbError::UserDoesNotExist { .. } => 2008,

            DbError::DatabaseAlreadyExists { .. } => 2100,
            DbError::TableAlreadyExists { .. } => 2101,
            DbError::ConstraintAlreadyExists { .. } => 2102,
            DbError::UserAlreadyExists { .. } => 2103,

            DbError::InvalidDatabaseName { .. } => 2200,
            DbError::InvalidTableName { .. } => 2201,
            DbError::InvalidColumnName { .. } => 2202,
            DbError::InvalidConstraintName { .. } => 2203,
            DbError::CreateTableDuplicateColumnName { .. } => 2204,
            DbError::CreateTableDuplicateConstraintName { .. } => 2205,
            DbError::CreateTableDuplicateColumnConstraintType { .. } => 2206,
            DbError::InvalidUserName { .. } => 2207,

            DbError::ColumnConstraintTypeDoesNotMatch { .. } => 2300,
            DbError::TableConstraintTypeDoesNotMatch { .. } => 2301,
            DbError::ConstraintNotSupported { .. } => 2302,
            DbError::TableTypeNotSupported { .. } => 2303,

            DbError::TableDoesNotBelongToDatabase { .. } => 2400,
            DbError::ColumnDoesNotBelongToTable { .. } => 2401,
            DbError::MissingColumnDefinitionsForColumn { .. } => 2402,
            DbError::MissingSystemTable { .. } => 2403,
            DbError::CatalogIntegrityViolation { .. } => 2404,

            DbError::ResourceExhausted { .. } => 2500,
            DbError::CannotReleaseUnusedDatabase { .. } => 2501,
            DbError::DatabaseInUse { .. } => 2502,
            DbError::CannotDropSystemObject { .. } => 2503,

            DbError::CannotCreateDatabaseDataDir { .. } => 2600,
            DbError::CannotCreateDatabaseInitializationFlagFile { .. } => 2601,
            DbError::CannotCreateDatabaseMetadataFile { .. } => 2602,
            DbError::CannotOpenDatabaseMetadataFile { .. } => 2603,
            DbError::CannotWriteDatabaseMetadataFile { .. } => 2604,
            DbError::DatabaseDataFolderDoesNotExist { .. } => 2605,
            DbError::DatabaseInitFileDoesNotExist { .. } => 2606,
            DbError::CannotSaveSystemObjects { .. } => 2607,
            DbError::CannotLoadSystemObjects { .. } => 2608,
            DbError::InvalidConfigurationOption(_) => 2609,

            DbError::Storage(_) => 2900,
            DbError::Expression(_) => 2901,
            DbError::Io(_) => 2902,

            DbError::Compound(_) => 2999,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = DbError::TableDoesNotExist {
            database: "DB1".into(),
            table: "T1".into(),
        };
        assert_eq!(err.code(), 2001);

        let err = DbError::ResourceExhausted {
            database: "DB1".into(),
            resource: "Table ID".into(),
        };
        assert_eq!(err.code(), 2500);
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = DbError::TableDoesNotExist {
            database: "DB1".into(),
            table: "CUSTOMERS".into(),
        };
        let message = err.to_string();
        assert!(message.contains("DB1"));
        assert!(message.contains("CUSTOMERS"));
    }

    #[test]
    fn test_compound_error_display() {
        let first = DbError::CreateTableDuplicateConstraintName { name: "nn1".into() };
        let second = DbError::InvalidColumnName { name: "1x".into() };
        let compound = DbError::compound(vec![
            ErrorRecord::from_error(&first),
            ErrorRecord::from_error(&second),
        ]);
        let text = compound.to_string();
        assert!(text.starts_with("2 errors:"));
        assert!(text.contains("nn1"));
        assert!(text.contains("1x"));
        assert_eq!(compound.code(), 2999);
    }
}
