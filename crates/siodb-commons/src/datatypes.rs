//! Column data types supported by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type of a table column.
///
/// The numeric discriminants are part of the on-disk record format and of
/// the wire protocol column descriptions; do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ColumnDataType {
    Bool = 0,
    Int8 = 1,
    UInt8 = 2,
    Int16 = 3,
    UInt16 = 4,
    Int32 = 5,
    UInt32 = 6,
    Int64 = 7,
    UInt64 = 8,
    Float = 9,
    Double = 10,
    Text = 11,
    Binary = 12,
    Timestamp = 13,
}

impl ColumnDataType {
    /// Returns the SQL-facing name of the data type.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnDataType::Bool => "BOOLEAN",
            ColumnDataType::Int8 => "TINYINT",
            ColumnDataType::UInt8 => "TINYUINT",
            ColumnDataType::Int16 => "SMALLINT",
            ColumnDataType::UInt16 => "SMALLUINT",
            ColumnDataType::Int32 => "INT",
            ColumnDataType::UInt32 => "UINT",
            ColumnDataType::Int64 => "BIGINT",
            ColumnDataType::UInt64 => "BIGUINT",
            ColumnDataType::Float => "FLOAT",
            ColumnDataType::Double => "DOUBLE",
            ColumnDataType::Text => "TEXT",
            ColumnDataType::Binary => "BINARY",
            ColumnDataType::Timestamp => "TIMESTAMP",
        }
    }

    /// Returns true for integer and floating point types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnDataType::Int8
                | ColumnDataType::UInt8
                | ColumnDataType::Int16
                | ColumnDataType::UInt16
                | ColumnDataType::Int32
                | ColumnDataType::UInt32
                | ColumnDataType::Int64
                | ColumnDataType::UInt64
                | ColumnDataType::Float
                | ColumnDataType::Double
        )
    }
}

impl fmt::Display for ColumnDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
