//! Loaded column object.

use crate::reg::ColumnRecord;
use siodb_commons::{ColumnDataType, ColumnDefinitionId, ColumnId, TableId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A column of a loaded table.
#[derive(Debug)]
pub struct Column {
    id: ColumnId,
    table_id: TableId,
    table_name: String,
    name: String,
    data_type: ColumnDataType,
    block_data_area_size: u32,
    not_null: AtomicBool,
    current_column_definition_id: AtomicU64,
}

impl Column {
    pub(crate) fn new(
        id: ColumnId,
        table_id: TableId,
        table_name: String,
        name: String,
        data_type: ColumnDataType,
        block_data_area_size: u32,
    ) -> Self {
        Column {
            id,
            table_id,
            table_name,
            name,
            data_type,
            block_data_area_size,
            not_null: AtomicBool::new(false),
            current_column_definition_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn from_record(record: &ColumnRecord, table_name: String) -> Self {
        Column::new(
            record.id,
            record.table_id,
            table_name,
            record.name.clone(),
            record.data_type,
            record.block_data_area_size,
        )
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> ColumnDataType {
        self.data_type
    }

    pub fn block_data_area_size(&self) -> u32 {
        self.block_data_area_size
    }

    /// Whether a NOT NULL constraint is in effect on this column.
    pub fn is_not_null(&self) -> bool {
        self.not_null.load(Ordering::Relaxed)
    }

    pub(crate) fn set_not_null(&self, not_null: bool) {
        self.not_null.store(not_null, Ordering::Relaxed);
    }

    /// Id of the column definition currently in effect; 0 until one is
    /// registered.
    pub fn current_column_definition_id(&self) -> ColumnDefinitionId {
        self.current_column_definition_id.load(Ordering::Relaxed)
    }

    pub(crate) fn set_current_column_definition_id(&self, id: ColumnDefinitionId) {
        self.current_column_definition_id.store(id, Ordering::Relaxed);
    }

    pub(crate) fn to_record(&self) -> ColumnRecord {
        ColumnRecord {
            id: self.id,
            table_id: self.table_id,
            name: self.name.clone(),
            data_type: self.data_type,
            block_data_area_size: self.block_data_area_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let column = Column::new(
            4097,
            4096,
            "T1".to_string(),
            "QTY".to_string(),
            ColumnDataType::Int32,
            32768,
        );
        let record = column.to_record();
        let restored = Column::from_record(&record, "T1".to_string());
        assert_eq!(restored.id(), 4097);
        assert_eq!(restored.name(), "QTY");
        assert_eq!(restored.data_type(), ColumnDataType::Int32);
        assert!(!restored.is_not_null());
    }

    #[test]
    fn test_not_null_flag() {
        let column = Column::new(
            1,
            1,
            "T".to_string(),
            "C".to_string(),
            ColumnDataType::Text,
            32768,
        );
        assert!(!column.is_not_null());
        column.set_not_null(true);
        assert!(column.is_not_null());
    }
}
