//! Durable snapshot of a database's catalog registries.
//!
//! All registries of a database are serialized into a single
//! `system_objects` file at the root of its data directory, written
//! through the database's data file handle so an encrypted database gets
//! an encrypted catalog. The snapshot carries a content hash; a torn or
//! tampered file is detected on load.

use crate::reg::{
    ColumnDefinitionRegistry, ColumnRegistry, ColumnSetRegistry, ConstraintDefinitionRegistry,
    ConstraintRegistry, DatabaseRecord, DatabaseRegistry, IndexRegistry, RegistryError,
    TableRegistry, UserRecord, UserRegistry,
};
use crate::reg::{
    ColumnDefinitionRecord, ColumnRecord, ColumnSetRecord, ConstraintDefinitionRecord,
    ConstraintRecord, IndexRecord, TableRecord,
};
use serde::{Deserialize, Serialize};
use siodb_store::DataFile;
use xxhash_rust::xxh64::xxh64;

const SNAPSHOT_MAGIC: &[u8; 4] = b"SIOS";
const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_HEADER_SIZE: usize = 24;

/// All in-memory registries of one database.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registries {
    pub tables: TableRegistry,
    pub column_sets: ColumnSetRegistry,
    pub columns: ColumnRegistry,
    pub column_definitions: ColumnDefinitionRegistry,
    pub constraint_definitions: ConstraintDefinitionRegistry,
    pub constraints: ConstraintRegistry,
    pub indexes: IndexRegistry,
    /// Known databases; populated only in the system database.
    pub databases: DatabaseRegistry,
    /// Known users; populated only in the system database.
    pub users: UserRegistry,
}

/// Serialized form of [`Registries`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct SystemObjectsSnapshot {
    pub tables: Vec<TableRecord>,
    pub column_sets: Vec<ColumnSetRecord>,
    pub columns: Vec<ColumnRecord>,
    pub column_definitions: Vec<ColumnDefinitionRecord>,
    pub constraint_definitions: Vec<ConstraintDefinitionRecord>,
    pub constraints: Vec<ConstraintRecord>,
    pub indexes: Vec<IndexRecord>,
    pub databases: Vec<DatabaseRecord>,
    pub users: Vec<UserRecord>,
}

impl Registries {
    pub fn to_snapshot(&self) -> SystemObjectsSnapshot {
        SystemObjectsSnapshot {
            tables: self.tables.iter().cloned().collect(),
            column_sets: self.column_sets.iter().cloned().collect(),
            columns: self.columns.iter().cloned().collect(),
            column_definitions: self.column_definitions.iter().cloned().collect(),
            constraint_definitions: self.constraint_definitions.iter().cloned().collect(),
            constraints: self.constraints.iter().cloned().collect(),
            indexes: self.indexes.iter().cloned().collect(),
            databases: self.databases.iter().cloned().collect(),
            users: self.users.iter().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: SystemObjectsSnapshot) -> Result<Self, RegistryError> {
        let mut registries = Registries::default();
        for record in snapshot.tables {
            registries.tables.insert(record)?;
        }
        for record in snapshot.column_sets {
            registries.column_sets.insert(record)?;
        }
        for record in snapshot.columns {
            registries.columns.insert(record)?;
        }
        for record in snapshot.column_definitions {
            registries.column_definitions.insert(record)?;
        }
        for record in snapshot.constraint_definitions {
            registries.constraint_definitions.insert(record)?;
        }
        for record in snapshot.constraints {
            registries.constraints.insert(record)?;
        }
        for record in snapshot.indexes {
            registries.indexes.insert(record)?;
        }
        for record in snapshot.databases {
            registries.databases.insert(record)?;
        }
        for record in snapshot.users {
            registries.users.insert(record)?;
        }
        Ok(registries)
    }
}

impl SystemObjectsSnapshot {
    /// Writes the snapshot, replacing any previous content.
    pub fn write_to(&self, file: &mut dyn DataFile) -> Result<(), String> {
        let payload = bincode::serialize(self).map_err(|e| e.to_string())?;
        let mut buffer = Vec::with_capacity(SNAPSHOT_HEADER_SIZE + payload.len());
        buffer.extend_from_slice(SNAPSHOT_MAGIC);
        buffer.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        buffer.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        buffer.extend_from_slice(&xxh64(&payload, 0).to_le_bytes());
        buffer.extend_from_slice(&payload);

        file.set_len(0).map_err(|e| e.to_string())?;
        file.write_all_at(&buffer, 0).map_err(|e| e.to_string())?;
        file.sync().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Reads and verifies a snapshot.
    pub fn read_from(file: &dyn DataFile) -> Result<Self, String> {
        let mut header = [0u8; SNAPSHOT_HEADER_SIZE];
        file.read_exact_at(&mut header, 0).map_err(|e| e.to_string())?;
        if &header[0..4] != SNAPSHOT_MAGIC {
            return Err("bad system objects magic".to_string());
        }
        let version = u32::from_le_bytes(header[4..8].try_into().expect("4 bytes"));
        if version != SNAPSHOT_VERSION {
            return Err(format!("unsupported system objects version {}", version));
        }
        let payload_len = u64::from_le_bytes(header[8..16].try_into().expect("8 bytes")) as usize;
        let expected_hash = u64::from_le_bytes(header[16..24].try_into().expect("8 bytes"));

        let mut payload = vec![0u8; payload_len];
        file.read_exact_at(&mut payload, SNAPSHOT_HEADER_SIZE as u64)
            .map_err(|e| e.to_string())?;
        if xxh64(&payload, 0) != expected_hash {
            return Err("system objects checksum mismatch".to_string());
        }
        bincode::deserialize(&payload).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siodb_commons::{ColumnDataType, TableType};
    use siodb_store::PlainFile;
    use tempfile::tempdir;

    fn sample_registries() -> Registries {
        let mut registries = Registries::default();
        registries
            .tables
            .insert(TableRecord {
                id: 1,
                table_type: TableType::Disk,
                name: "SYS_TABLES".to_string(),
                first_user_trid: 4096,
                current_column_set_id: 1,
                last_system_trid: 11,
                last_user_trid: 4095,
            })
            .unwrap();
        registries
            .columns
            .insert(ColumnRecord {
                id: 1,
                table_id: 1,
                name: "TRID".to_string(),
                data_type: ColumnDataType::UInt64,
                block_data_area_size: 32768,
            })
            .unwrap();
        registries
            .constraint_definitions
            .insert(ConstraintDefinitionRecord::new(
                1,
                siodb_commons::ConstraintType::NotNull,
                b"expr".to_vec(),
            ))
            .unwrap();
        registries
    }

    #[test]
    fn test_snapshot_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system_objects");
        let registries = sample_registries();

        {
            let mut file = PlainFile::create(&path, 0).unwrap();
            registries.to_snapshot().write_to(&mut file).unwrap();
        }

        let file = PlainFile::open(&path).unwrap();
        let snapshot = SystemObjectsSnapshot::read_from(&file).unwrap();
        let restored = Registries::from_snapshot(snapshot).unwrap();

        assert_eq!(restored.tables.len(), 1);
        let table = restored.tables.get_by_name("SYS_TABLES").unwrap();
        assert_eq!(table.last_system_trid, 11);
        assert_eq!(restored.columns.len(), 1);
        assert_eq!(restored.constraint_definitions.len(), 1);
        assert!(restored
            .constraint_definitions
            .find_matching(true, siodb_commons::ConstraintType::NotNull, b"expr")
            .is_some());
    }

    #[test]
    fn test_snapshot_rewrite_shrinks_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system_objects");
        let registries = sample_registries();

        let mut file = PlainFile::create(&path, 0).unwrap();
        registries.to_snapshot().write_to(&mut file).unwrap();
        // Rewrite with an empty catalog; the file must not keep stale bytes.
        Registries::default().to_snapshot().write_to(&mut file).unwrap();

        let snapshot = SystemObjectsSnapshot::read_from(&file).unwrap();
        assert!(snapshot.tables.is_empty());
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system_objects");
        {
            let mut file = PlainFile::create(&path, 0).unwrap();
            sample_registries().to_snapshot().write_to(&mut file).unwrap();
        }
        // Flip one payload byte on disk.
        let mut raw = std::fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(&path, raw).unwrap();

        let file = PlainFile::open(&path).unwrap();
        let err = SystemObjectsSnapshot::read_from(&file).unwrap_err();
        assert!(err.contains("checksum"));
    }
}
