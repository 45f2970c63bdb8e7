//! Deterministic database UUID computation.

use md5::{Digest, Md5};
use uuid::Uuid;

/// Computes the stable UUID of a database.
///
/// The UUID is the MD5 digest of the database name bytes followed by the
/// little-endian 8-byte creation timestamp (unix seconds). The same
/// (name, timestamp) pair always produces the same UUID, which makes the
/// database data directory name reproducible for external tooling.
pub fn compute_database_uuid(database_name: &str, create_timestamp: i64) -> Uuid {
    let mut hasher = Md5::new();
    hasher.update(database_name.as_bytes());
    hasher.update(create_timestamp.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_is_deterministic() {
        let a = compute_database_uuid("DB1", 1_600_000_000);
        let b = compute_database_uuid("DB1", 1_600_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_uuid_differs_by_name_and_timestamp() {
        let a = compute_database_uuid("DB1", 1_600_000_000);
        let b = compute_database_uuid("DB2", 1_600_000_000);
        let c = compute_database_uuid("DB1", 1_600_000_001);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_uuid_matches_reference_digest() {
        // MD5("DB1" || LE64(1600000000)) computed in one update call.
        let mut input = b"DB1".to_vec();
        input.extend_from_slice(&1_600_000_000i64.to_le_bytes());
        let mut hasher = Md5::new();
        hasher.update(&input);
        let digest = hasher.finalize();

        let uuid = compute_database_uuid("DB1", 1_600_000_000);
        assert_eq!(uuid.as_bytes().as_slice(), digest.as_slice());
    }
}
