//! Well-known instance file locations.

use crate::error::{ConfigError, Result};
use std::path::PathBuf;

/// Base directory of instance configuration files.
pub const INSTANCE_CONFIG_BASE_DIR: &str = "/etc/siodb/instances";

/// Base directory of instance runtime state files.
pub const INSTANCE_RUN_BASE_DIR: &str = "/run/siodb";

/// Checks that an instance name is safe to use as a path component.
pub fn validate_instance_name(instance_name: &str) -> Result<()> {
    if siodb_commons::is_valid_object_name(instance_name) {
        Ok(())
    } else {
        Err(ConfigError::invalid_option(format!(
            "Invalid instance name: '{}'",
            instance_name
        )))
    }
}

/// Path of the named instance's configuration file.
pub fn instance_config_file_path(instance_name: &str) -> PathBuf {
    PathBuf::from(INSTANCE_CONFIG_BASE_DIR)
        .join(instance_name)
        .join("config")
}

/// Path of the lock file that serializes instance startup.
pub fn instance_initialization_lock_file_path(instance_name: &str) -> PathBuf {
    PathBuf::from(INSTANCE_RUN_BASE_DIR).join(format!("{}.init.lock", instance_name))
}

/// Path of the flag file IOMgr creates once database initialization
/// completes. The connection server polls for it at startup.
pub fn iomgr_initialization_flag_file_path(instance_name: &str) -> PathBuf {
    PathBuf::from(INSTANCE_RUN_BASE_DIR).join(format!("{}.iomgr.init", instance_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_path() {
        assert_eq!(
            instance_config_file_path("siodb000"),
            PathBuf::from("/etc/siodb/instances/siodb000/config")
        );
    }

    #[test]
    fn test_runtime_file_paths() {
        assert_eq!(
            instance_initialization_lock_file_path("s1"),
            PathBuf::from("/run/siodb/s1.init.lock")
        );
        assert_eq!(
            iomgr_initialization_flag_file_path("s1"),
            PathBuf::from("/run/siodb/s1.iomgr.init")
        );
    }

    #[test]
    fn test_instance_name_validation() {
        assert!(validate_instance_name("siodb000").is_ok());
        assert!(validate_instance_name("../evil").is_err());
        assert!(validate_instance_name("").is_err());
    }
}
