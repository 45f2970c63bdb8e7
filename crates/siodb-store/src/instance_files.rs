//! Instance-level lock and flag files.
//!
//! Two instance processes must never initialize the same data directory
//! concurrently, so startup takes an advisory lock on a well-known file.
//! After IOMgr finishes database initialization it creates a flag file;
//! the connection server polls for that file before accepting clients.

use crate::error::{Result, StorageError};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

/// Advisory lock preventing concurrent instance startup.
///
/// The lock is held for the lifetime of this object and released by the
/// OS when the file descriptor closes, including on process crash.
pub struct InstanceLockFile {
    _file: std::fs::File,
}

impl InstanceLockFile {
    /// Opens (creating if needed) and try-locks the lock file.
    ///
    /// Fails with [`StorageError::Lock`] when another process already
    /// holds the lock.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)?;
        let rc = unsafe { libc::lockf(file.as_raw_fd(), libc::F_TLOCK, 0) };
        if rc != 0 {
            return Err(StorageError::Lock {
                path: path.display().to_string(),
                message: std::io::Error::last_os_error().to_string(),
            });
        }
        log::debug!("Acquired instance initialization lock {}", path.display());
        Ok(InstanceLockFile { _file: file })
    }
}

/// Creates the flag file that signals IOMgr finished initialization.
pub fn create_iomgr_initialization_flag_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, b"")?;
    log::info!("Created IOMgr initialization flag file {}", path.display());
    Ok(())
}

/// Waits until the IOMgr initialization flag file appears.
///
/// Re-checks every `check_period` and keeps waiting as long as
/// `iomgr_alive` reports the back-end process is running; there is no
/// other timeout. Returns `false` when IOMgr died before signalling.
pub fn wait_for_iomgr_initialization<P, F>(
    flag_file_path: P,
    check_period: Duration,
    mut iomgr_alive: F,
) -> bool
where
    P: AsRef<Path>,
    F: FnMut() -> bool,
{
    let flag_file_path = flag_file_path.as_ref();
    loop {
        if flag_file_path.exists() {
            return true;
        }
        if !iomgr_alive() {
            log::error!("IOMgr exited before completing initialization");
            return false;
        }
        std::thread::sleep(check_period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("init.lock");
        let _lock = InstanceLockFile::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("init.lock");
        {
            let _lock = InstanceLockFile::acquire(&path).unwrap();
        }
        // The same process can re-acquire after release.
        let _lock = InstanceLockFile::acquire(&path).unwrap();
    }

    #[test]
    fn test_wait_returns_immediately_when_flag_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iomgr.init");
        create_iomgr_initialization_flag_file(&path).unwrap();
        assert!(wait_for_iomgr_initialization(
            &path,
            Duration::from_millis(1),
            || true
        ));
    }

    #[test]
    fn test_wait_gives_up_when_iomgr_dies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iomgr.init");
        let mut checks = 0;
        let result = wait_for_iomgr_initialization(&path, Duration::from_millis(1), || {
            checks += 1;
            checks < 3
        });
        assert!(!result);
        assert_eq!(checks, 3);
    }

    #[test]
    fn test_wait_sees_flag_created_by_another_thread() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iomgr.init");
        let flag_path = path.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            create_iomgr_initialization_flag_file(&flag_path).unwrap();
        });
        assert!(wait_for_iomgr_initialization(
            &path,
            Duration::from_millis(2),
            || true
        ));
        writer.join().unwrap();
    }
}
