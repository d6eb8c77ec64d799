use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

/// Toggles a file between read-only and writable around writes.
///
/// This only keeps people and tools from editing the file by accident, it is
/// not a lock between processes.
pub trait PermissionGuard: Send + Sync {
    /// Make `path` writable for its owner. Returns `false` when `path` does
    /// not exist yet, which is not an error.
    fn make_writable(&self, path: &Path) -> io::Result<bool>;

    /// Make `path` read-only for owner, group and others.
    fn make_read_only(&self, path: &Path) -> io::Result<()>;
}

/// [`PermissionGuard`] that changes file mode bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileModeGuard;

#[cfg(unix)]
const WRITABLE_MODE: u32 = 0o600;
#[cfg(unix)]
const READ_ONLY_MODE: u32 = 0o444;

impl PermissionGuard for FileModeGuard {
    fn make_writable(&self, path: &Path) -> io::Result<bool> {
        if !path.is_file() {
            return Ok(false);
        }

        set_writable(path, true)?;
        debug!("Unlocked {:?}", path);
        Ok(true)
    }

    fn make_read_only(&self, path: &Path) -> io::Result<()> {
        set_writable(path, false)?;
        debug!("Locked {:?}", path);
        Ok(())
    }
}

#[cfg(unix)]
fn set_writable(path: &Path, writable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if writable {
        WRITABLE_MODE
    } else {
        READ_ONLY_MODE
    };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_writable(path: &Path, writable: bool) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(!writable);
    fs::set_permissions(path, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;

    #[test]
    fn guard_toggles_read_only() {
        let (_dir, path) = fixture::defects();
        let guard = FileModeGuard;

        guard.make_read_only(&path).unwrap();
        assert!(fs::metadata(&path).unwrap().permissions().readonly());

        assert!(guard.make_writable(&path).unwrap());
        assert!(!fs::metadata(&path).unwrap().permissions().readonly());
    }

    #[cfg(unix)]
    #[test]
    fn guard_sets_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = fixture::defects();
        let guard = FileModeGuard;
        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;

        guard.make_read_only(&path).unwrap();
        assert_eq!(mode(&path), 0o444);

        guard.make_writable(&path).unwrap();
        assert_eq!(mode(&path), 0o600);
    }

    #[test]
    fn guard_missing_file_is_not_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.csv");

        assert!(!FileModeGuard.make_writable(&missing).unwrap());
        assert!(!missing.exists());
    }
}
