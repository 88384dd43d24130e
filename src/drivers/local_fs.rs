//! Reference local-filesystem `ReplicaDriver`
//!
//! Grounded on the teacher's `LocalFileSystem`: a thin wrapper translating
//! each VIO primitive onto the platform filesystem. The teacher drives
//! `compio`/`compio_fs_extended` for async I/O; this crate's execution
//! model is synchronous, so every method here is a direct `std::fs` call.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::PermissionsExt;

use filetime::FileTime;

use crate::config::Capabilities;
use crate::error::{PropagateError, Result};
use crate::tree::FileStat;
use crate::vio::{ReplicaDriver, VioFileStat};

/// A `ReplicaDriver` backed directly by the host filesystem.
///
/// Declares no optional transports and no atomic-replace support, since
/// `std::fs` offers none beyond `rename` within one filesystem; every
/// upload or download to this driver stages to a temp sibling.
#[derive(Debug, Default)]
pub struct LocalFsDriver;

impl LocalFsDriver {
    /// A new local filesystem driver. Stateless; every method resolves
    /// its URI (a plain filesystem path) at call time.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn map_io(operation: &'static str, uri: &str, err: io::Error) -> PropagateError {
    PropagateError::from_io(operation, uri, None, &err)
}

impl ReplicaDriver for LocalFsDriver {
    type Handle = File;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            atomar_copy_support: false,
            use_send_file_to_propagate: false,
            put_support: false,
            get_support: false,
            do_post_copy_stat: true,
        }
    }

    fn open_read(&self, uri: &str) -> Result<Self::Handle> {
        File::open(uri).map_err(|e| map_io("open_read", uri, e))
    }

    fn create_new(&self, uri: &str) -> Result<Self::Handle> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(uri)
            .map_err(|e| map_io("create_new", uri, e))
    }

    fn open_append(&self, uri: &str) -> Result<Self::Handle> {
        OpenOptions::new()
            .append(true)
            .open(uri)
            .map_err(|e| map_io("open_append", uri, e))
    }

    fn close(&self, _handle: Self::Handle) -> Result<()> {
        Ok(())
    }

    fn stat(&self, uri: &str) -> Result<VioFileStat> {
        let meta = fs::metadata(uri).map_err(|e| map_io("stat", uri, e))?;
        let modtime = filetime::FileTime::from_last_modification_time(&meta).unix_seconds();
        Ok(VioFileStat {
            size: meta.len(),
            modtime,
            inode: inode_of(&meta),
            md5: None,
        })
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(from, to).map_err(|e| map_io("rename", from, e))
    }

    fn unlink(&self, uri: &str) -> Result<()> {
        fs::remove_file(uri).map_err(|e| map_io("unlink", uri, e))
    }

    fn rmdir(&self, uri: &str) -> Result<()> {
        fs::remove_dir(uri).map_err(|e| map_io("rmdir", uri, e))
    }

    fn mkdirs(&self, uri: &str, mode: u32) -> Result<()> {
        fs::create_dir_all(uri).map_err(|e| map_io("mkdirs", uri, e))?;
        fs::set_permissions(uri, fs::Permissions::from_mode(mode))
            .map_err(|e| map_io("mkdirs", uri, e))
    }

    fn chmod(&self, uri: &str, mode: u32) -> Result<()> {
        fs::set_permissions(uri, fs::Permissions::from_mode(mode))
            .map_err(|e| map_io("chmod", uri, e))
    }

    fn chown(&self, uri: &str, uid: u32, gid: u32) -> Result<()> {
        let path = std::ffi::CString::new(uri.as_bytes())
            .map_err(|_| PropagateError::Vio {
                operation: "chown",
                uri: uri.to_string(),
                message: "path contains an interior NUL byte".to_string(),
                errno: None,
            })?;
        // SAFETY: `path` is a valid, NUL-terminated C string for the
        // duration of this call.
        let rc = unsafe { libc::chown(path.as_ptr(), uid, gid) };
        if rc == 0 {
            Ok(())
        } else {
            Err(map_io("chown", uri, io::Error::last_os_error()))
        }
    }

    fn utimes(&self, uri: &str, modtime: i64) -> Result<()> {
        let time = FileTime::from_unix_time(modtime, 0);
        filetime::set_file_mtime(uri, time).map_err(|e| map_io("utimes", uri, e))
    }

    fn file_id(&self, uri: &str) -> Result<String> {
        let bytes = fs::read(uri).map_err(|e| map_io("file_id", uri, e))?;
        let digest = md5::compute(&bytes);
        Ok(format!("{digest:x}"))
    }

    fn name(&self) -> &'static str {
        "local_fs"
    }
}

#[cfg(unix)]
fn inode_of(meta: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn inode_of(_meta: &fs::Metadata) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn create_then_stat_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        let uri = path.to_str().unwrap();
        let driver = LocalFsDriver::new();

        {
            use std::io::Write;
            let mut handle = driver.create_new(uri).unwrap();
            handle.write_all(b"hello").unwrap();
        }

        let st = driver.stat(uri).unwrap();
        assert_eq!(st.size, 5);
    }

    #[test]
    fn create_new_fails_on_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        let uri = path.to_str().unwrap();
        fs::write(&path, b"x").unwrap();

        let driver = LocalFsDriver::new();
        let err = driver.create_new(uri).unwrap_err();
        match err {
            PropagateError::Vio { errno, .. } => assert_eq!(errno, Some(libc::EEXIST)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mkdirs_then_rmdir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c");
        let uri = path.to_str().unwrap();
        let driver = LocalFsDriver::new();
        driver.mkdirs(uri, 0o755).unwrap();
        assert!(Path::new(uri).is_dir());
        driver.rmdir(uri).unwrap();
        assert!(!Path::new(uri).exists());
    }

    #[test]
    fn file_id_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        let uri = path.to_str().unwrap();
        let driver = LocalFsDriver::new();
        fs::write(&path, b"one").unwrap();
        let id1 = driver.file_id(uri).unwrap();
        fs::write(&path, b"two").unwrap();
        let id2 = driver.file_id(uri).unwrap();
        assert_ne!(id1, id2);
    }
}
