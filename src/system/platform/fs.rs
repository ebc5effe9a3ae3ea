//! Filesystem access used by the procfs backend.
//!
//! `RealFs` talks to the kernel, `MockFs` serves an in-memory tree so the
//! backend can be exercised against fixed `/proc` and `/sys` contents.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Space figures for a mounted filesystem, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsUsage {
    pub total: u64,
    /// Free blocks including those reserved for root.
    pub free: u64,
    /// Free blocks usable by unprivileged users.
    pub available: u64,
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn exists(&self, path: &Path) -> bool;

    /// Direct children of `path`, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    fn statvfs(&self, mountpoint: &Path) -> io::Result<FsUsage>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    #[cfg(unix)]
    fn statvfs(&self, mountpoint: &Path) -> io::Result<FsUsage> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(mountpoint.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: statvfs is plain old data and fully written on success.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        let frsize = stat.f_frsize as u64;
        Ok(FsUsage {
            total: stat.f_blocks as u64 * frsize,
            free: stat.f_bfree as u64 * frsize,
            available: stat.f_bavail as u64 * frsize,
        })
    }

    #[cfg(not(unix))]
    fn statvfs(&self, _mountpoint: &Path) -> io::Result<FsUsage> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "statvfs is only available on unix",
        ))
    }
}

/// In-memory filesystem.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, String>,
    directories: HashSet<PathBuf>,
    usage: HashMap<PathBuf, FsUsage>,
    mtimes: HashMap<PathBuf, SystemTime>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, creating its parent directories.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    pub fn remove(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.files.retain(|p, _| !p.starts_with(path));
        self.directories.retain(|p| !p.starts_with(path));
    }

    pub fn set_usage(&mut self, mountpoint: impl AsRef<Path>, usage: FsUsage) {
        self.usage.insert(mountpoint.as_ref().to_path_buf(), usage);
    }

    pub fn set_modified(&mut self, path: impl AsRef<Path>, time: SystemTime) {
        self.mtimes.insert(path.as_ref().to_path_buf(), time);
    }

    /// Adds `/proc/<pid>/{stat,status,cmdline,comm}`.
    pub fn add_process(&mut self, pid: u32, stat: &str, uid: u32, cmdline: &str, comm: &str) {
        let base = PathBuf::from(format!("/proc/{pid}"));
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat);
        self.add_file(
            base.join("status"),
            format!("Name:\t{comm}\nPid:\t{pid}\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\n"),
        );
        self.add_file(base.join("cmdline"), cmdline);
        self.add_file(base.join("comm"), format!("{comm}\n"));
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("not found: {}", path.display()))
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(not_found(path));
        }
        let mut entries: Vec<PathBuf> = self
            .files
            .keys()
            .chain(self.directories.iter())
            .filter(|p| p.parent() == Some(path) && p.as_path() != path)
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        if !self.exists(path) {
            return Err(not_found(path));
        }
        Ok(self
            .mtimes
            .get(path)
            .copied()
            .unwrap_or(SystemTime::UNIX_EPOCH))
    }

    fn statvfs(&self, mountpoint: &Path) -> io::Result<FsUsage> {
        self.usage
            .get(mountpoint)
            .copied()
            .ok_or_else(|| not_found(mountpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_add_file_creates_parents() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 16384 kB\n");

        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(fs.exists(Path::new("/proc")));
        let content = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert_eq!(content, "MemTotal: 16384 kB\n");
    }

    #[test]
    fn mock_fs_read_dir_lists_direct_children() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1/stat", "a");
        fs.add_file("/proc/1/status", "b");
        fs.add_file("/proc/2/stat", "c");

        assert_eq!(fs.read_dir(Path::new("/proc")).unwrap().len(), 2);
        assert_eq!(fs.read_dir(Path::new("/proc/1")).unwrap().len(), 2);
    }

    #[test]
    fn mock_fs_remove_drops_subtree() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/7/stat", "x");
        fs.remove("/proc/7");
        assert!(!fs.exists(Path::new("/proc/7")));
        assert!(fs.read_dir(Path::new("/proc")).unwrap().is_empty());
    }

    #[test]
    fn mock_fs_not_found() {
        let fs = MockFs::new();
        let err = fs.read_to_string(Path::new("/nonexistent")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(fs.statvfs(Path::new("/")).is_err());
    }

    #[test]
    fn real_fs_reads_manifest() {
        let fs = RealFs;
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        assert!(fs.exists(&manifest));
        assert!(fs.read_to_string(&manifest).unwrap().contains("[package]"));
    }
}
