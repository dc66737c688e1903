//! Virtual path & file-info
//!
//! Abstract path values the rest of the crate operates on, plus a small
//! query trait for modification-time checks so the planner and invalidation
//! engine never touch `std::fs` directly (grounded in the way
//! `atlas-build::fingerprint` reads `fs::metadata` and treats a read
//! failure as "changed").

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// An abstract path value. Temporary variants exist for synthetic inputs
/// (e.g. a module interface materialized in-memory by the scanner) that
/// never touch the real filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VirtualPath {
    Absolute(PathBuf),
    Relative(PathBuf),
    Temporary(PathBuf),
    TemporaryWithContents(PathBuf, Vec<u8>),
}

impl VirtualPath {
    pub fn path(&self) -> &Path {
        match self {
            VirtualPath::Absolute(p)
            | VirtualPath::Relative(p)
            | VirtualPath::Temporary(p)
            | VirtualPath::TemporaryWithContents(p, _) => p,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            VirtualPath::Temporary(_) | VirtualPath::TemporaryWithContents(_, _)
        )
    }

    /// Display name used in remarks and error messages.
    pub fn display_name(&self) -> String {
        self.path().display().to_string()
    }
}

/// Metadata the invalidation engine needs about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub modified: SystemTime,
    pub len: u64,
}

/// Abstracts "can I stat this path" so tests can supply fake timestamps
/// without touching the real filesystem.
pub trait FileInfo {
    fn stat(&self, path: &VirtualPath) -> io::Result<FileMeta>;

    /// Convenience: true if stat fails, matching the conservative "can't
    /// read = changed" rule used throughout this crate.
    fn exists(&self, path: &VirtualPath) -> bool {
        self.stat(path).is_ok()
    }
}

/// Real-filesystem implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileInfo;

impl FileInfo for RealFileInfo {
    fn stat(&self, path: &VirtualPath) -> io::Result<FileMeta> {
        if let VirtualPath::TemporaryWithContents(_, contents) = path {
            return Ok(FileMeta {
                modified: SystemTime::now(),
                len: contents.len() as u64,
            });
        }
        let meta = fs::metadata(path.path())?;
        Ok(FileMeta {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }
}

/// In-memory fixture for tests: an explicit map of path -> metadata.
#[derive(Debug, Default, Clone)]
pub struct FakeFileInfo {
    entries: std::collections::HashMap<PathBuf, FileMeta>,
}

impl FakeFileInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<PathBuf>, meta: FileMeta) {
        self.entries.insert(path.into(), meta);
    }

    pub fn touch(&mut self, path: impl Into<PathBuf>, at: SystemTime) {
        let path = path.into();
        let len = self.entries.get(&path).map(|m| m.len).unwrap_or(0);
        self.entries.insert(path, FileMeta { modified: at, len });
    }

    pub fn remove(&mut self, path: impl AsRef<Path>) {
        self.entries.remove(path.as_ref());
    }
}

impl FileInfo for FakeFileInfo {
    fn stat(&self, path: &VirtualPath) -> io::Result<FileMeta> {
        self.entries
            .get(path.path())
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such fake file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fake_file_info_tracks_explicit_entries() {
        let mut fake = FakeFileInfo::new();
        let t0 = SystemTime::UNIX_EPOCH;
        fake.set(
            "a.swift",
            FileMeta {
                modified: t0,
                len: 10,
            },
        );
        let vp = VirtualPath::Relative(PathBuf::from("a.swift"));
        assert!(fake.exists(&vp));
        assert_eq!(fake.stat(&vp).unwrap().modified, t0);

        fake.touch("a.swift", t0 + Duration::from_secs(1));
        assert!(fake.stat(&vp).unwrap().modified > t0);
    }

    #[test]
    fn missing_file_is_not_ok() {
        let fake = FakeFileInfo::new();
        let vp = VirtualPath::Relative(PathBuf::from("missing.swift"));
        assert!(!fake.exists(&vp));
    }

    #[test]
    fn temporary_with_contents_never_touches_disk() {
        let real = RealFileInfo;
        let vp = VirtualPath::TemporaryWithContents(PathBuf::from("/does/not/exist"), vec![1, 2, 3]);
        let meta = real.stat(&vp).unwrap();
        assert_eq!(meta.len, 3);
    }
}
