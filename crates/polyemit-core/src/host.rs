//! Host compiler boundary.
//!
//! The engine never parses, type-checks, or emits code itself; the host
//! compiler does, and hands the engine a file-system abstraction, syntax
//! trees, and hook registration. These traits pin down exactly what is
//! consumed, so the engine is unit-testable without a real compiler.

use crate::error::{Error, Result};
use crate::tree::Node;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The host compiler's file-system abstraction.
///
/// Mirrors the operations a compiler host exposes: existence/directory
/// probes, optional reads, writes, deletes. `read` folds read failures into
/// the no-value result, matching host semantics where a missing file and an
/// unreadable file are the same answer.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_directory(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> Option<String>;

    fn write(&self, path: &Path, data: &str) -> Result<()>;

    fn delete(&self, path: &Path) -> Result<()>;
}

/// One emitted unit: the path the host is about to serialize and the syntax
/// tree it produced for it. Trees are owned by the host for the duration of
/// one emit; transforms rebuild them and never retain nodes past the hook.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub root: Node,
}

impl SourceUnit {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, root: Node) -> Self {
        Self {
            path: path.into(),
            root,
        }
    }

    /// Directory of the containing file; relative specifiers resolve
    /// against this.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// A tree-to-tree hook run between emission and serialization.
pub trait EmitTransform: Send + Sync {
    fn transform(&self, unit: &SourceUnit) -> Result<SourceUnit>;
}

/// Registration surface of the host compiler's emit orchestrator.
///
/// The build driver installs its rewriters and the per-target incremental
/// metadata path through this; the host decides when hooks actually run.
pub trait EmitPipeline {
    /// Register a hook that runs after script emission.
    fn after_emit(&mut self, hook: Box<dyn EmitTransform>);

    /// Register a hook that runs after declaration emission.
    fn after_declarations(&mut self, hook: Box<dyn EmitTransform>);

    /// Redirect the incremental-build metadata file.
    fn set_build_info_path(&mut self, path: PathBuf);
}

/// Real file system host backed by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFileSystem;

impl DiskFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for DiskFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read(&self, path: &Path) -> Option<String> {
        polyemit_util::fs::read_to_string_lossy(path).ok()
    }

    fn write(&self, path: &Path, data: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        polyemit_util::fs::atomic_write(path, data.as_bytes())?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(Error::Io)
    }
}

/// In-memory file system host.
///
/// Used by unit tests and by embedders that drive the engine against
/// virtual trees.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl MemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.into());
    }

    pub fn add_directory(&self, path: impl Into<PathBuf>) {
        self.dirs.lock().unwrap().insert(path.into());
    }

    #[must_use]
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    /// Sorted list of all stored paths, for assertions.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.dirs.lock().unwrap().contains(path)
    }

    fn read(&self, path: &Path) -> Option<String> {
        self.contents(path)
    }

    fn write(&self, path: &Path, data: &str) -> Result<()> {
        self.insert(path.to_path_buf(), data);
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.files.lock().unwrap().remove(path).map(|_| ()).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CompilerRelease, Node};

    #[test]
    fn test_memory_fs_round_trip() {
        let fs = MemoryFileSystem::new();
        fs.write(Path::new("/out/a.js"), "export {};").unwrap();

        assert!(fs.exists(Path::new("/out/a.js")));
        assert_eq!(fs.read(Path::new("/out/a.js")).unwrap(), "export {};");

        fs.delete(Path::new("/out/a.js")).unwrap();
        assert!(!fs.exists(Path::new("/out/a.js")));
    }

    #[test]
    fn test_memory_fs_delete_missing_is_error() {
        let fs = MemoryFileSystem::new();
        assert!(fs.delete(Path::new("/nope.js")).is_err());
    }

    #[test]
    fn test_memory_fs_directories() {
        let fs = MemoryFileSystem::new();
        fs.add_directory("/src/lib");
        assert!(fs.is_directory(Path::new("/src/lib")));
        assert!(!fs.is_directory(Path::new("/src/other")));
    }

    #[test]
    fn test_source_unit_dir() {
        let kinds = CompilerRelease::default().kind_table();
        let unit = SourceUnit::new("/out/nested/a.js", Node::new(kinds.source_file));
        assert_eq!(unit.dir(), Path::new("/out/nested"));

        let bare = SourceUnit::new("a.js", Node::new(kinds.source_file));
        assert_eq!(bare.dir(), Path::new(""));
    }
}
