//! Lookup of script resources by logical path (`/ddl/init.sql`).
//!
//! A logical path is resolved against one of two roots: the compile-time
//! root (the source tree being compiled) or the runtime root (files shipped
//! with the application). Callers that need a resource at compile time look
//! there first and fall back to the runtime root.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Mode;
use crate::error::{BindError, Result};

/// Resolves logical resource paths to file content.
pub trait ResourceLocator: Send + Sync {
    /// Root directory used for `mode`, if one is configured.
    fn root(&self, mode: Mode) -> Option<PathBuf>;

    /// Content of the resource at `path` for `mode`, or `None` if absent.
    fn read(&self, path: &str, mode: Mode) -> Result<Option<String>>;
}

/// Load `path`, trying the compile-time root before the runtime root.
pub fn load_resource(resources: &dyn ResourceLocator, path: &str) -> Result<String> {
    if let Some(content) = resources.read(path, Mode::CompileTime)? {
        debug!("Loaded {} from compile-time resources", path);
        return Ok(content);
    }
    if let Some(content) = resources.read(path, Mode::Runtime)? {
        debug!("Loaded {} from runtime resources", path);
        return Ok(content);
    }
    Err(BindError::Resource(path.to_string()))
}

/// Logical paths are rooted with `/` (or `\`); the leading separator is
/// relative to the resource root, not the filesystem.
fn relative(path: &str) -> &str {
    path.trim_start_matches(['/', '\\'])
}

/// Resources on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsResourceLocator {
    compile_root: Option<PathBuf>,
    runtime_root: Option<PathBuf>,
}

impl FsResourceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compile_root(mut self, root: impl AsRef<Path>) -> Self {
        self.compile_root = Some(root.as_ref().to_path_buf());
        self
    }

    pub fn with_runtime_root(mut self, root: impl AsRef<Path>) -> Self {
        self.runtime_root = Some(root.as_ref().to_path_buf());
        self
    }
}

impl ResourceLocator for FsResourceLocator {
    fn root(&self, mode: Mode) -> Option<PathBuf> {
        match mode {
            Mode::CompileTime => self.compile_root.clone(),
            Mode::Runtime => self.runtime_root.clone(),
            Mode::Unknown => self.runtime_root.clone().or_else(|| self.compile_root.clone()),
        }
    }

    fn read(&self, path: &str, mode: Mode) -> Result<Option<String>> {
        let Some(root) = self.root(mode) else {
            return Ok(None);
        };
        let file = root.join(relative(path));
        if !file.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(file)?))
    }
}

/// In-memory resources, for embedding scripts and for tests.
#[derive(Default, Clone)]
pub struct MemoryResourceLocator {
    files: HashMap<(Mode, String), String>,
}

impl MemoryResourceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource visible in `mode`.
    pub fn with_file(mut self, mode: Mode, path: &str, content: impl Into<String>) -> Self {
        self.files
            .insert((mode, relative(path).to_string()), content.into());
        self
    }
}

impl fmt::Debug for MemoryResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryResourceLocator")
            .field("files", &self.files.len())
            .finish()
    }
}

impl ResourceLocator for MemoryResourceLocator {
    fn root(&self, _mode: Mode) -> Option<PathBuf> {
        None
    }

    fn read(&self, path: &str, mode: Mode) -> Result<Option<String>> {
        Ok(self.files.get(&(mode, relative(path).to_string())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_time_wins() {
        let resources = MemoryResourceLocator::new()
            .with_file(Mode::Runtime, "/ddl/a.sql", "runtime")
            .with_file(Mode::CompileTime, "ddl/a.sql", "compile");
        assert_eq!(load_resource(&resources, "/ddl/a.sql").unwrap(), "compile");
    }

    #[test]
    fn test_runtime_fallback() {
        let resources = MemoryResourceLocator::new().with_file(Mode::Runtime, "/ddl/a.sql", "runtime");
        assert_eq!(load_resource(&resources, "/ddl/a.sql").unwrap(), "runtime");
    }

    #[test]
    fn test_missing_resource_names_path() {
        let resources = MemoryResourceLocator::new();
        let err = load_resource(&resources, "/ddl/missing.sql").unwrap_err();
        assert_eq!(
            err.to_string(),
            "No resource file found matching: /ddl/missing.sql"
        );
    }

    #[test]
    fn test_fs_locator() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ddl")).unwrap();
        std::fs::write(dir.path().join("ddl/init.sql"), "CREATE TABLE t(id INT);").unwrap();

        let resources = FsResourceLocator::new().with_runtime_root(dir.path());
        assert_eq!(
            load_resource(&resources, "/ddl/init.sql").unwrap(),
            "CREATE TABLE t(id INT);"
        );
        assert!(resources.read("/ddl/init.sql", Mode::CompileTime).unwrap().is_none());
        assert_eq!(resources.root(Mode::Unknown), Some(dir.path().to_path_buf()));
    }
}
