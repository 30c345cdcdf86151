//! Filesystem gateway consumed by discovery, the runner and the memo writer.

use std::path::{Path, PathBuf};

use crate::error::FilesystemError;

/// Filesystem capabilities the harness depends on.
pub trait Filesystem {
    /// Lists the names of the entries in the given directory.
    fn list_entries(&self, dir: &Path) -> Result<Vec<String>, FilesystemError>;

    /// Returns whether anything exists at the given path.
    fn exists(&self, path: &Path) -> bool;

    /// Returns whether the given path is an existing directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Reads the full contents of a file.
    fn read_all(&self, path: &Path) -> Result<Vec<u8>, FilesystemError>;

    /// Writes the full contents of a file, replacing anything already there.
    fn write_all(&self, path: &Path, contents: &[u8]) -> Result<(), FilesystemError>;

    /// Creates a directory and any missing parents.
    fn make_directories(&self, path: &Path) -> Result<(), FilesystemError>;
}

/// [`Filesystem`] backed by the host's real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostFilesystem;

impl Filesystem for HostFilesystem {
    fn list_entries(&self, dir: &Path) -> Result<Vec<String>, FilesystemError> {
        let to_error = |e| FilesystemError::from_io("list", dir.to_path_buf(), e);

        let mut names = vec![];
        for entry in std::fs::read_dir(dir).map_err(to_error)? {
            let entry = entry.map_err(to_error)?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }

        Ok(names)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_all(&self, path: &Path) -> Result<Vec<u8>, FilesystemError> {
        std::fs::read(path).map_err(|e| FilesystemError::from_io("read", path.to_path_buf(), e))
    }

    fn write_all(&self, path: &Path, contents: &[u8]) -> Result<(), FilesystemError> {
        std::fs::write(path, contents)
            .map_err(|e| FilesystemError::from_io("write", path.to_path_buf(), e))
    }

    fn make_directories(&self, path: &Path) -> Result<(), FilesystemError> {
        std::fs::create_dir_all(path)
            .map_err(|e| FilesystemError::from_io("create directory", path.to_path_buf(), e))
    }
}

/// Joins `<root>/<name>.<extension>`.
pub(crate) fn source_file_path(root: &Path, name: &str, extension: &str) -> PathBuf {
    root.join(std::format!("{name}.{extension}"))
}
