//! Single-slot persistent local storage for the user's default dashboard.

use super::StoreError;
#[cfg(test)]
use mockall::automock;
use std::fs;
use std::path::PathBuf;

#[cfg_attr(test, automock)]
pub trait LocalStorage: Send + Sync {
    /// Whether the slot can be read and written at all.
    fn is_available(&self) -> bool;

    /// Slot contents; `None` when nothing was ever stored.
    fn read(&self) -> Result<Option<String>, StoreError>;

    fn write(&self, contents: &str) -> Result<(), StoreError>;
}

/// Slot backed by one file. Parent directories are created on demand.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LocalStorage for FileStorage {
    fn is_available(&self) -> bool {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).is_ok(),
            _ => true,
        }
    }

    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)?;
        Ok(())
    }
}
