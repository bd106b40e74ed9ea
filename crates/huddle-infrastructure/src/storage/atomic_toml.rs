//! Atomic TOML file operations.
//!
//! Provides a thin layer for safe access to TOML files shared between the
//! interactive process and the background delivery agent.

use huddle_core::ChatError;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Errors that can occur during atomic TOML operations.
#[derive(Debug)]
pub enum AtomicTomlError {
    /// File I/O error.
    IoError(std::io::Error),
    /// TOML deserialization error.
    TomlError(toml::de::Error),
    /// TOML serialization error.
    TomlSerError(toml::ser::Error),
    /// File locking error.
    LockError(String),
}

impl std::fmt::Display for AtomicTomlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicTomlError::IoError(e) => write!(f, "I/O error: {}", e),
            AtomicTomlError::TomlError(e) => write!(f, "TOML parse error: {}", e),
            AtomicTomlError::TomlSerError(e) => write!(f, "TOML serialization error: {}", e),
            AtomicTomlError::LockError(e) => write!(f, "Lock error: {}", e),
        }
    }
}

impl std::error::Error for AtomicTomlError {}

impl From<std::io::Error> for AtomicTomlError {
    fn from(e: std::io::Error) -> Self {
        AtomicTomlError::IoError(e)
    }
}

impl From<toml::de::Error> for AtomicTomlError {
    fn from(e: toml::de::Error) -> Self {
        AtomicTomlError::TomlError(e)
    }
}

impl From<toml::ser::Error> for AtomicTomlError {
    fn from(e: toml::ser::Error) -> Self {
        AtomicTomlError::TomlSerError(e)
    }
}

impl From<AtomicTomlError> for ChatError {
    fn from(e: AtomicTomlError) -> Self {
        match e {
            AtomicTomlError::IoError(io) => io.into(),
            AtomicTomlError::TomlError(de) => de.into(),
            AtomicTomlError::TomlSerError(ser) => ser.into(),
            AtomicTomlError::LockError(message) => ChatError::io(message),
        }
    }
}

/// A handle to a TOML file written with tmp file + fsync + rename.
///
/// Readers in another process either see the previous content or the new
/// content, never a partial write. [`AtomicTomlFile::load`] holds a shared
/// `fs2` lock and [`AtomicTomlFile::update`] an exclusive one, so a read never
/// interleaves with a read-modify-write.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file under a shared lock.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to lock, read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicTomlError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let _lock = FileLock::acquire(&self.path, LockMode::Shared)?;
        self.read_locked()
    }

    /// Replaces the file content under an exclusive lock.
    pub fn save(&self, data: &T) -> Result<(), AtomicTomlError> {
        let _lock = FileLock::acquire(&self.path, LockMode::Exclusive)?;
        self.write_locked(data)
    }

    /// Performs a locked read-modify-write.
    ///
    /// The closure receives the current data (or `default_value` if the file
    /// doesn't exist). If it returns `Ok`, the data is written back and the
    /// written value is returned.
    pub fn update<F>(&self, default_value: T, f: F) -> Result<T, AtomicTomlError>
    where
        F: FnOnce(&mut T) -> Result<(), AtomicTomlError>,
    {
        let _lock = FileLock::acquire(&self.path, LockMode::Exclusive)?;

        let mut data = self.read_locked()?.unwrap_or(default_value);
        f(&mut data)?;
        self.write_locked(&data)?;

        Ok(data)
    }

    fn read_locked(&self) -> Result<Option<T>, AtomicTomlError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(toml::from_str(&content)?))
    }

    fn write_locked(&self, data: &T) -> Result<(), AtomicTomlError> {
        let toml_string = toml::to_string_pretty(data)?;

        let tmp_path = sibling(&self.path, "tmp")?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// `.<file name>.<suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> Result<PathBuf, AtomicTomlError> {
    let invalid = |reason: &str| {
        AtomicTomlError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            reason.to_string(),
        ))
    };

    let parent = path
        .parent()
        .ok_or_else(|| invalid("Path has no parent directory"))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| invalid("Path has no file name"))?;

    Ok(parent.join(format!(".{}.{}", file_name.to_string_lossy(), suffix)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Advisory lock on a `.<file name>.lock` sibling, released on drop.
///
/// The lock file is never removed: deleting it while another process waits
/// on the old inode would let a third process lock a fresh one.
struct FileLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl FileLock {
    fn acquire(path: &Path, mode: LockMode) -> Result<Self, AtomicTomlError> {
        let lock_path = sibling(path, "lock")?;

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            let locked = match mode {
                LockMode::Shared => file.lock_shared(),
                LockMode::Exclusive => file.lock_exclusive(),
            };
            locked.map_err(|e| {
                AtomicTomlError::LockError(format!("Failed to acquire {:?} lock: {}", mode, e))
            })?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use fs2::FileExt;
            let _ = self.file.unlock();
        }
    }
}
