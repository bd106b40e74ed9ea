//! Path management for Huddle files.
//!
//! ```text
//! ~/.config/huddle/            # Config directory (dirs::config_dir)
//! ├── huddle.toml              # Feed thresholds
//! └── durable.toml             # Store shared with the delivery agent
//! ```

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for huddle_core::ChatError {
    fn from(e: PathError) -> Self {
        huddle_core::ChatError::config(e.to_string())
    }
}

pub struct HuddlePaths;

impl HuddlePaths {
    const APP_DIR: &'static str = "huddle";

    /// Returns `<platform config dir>/huddle`.
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(Self::APP_DIR))
            .ok_or(PathError::ConfigDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("huddle.toml"))
    }

    /// Default location of the durable store, used when
    /// `[storage] durable_store_path` is not set.
    pub fn durable_store_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("durable.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_live_under_app_dir() {
        // Headless CI may have no config dir; nothing to assert then.
        let Ok(dir) = HuddlePaths::config_dir() else {
            return;
        };
        assert!(dir.ends_with("huddle"));
        assert_eq!(HuddlePaths::config_file().unwrap(), dir.join("huddle.toml"));
        assert_eq!(
            HuddlePaths::durable_store_file().unwrap(),
            dir.join("durable.toml")
        );
    }
}
