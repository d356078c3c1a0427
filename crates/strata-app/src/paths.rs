//! Where the generator keeps its config and logs.

use std::io;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "strata";

#[derive(Debug, thiserror::Error)]
pub enum PathsError {
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    #[error("failed to create directory: {0}")]
    Io(#[from] io::Error),
}

/// OS-specific locations (XDG on Linux, Known Folders on Windows, Library on
/// macOS), or everything under one root when `--config` is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    /// Holds `config.ron`.
    pub config_dir: PathBuf,
    /// Holds the JSON log of debug builds.
    pub log_dir: PathBuf,
}

impl AppDirs {
    /// Resolve directories without creating them.
    pub fn resolve(config_override: Option<&Path>) -> Result<Self, PathsError> {
        if let Some(root) = config_override {
            return Ok(Self::resolve_with_root(root));
        }
        let config_dir = strata_config::default_config_dir().ok_or(PathsError::NoConfigDir)?;
        let log_dir = dirs::data_local_dir()
            .map(|dir| dir.join(APP_NAME).join("logs"))
            .unwrap_or_else(|| config_dir.join("logs"));
        Ok(Self {
            config_dir,
            log_dir,
        })
    }

    pub fn resolve_with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            log_dir: root.join("logs"),
        }
    }

    pub fn create_dirs(&self) -> Result<(), PathsError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}
