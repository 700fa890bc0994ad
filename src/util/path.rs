use std::path::{Path, PathBuf};

use crate::application::{ApplicationError, ApplicationResult};

pub trait PathExt {
    /// Expand `~`, `$VAR` and `${VAR}`; unexpandable input is returned as is.
    fn expand(&self) -> PathBuf;
}

impl PathExt for Path {
    fn expand(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.to_string_lossy()))
    }
}

/// Expand environment variables and tilde in a path string.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

pub fn ensure_file_exists(path: &Path) -> ApplicationResult<()> {
    if !path.exists() {
        Err(ApplicationError::FileNotFound(path.to_path_buf()))
    } else if !path.is_file() {
        Err(ApplicationError::Parse {
            path: path.to_path_buf(),
            message: "not a file".to_string(),
        })
    } else {
        Ok(())
    }
}
