use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base clusterkit config directory (universal ~/.config/clusterkit/ on all platforms)
pub fn clusterkit() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("clusterkit"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("clusterkit"))
    }
}

/// Global clusterkit.json config file path
pub fn clusterkit_json() -> Result<PathBuf> {
    Ok(clusterkit()?.join("clusterkit.json"))
}
