//! Home directory and default path resolution
//!
//! # Precedence
//!
//! 1. `ATC_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default
//!
//! Tests should set `ATC_HOME` to a temporary directory instead of touching
//! the real home.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Get the home directory for atc operations.
///
/// # Errors
///
/// Returns an error if `ATC_HOME` is unset and the platform home directory
/// cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(raw) = std::env::var("ATC_HOME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed.trim_end_matches(['/', '\\'])));
        }
    }
    dirs::home_dir().context("Could not determine home directory (set ATC_HOME to override)")
}

/// Default root for team directories: `<home>/.atc/teams`.
pub fn default_teams_root(home: &Path) -> PathBuf {
    home.join(".atc").join("teams")
}

/// Path of the global config file: `<home>/.config/atc/config.toml`.
pub fn global_config_path(home: &Path) -> PathBuf {
    home.join(".config").join("atc").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_atc_home_override() {
        let original = std::env::var("ATC_HOME").ok();
        unsafe { std::env::set_var("ATC_HOME", "/custom/atc/home/") };
        let home = get_home_dir().unwrap();
        assert_eq!(home, PathBuf::from("/custom/atc/home"));
        match original {
            Some(v) => unsafe { std::env::set_var("ATC_HOME", v) },
            None => unsafe { std::env::remove_var("ATC_HOME") },
        }
    }

    #[test]
    #[serial]
    fn test_empty_atc_home_falls_back() {
        let original = std::env::var("ATC_HOME").ok();
        unsafe { std::env::set_var("ATC_HOME", "  ") };
        let home = get_home_dir();
        match original {
            Some(v) => unsafe { std::env::set_var("ATC_HOME", v) },
            None => unsafe { std::env::remove_var("ATC_HOME") },
        }
        if let Some(platform) = dirs::home_dir() {
            assert_eq!(home.unwrap(), platform);
        }
    }

    #[test]
    fn test_default_paths() {
        let home = Path::new("/home/u");
        assert_eq!(default_teams_root(home), PathBuf::from("/home/u/.atc/teams"));
        assert_eq!(
            global_config_path(home),
            PathBuf::from("/home/u/.config/atc/config.toml")
        );
    }
}
