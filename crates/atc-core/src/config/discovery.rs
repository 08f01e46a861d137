//! Configuration discovery and resolution

use super::types::Config;
use crate::home::global_config_path;
use crate::spawn::discovery::DESKTOP_BINARY_ENV;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Repo-local config file name
pub const REPO_CONFIG_FILE: &str = ".atc.toml";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error in {}: {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Explicit config file, used instead of the repo-local search
    pub config_path: Option<PathBuf>,
    pub teams_dir: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables
/// 3. Repo-local config (.atc.toml in current dir or up to the git root),
///    or the file named by `--config`
/// 4. Global config (~/.config/atc/config.toml)
/// 5. Defaults
///
/// Unparsable discovered files are skipped with a warning; an explicit
/// `--config` file must load.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    // 4. Global config
    let global = global_config_path(home_dir);
    if global.exists() {
        match load_config_file(&global) {
            Ok(file_config) => config.merge(file_config),
            Err(e) => warn!("Ignoring global config: {e}"),
        }
    }

    // 3. Explicit file or repo-local config
    if let Some(path) = &overrides.config_path {
        config.merge(load_config_file(path)?);
    } else if let Some(repo_config) = find_repo_local_config(current_dir) {
        match load_config_file(&repo_config) {
            Ok(file_config) => config.merge(file_config),
            Err(e) => warn!("Ignoring repo config: {e}"),
        }
    }

    // 2. Environment
    apply_env_overrides(&mut config);

    // 1. Command line
    if let Some(dir) = &overrides.teams_dir {
        config.core.teams_dir = Some(dir.clone());
    }
    if let Some(dir) = &overrides.project_dir {
        config.core.project_dir = Some(dir.clone());
    }

    Ok(config)
}

/// Find the repo-local config file
///
/// Searches the current directory and its parents, stopping at the git root.
fn find_repo_local_config(current_dir: &Path) -> Option<PathBuf> {
    let mut dir = current_dir;
    loop {
        let config_path = dir.join(REPO_CONFIG_FILE);
        if config_path.exists() {
            debug!("Found repo config at {}", config_path.display());
            return Some(config_path);
        }
        if dir.join(".git").exists() {
            return None;
        }
        dir = dir.parent()?;
    }
}

fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(dir) = env_path("ATC_TEAMS_DIR") {
        config.core.teams_dir = Some(dir);
    }
    if let Some(dir) = env_path("ATC_PROJECT_DIR") {
        config.core.project_dir = Some(dir);
    }
    if let Some(binary) = env_path(DESKTOP_BINARY_ENV) {
        config.spawn.desktop_binary = Some(binary);
    }
}
