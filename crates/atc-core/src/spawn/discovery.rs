//! Locating the agent CLI and the desktop app on disk

use crate::home::get_home_dir;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming an explicit desktop binary
pub const DESKTOP_BINARY_ENV: &str = "ATC_DESKTOP_BINARY";

/// Name of the agent CLI looked up on PATH
pub const AGENT_BINARY_NAME: &str = "opencode";

const DESKTOP_PATH_NAMES: [&str; 2] = ["opencode-desktop", "OpenCode"];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Configured binary path {} does not exist", .path.display())]
    OverrideMissing { path: PathBuf },

    #[error("Could not find {what}. Install it or set its path explicitly{hint}")]
    NotFound { what: &'static str, hint: String },
}

/// Known install locations of the desktop app for the current platform.
pub fn desktop_known_paths() -> Vec<PathBuf> {
    let home = get_home_dir().ok();
    let mut paths = Vec::new();
    if cfg!(target_os = "macos") {
        paths.push(PathBuf::from(
            "/Applications/OpenCode.app/Contents/MacOS/OpenCode",
        ));
        if let Some(home) = &home {
            paths.push(home.join("Applications/OpenCode.app/Contents/MacOS/OpenCode"));
        }
    } else if cfg!(windows) {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            let local = PathBuf::from(local);
            paths.push(local.join("Programs").join("OpenCode").join("OpenCode.exe"));
            paths.push(
                local
                    .join("Programs")
                    .join("opencode-desktop")
                    .join("OpenCode.exe"),
            );
        }
    } else {
        paths.push(PathBuf::from("/usr/bin/opencode-desktop"));
        paths.push(PathBuf::from("/usr/local/bin/opencode-desktop"));
        paths.push(PathBuf::from("/opt/OpenCode/opencode-desktop"));
        if let Some(home) = &home {
            paths.push(home.join("Applications").join("OpenCode.AppImage"));
        }
    }
    paths
}

/// Known install locations of the agent CLI for the current platform.
pub fn agent_known_paths() -> Vec<PathBuf> {
    let home = get_home_dir().ok();
    let mut paths = Vec::new();
    if cfg!(windows) {
        if let Some(home) = &home {
            paths.push(home.join(".opencode").join("bin").join("opencode.exe"));
        }
        if let Some(appdata) = std::env::var_os("APPDATA") {
            paths.push(PathBuf::from(appdata).join("npm").join("opencode.cmd"));
        }
    } else {
        if let Some(home) = &home {
            paths.push(home.join(".opencode/bin/opencode"));
            paths.push(home.join(".local/bin/opencode"));
        }
        if cfg!(target_os = "macos") {
            paths.push(PathBuf::from("/opt/homebrew/bin/opencode"));
        }
        paths.push(PathBuf::from("/usr/local/bin/opencode"));
        paths.push(PathBuf::from("/usr/bin/opencode"));
    }
    paths
}

/// What is being looked for and how.
struct BinarySearch<'a> {
    what: &'static str,
    path_names: &'a [&'a str],
    hint: String,
}

/// Explicit override, then the first existing known path, then PATH.
fn resolve_binary<F>(
    search: BinarySearch<'_>,
    override_path: Option<&Path>,
    known_paths: &[PathBuf],
    lookup: F,
) -> Result<PathBuf, DiscoveryError>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    if let Some(path) = override_path {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(DiscoveryError::OverrideMissing {
                path: path.to_path_buf(),
            })
        };
    }

    if let Some(found) = known_paths.iter().find(|p| p.is_file()) {
        debug!("Found {} at known path {}", search.what, found.display());
        return Ok(found.clone());
    }

    search
        .path_names
        .iter()
        .find_map(|name| lookup(*name))
        .ok_or(DiscoveryError::NotFound {
            what: search.what,
            hint: search.hint,
        })
}

/// Resolve the desktop binary: explicit override, then `ATC_DESKTOP_BINARY`,
/// then known install paths, then PATH.
pub fn discover_desktop_binary(explicit: Option<&Path>) -> Result<PathBuf, DiscoveryError> {
    let env_override = std::env::var_os(DESKTOP_BINARY_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let override_path = explicit.map(Path::to_path_buf).or(env_override);
    discover_desktop_binary_with(override_path.as_deref(), &desktop_known_paths(), |name| {
        which::which(name).ok()
    })
}

/// Discovery with injectable known paths and PATH lookup.
pub fn discover_desktop_binary_with<F>(
    override_path: Option<&Path>,
    known_paths: &[PathBuf],
    lookup: F,
) -> Result<PathBuf, DiscoveryError>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let search = BinarySearch {
        what: "OpenCode Desktop",
        path_names: &DESKTOP_PATH_NAMES,
        hint: format!(" (e.g. {DESKTOP_BINARY_ENV}=/path/to/opencode-desktop)"),
    };
    resolve_binary(search, override_path, known_paths, lookup)
}

/// Resolve the agent CLI: explicit override, then known install paths, then PATH.
pub fn discover_agent_binary(explicit: Option<&Path>) -> Result<PathBuf, DiscoveryError> {
    discover_agent_binary_with(explicit, &agent_known_paths(), |name| {
        which::which(name).ok()
    })
}

pub fn discover_agent_binary_with<F>(
    explicit: Option<&Path>,
    known_paths: &[PathBuf],
    lookup: F,
) -> Result<PathBuf, DiscoveryError>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let search = BinarySearch {
        what: "the opencode CLI",
        path_names: &[AGENT_BINARY_NAME],
        hint: " (agent_binary in [spawn] config)".to_string(),
    };
    resolve_binary(search, explicit, known_paths, lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        let fake = temp_dir.path().join("opencode-desktop");
        std::fs::write(&fake, "fake").unwrap();

        let found = discover_desktop_binary_with(Some(fake.as_path()), &[], |_| None).unwrap();
        assert_eq!(found, fake);
    }

    #[test]
    fn test_missing_override_is_error() {
        let err = discover_desktop_binary_with(
            Some(Path::new("/nonexistent/path/opencode-desktop")),
            &[],
            |_| Some(PathBuf::from("/usr/local/bin/opencode-desktop")),
        )
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::OverrideMissing { .. }));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_known_path_before_path_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let fake = temp_dir.path().join("opencode-desktop");
        std::fs::write(&fake, "fake").unwrap();
        let missing = temp_dir.path().join("nope");

        let found = discover_desktop_binary_with(None, &[missing, fake.clone()], |_| {
            Some(PathBuf::from("/usr/local/bin/opencode-desktop"))
        })
        .unwrap();
        assert_eq!(found, fake);
    }

    #[test]
    fn test_path_fallback() {
        let found = discover_desktop_binary_with(None, &[], |name| {
            (name == "opencode-desktop").then(|| PathBuf::from("/usr/local/bin/opencode-desktop"))
        })
        .unwrap();
        assert_eq!(found, PathBuf::from("/usr/local/bin/opencode-desktop"));
    }

    #[test]
    fn test_not_found() {
        let err = discover_desktop_binary_with(None, &[], |_| None).unwrap_err();
        assert!(err.to_string().contains("Could not find OpenCode Desktop"));
    }

    #[test]
    #[serial]
    fn test_env_override_missing_file() {
        let original = std::env::var_os(DESKTOP_BINARY_ENV);
        unsafe { std::env::set_var(DESKTOP_BINARY_ENV, "/nonexistent/path/opencode-desktop") };
        let result = discover_desktop_binary(None);
        match original {
            Some(v) => unsafe { std::env::set_var(DESKTOP_BINARY_ENV, v) },
            None => unsafe { std::env::remove_var(DESKTOP_BINARY_ENV) },
        }
        assert!(matches!(result, Err(DiscoveryError::OverrideMissing { .. })));
    }

    #[test]
    fn test_agent_binary_lookup() {
        let found = discover_agent_binary_with(None, &[], |name| {
            assert_eq!(name, "opencode");
            Some(PathBuf::from("/usr/bin/opencode"))
        })
        .unwrap();
        assert_eq!(found, PathBuf::from("/usr/bin/opencode"));

        let err = discover_agent_binary_with(None, &[], |_| None).unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound { .. }));
        assert!(err.to_string().contains("the opencode CLI"));
    }

    #[test]
    fn test_agent_known_path_before_path_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let installed = temp_dir.path().join(".opencode/bin/opencode");
        std::fs::create_dir_all(installed.parent().unwrap()).unwrap();
        std::fs::write(&installed, "").unwrap();
        let missing = temp_dir.path().join(".local/bin/opencode");

        let found = discover_agent_binary_with(None, &[missing, installed.clone()], |_| {
            Some(PathBuf::from("/usr/bin/opencode"))
        })
        .unwrap();
        assert_eq!(found, installed);

        let err = discover_agent_binary_with(
            Some(Path::new("/nonexistent/opencode")),
            &[installed],
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::OverrideMissing { .. }));
    }
}
