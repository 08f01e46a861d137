//! Agent binary version gate

use super::runner::{CommandRunner, RunError};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Oldest agent binary release the coordinator can drive
pub const MIN_AGENT_VERSION: SemVer = SemVer {
    major: 1,
    minor: 1,
    patch: 52,
};

/// Bound on the `--version` probe
pub const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Agent binary '{binary}' not found")]
    BinaryNotFound { binary: String },

    #[error("Agent binary version {found} is too old; 1.1.52 or newer is required")]
    TooOld { found: SemVer },

    #[error("Could not parse a version from output: {output:?}")]
    Unparsable { output: String },

    #[error("Version probe of '{binary}' timed out after {timeout:?}")]
    TimedOut { binary: String, timeout: Duration },

    #[error("Version probe of '{binary}' failed: {message}")]
    Probe { binary: String, message: String },
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"v?(\d+)\.(\d+)\.(\d+)").expect("static version regex is valid")
    })
}

/// Extract the first `MAJOR.MINOR.PATCH` from probe output.
///
/// Accepts a leading `v` and surrounding text (`"tool version v1.1.52"`).
pub fn parse_version(output: &str) -> Result<SemVer, VersionError> {
    let unparsable = || VersionError::Unparsable {
        output: output.trim().to_string(),
    };
    let caps = version_regex().captures(output).ok_or_else(unparsable)?;
    let part = |i: usize| -> Result<u64, VersionError> {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(unparsable)
    };
    Ok(SemVer {
        major: part(1)?,
        minor: part(2)?,
        patch: part(3)?,
    })
}

/// Reject versions older than [`MIN_AGENT_VERSION`].
pub fn ensure_supported(version: SemVer) -> Result<SemVer, VersionError> {
    if version < MIN_AGENT_VERSION {
        Err(VersionError::TooOld { found: version })
    } else {
        Ok(version)
    }
}

/// Run `<binary> --version` and check the result against the minimum.
pub async fn check_binary_version(
    runner: &dyn CommandRunner,
    binary: &Path,
) -> Result<SemVer, VersionError> {
    let binary_str = binary.to_string_lossy().into_owned();
    let output = runner
        .run(&binary_str, &["--version".to_string()], VERSION_PROBE_TIMEOUT)
        .await
        .map_err(|e| match e {
            RunError::NotFound { .. } => VersionError::BinaryNotFound {
                binary: binary_str.clone(),
            },
            RunError::TimedOut { timeout, .. } => VersionError::TimedOut {
                binary: binary_str.clone(),
                timeout,
            },
            RunError::Io { source, .. } => VersionError::Probe {
                binary: binary_str.clone(),
                message: source.to_string(),
            },
        })?;

    let text = if output.stdout.trim().is_empty() {
        output.stderr.as_str()
    } else {
        output.stdout.as_str()
    };
    let version = parse_version(text)?;
    debug!("{binary_str} reports version {version}");
    ensure_supported(version)
}
