//! Per-backend launch, probe and kill
//!
//! Each [`BackendKind`] has one [`Backend`] implementation; [`backend_for`]
//! is the dispatch table. Probes never fail: a missing tool, a timeout or a
//! handle of the wrong kind all read as "not alive" / "no content".

use super::command::{build_tmux_command, build_windows_command, tmux_split_args};
use super::runner::{CommandRunner, DetachedSpec, RunError};
use crate::io::fingerprint;
use crate::schema::{BackendHandle, BackendKind, TeamMember};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Bound on tmux liveness and capture probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const TMUX: &str = "tmux";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("The {backend} backend requires {what}")]
    MissingBinary {
        backend: BackendKind,
        what: &'static str,
    },

    #[error("Launch command contains a NUL byte")]
    InvalidCommand,

    #[error("tmux split-window failed: {message}")]
    Tmux { message: String },

    #[error(transparent)]
    Run(#[from] RunError),
}

/// Everything a backend needs to start one member.
#[derive(Debug, Clone)]
pub struct LaunchContext<'a> {
    pub member: &'a TeamMember,
    /// Agent CLI, used by the tmux and scripted-terminal backends
    pub agent_binary: Option<&'a Path>,
    /// Desktop app, required by the headless backend
    pub desktop_binary: Option<&'a Path>,
    pub timeout_secs: u64,
    /// Transcript file for scripted terminals
    pub transcript: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn launch(
        &self,
        runner: &dyn CommandRunner,
        ctx: &LaunchContext<'_>,
    ) -> Result<BackendHandle, LaunchError>;

    async fn probe_alive(&self, runner: &dyn CommandRunner, handle: &BackendHandle) -> bool;

    /// Fingerprint of the latest output, when the backend has any to sample.
    async fn probe_content(
        &self,
        runner: &dyn CommandRunner,
        handle: &BackendHandle,
        transcript: Option<&Path>,
    ) -> Option<String>;

    /// Best-effort termination. A worker that is already gone is success.
    async fn kill(&self, runner: &dyn CommandRunner, handle: &BackendHandle)
    -> Result<(), LaunchError>;
}

pub struct TmuxBackend;
pub struct DesktopBackend;
pub struct WindowsTerminalBackend;

static TMUX_BACKEND: TmuxBackend = TmuxBackend;
static DESKTOP_BACKEND: DesktopBackend = DesktopBackend;
static WINDOWS_TERMINAL_BACKEND: WindowsTerminalBackend = WindowsTerminalBackend;

pub fn backend_for(kind: BackendKind) -> &'static dyn Backend {
    match kind {
        BackendKind::Tmux => &TMUX_BACKEND,
        BackendKind::Desktop => &DESKTOP_BACKEND,
        BackendKind::WindowsTerminal => &WINDOWS_TERMINAL_BACKEND,
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl Backend for TmuxBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tmux
    }

    async fn launch(
        &self,
        runner: &dyn CommandRunner,
        ctx: &LaunchContext<'_>,
    ) -> Result<BackendHandle, LaunchError> {
        let binary = ctx.agent_binary.ok_or(LaunchError::MissingBinary {
            backend: BackendKind::Tmux,
            what: "the opencode CLI",
        })?;
        let shell_command = build_tmux_command(ctx.member, binary, ctx.timeout_secs)
            .map_err(|_| LaunchError::InvalidCommand)?;
        let output = runner
            .run(TMUX, &tmux_split_args(&shell_command), PROBE_TIMEOUT)
            .await?;
        if !output.success() {
            return Err(LaunchError::Tmux {
                message: output.stderr.trim().to_string(),
            });
        }
        let pane_id = output.stdout.trim().to_string();
        if pane_id.is_empty() {
            return Err(LaunchError::Tmux {
                message: "no pane id printed".to_string(),
            });
        }
        debug!("Launched '{}' in tmux pane {pane_id}", ctx.member.name);
        Ok(BackendHandle::Pane(pane_id))
    }

    async fn probe_alive(&self, runner: &dyn CommandRunner, handle: &BackendHandle) -> bool {
        let BackendHandle::Pane(pane_id) = handle else {
            return false;
        };
        if pane_id.is_empty() {
            return false;
        }
        match runner
            .run(
                TMUX,
                &args(&["display-message", "-t", pane_id.as_str(), "-p", "#{pane_dead}"]),
                PROBE_TIMEOUT,
            )
            .await
        {
            Ok(output) => output.success() && output.stdout.trim() == "0",
            Err(e) => {
                debug!("Pane probe for {pane_id} failed: {e}");
                false
            }
        }
    }

    async fn probe_content(
        &self,
        runner: &dyn CommandRunner,
        handle: &BackendHandle,
        _transcript: Option<&Path>,
    ) -> Option<String> {
        let BackendHandle::Pane(pane_id) = handle else {
            return None;
        };
        if pane_id.is_empty() {
            return None;
        }
        let output = runner
            .run(
                TMUX,
                &args(&["capture-pane", "-t", pane_id.as_str(), "-p"]),
                PROBE_TIMEOUT,
            )
            .await
            .ok()?;
        output
            .success()
            .then(|| fingerprint(output.stdout.as_bytes()))
    }

    async fn kill(
        &self,
        runner: &dyn CommandRunner,
        handle: &BackendHandle,
    ) -> Result<(), LaunchError> {
        let BackendHandle::Pane(pane_id) = handle else {
            return Ok(());
        };
        match runner
            .run(TMUX, &args(&["kill-pane", "-t", pane_id.as_str()]), PROBE_TIMEOUT)
            .await
        {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => {
                debug!(
                    "kill-pane {pane_id} exited {:?}; treating as already gone",
                    output.code
                );
                Ok(())
            }
            Err(RunError::NotFound { .. }) => {
                warn!("tmux not found while killing pane {pane_id}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Backend for DesktopBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Desktop
    }

    async fn launch(
        &self,
        runner: &dyn CommandRunner,
        ctx: &LaunchContext<'_>,
    ) -> Result<BackendHandle, LaunchError> {
        let binary = ctx.desktop_binary.ok_or(LaunchError::MissingBinary {
            backend: BackendKind::Desktop,
            what: "desktop_binary",
        })?;
        let spec = DetachedSpec {
            program: binary.to_string_lossy().into_owned(),
            args: Vec::new(),
            cwd: PathBuf::from(&ctx.member.cwd),
            env: ctx.env.clone(),
            new_console: false,
        };
        let pid = runner.spawn_detached(&spec).await?;
        debug!("Launched desktop app for '{}' as pid {pid}", ctx.member.name);
        Ok(BackendHandle::Process(pid))
    }

    async fn probe_alive(&self, runner: &dyn CommandRunner, handle: &BackendHandle) -> bool {
        match handle {
            BackendHandle::Process(pid) => runner.pid_alive(*pid),
            BackendHandle::Pane(_) => false,
        }
    }

    async fn probe_content(
        &self,
        _runner: &dyn CommandRunner,
        _handle: &BackendHandle,
        _transcript: Option<&Path>,
    ) -> Option<String> {
        None
    }

    async fn kill(
        &self,
        runner: &dyn CommandRunner,
        handle: &BackendHandle,
    ) -> Result<(), LaunchError> {
        match handle {
            BackendHandle::Process(pid) => Ok(runner.terminate(*pid).await?),
            BackendHandle::Pane(_) => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for WindowsTerminalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::WindowsTerminal
    }

    async fn launch(
        &self,
        runner: &dyn CommandRunner,
        ctx: &LaunchContext<'_>,
    ) -> Result<BackendHandle, LaunchError> {
        let binary = ctx.agent_binary.ok_or(LaunchError::MissingBinary {
            backend: BackendKind::WindowsTerminal,
            what: "the opencode CLI",
        })?;
        if let Some(parent) = ctx.transcript.as_deref().and_then(Path::parent) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create transcript directory {}: {e}", parent.display());
            }
        }
        let mut argv = build_windows_command(ctx.member, binary, ctx.transcript.as_deref());
        let program = argv.remove(0);
        let spec = DetachedSpec {
            program,
            args: argv,
            cwd: PathBuf::from(&ctx.member.cwd),
            env: ctx.env.clone(),
            new_console: true,
        };
        let pid = runner.spawn_detached(&spec).await?;
        debug!("Launched scripted terminal for '{}' as pid {pid}", ctx.member.name);
        Ok(BackendHandle::Process(pid))
    }

    async fn probe_alive(&self, runner: &dyn CommandRunner, handle: &BackendHandle) -> bool {
        match handle {
            BackendHandle::Process(pid) => runner.pid_alive(*pid),
            BackendHandle::Pane(_) => false,
        }
    }

    async fn probe_content(
        &self,
        _runner: &dyn CommandRunner,
        _handle: &BackendHandle,
        transcript: Option<&Path>,
    ) -> Option<String> {
        let bytes = tokio::fs::read(transcript?).await.ok()?;
        Some(fingerprint(&bytes))
    }

    async fn kill(
        &self,
        runner: &dyn CommandRunner,
        handle: &BackendHandle,
    ) -> Result<(), LaunchError> {
        match handle {
            BackendHandle::Process(pid) => Ok(runner.terminate(*pid).await?),
            BackendHandle::Pane(_) => Ok(()),
        }
    }
}
