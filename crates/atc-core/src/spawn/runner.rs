//! External process execution seam
//!
//! Every probe, launch and kill goes through [`CommandRunner`] so the
//! spawner and health monitor can be exercised without tmux or real agents.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Executable '{program}' not found")]
    NotFound { program: String },

    #[error("'{program}' did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("Failed to run '{program}': {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A process to start detached from the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetachedSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// Open a new console window (Windows) instead of running windowless
    pub new_console: bool,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, killing the child if `timeout` elapses.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError>;

    /// Start a detached process in its own session/process group. Returns its pid.
    async fn spawn_detached(&self, spec: &DetachedSpec) -> Result<u32, RunError>;

    /// Whether `pid` refers to a live process. Pid 0 is never alive.
    fn pid_alive(&self, pid: u32) -> bool;

    /// Ask `pid` to terminate. A process that is already gone is success.
    async fn terminate(&self, pid: u32) -> Result<(), RunError>;
}

/// Runs real OS processes through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        debug!("Running {program} {args:?}");
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| io_error(program, e))?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(io_error(program, e)),
            Err(_) => Err(RunError::TimedOut {
                program: program.to_string(),
                timeout,
            }),
        }
    }

    async fn spawn_detached(&self, spec: &DetachedSpec) -> Result<u32, RunError> {
        let mut command = std::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        detach(&mut command, spec.new_console);

        let mut child = command.spawn().map_err(|e| io_error(&spec.program, e))?;
        let pid = child.id();
        // Reap in the background so an exited worker does not linger as a zombie.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        debug!("Started detached {} as pid {pid}", spec.program);
        Ok(pid)
    }

    fn pid_alive(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }

    async fn terminate(&self, pid: u32) -> Result<(), RunError> {
        #[cfg(unix)]
        {
            let Some(target) = signal_target(pid) else {
                debug!("pid {pid} cannot name a single process; nothing to stop");
                return Ok(());
            };
            // SAFETY: plain signal delivery to a single positive pid.
            let result = unsafe { libc::kill(target, libc::SIGTERM) };
            if result == 0 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                debug!("pid {pid} already exited");
                return Ok(());
            }
            Err(io_error("kill", err))
        }
        #[cfg(not(unix))]
        {
            if pid == 0 {
                return Ok(());
            }
            let args = vec![
                "/PID".to_string(),
                pid.to_string(),
                "/T".to_string(),
                "/F".to_string(),
            ];
            // taskkill exits nonzero for unknown pids, which counts as already gone.
            self.run("taskkill", &args, Duration::from_secs(10)).await?;
            Ok(())
        }
    }
}

#[cfg(unix)]
fn detach(command: &mut std::process::Command, _new_console: bool) {
    use std::os::unix::process::CommandExt;
    // SAFETY: setsid is async-signal-safe and touches no parent state.
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(windows)]
fn detach(command: &mut std::process::Command, new_console: bool) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
    let flags = if new_console {
        CREATE_NEW_PROCESS_GROUP | CREATE_NEW_CONSOLE
    } else {
        CREATE_NEW_PROCESS_GROUP | DETACHED_PROCESS
    };
    command.creation_flags(flags);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut std::process::Command, _new_console: bool) {}

/// `pid` as a `kill(2)` target. Zero and values past `pid_t::MAX` would
/// address a process group or every process, so they have no target.
#[cfg(unix)]
fn signal_target(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|target| *target > 0)
}

/// Signal-free existence check for `pid`.
pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Some(target) = signal_target(pid) else {
            return false;
        };
        // SAFETY: kill(pid, 0) sends no signal; it only checks existence/permission.
        let result = unsafe { libc::kill(target, 0) };
        result == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        if pid == 0 {
            return false;
        }
        std::process::Command::new("tasklist")
            .args([
                "/FI".to_string(),
                format!("PID eq {pid}"),
                "/FO".to_string(),
                "CSV".to_string(),
                "/NH".to_string(),
            ])
            .output()
            .map(|out| tasklist_has_pid(&String::from_utf8_lossy(&out.stdout), pid))
            .unwrap_or(false)
    }
}

/// Whether `tasklist /FO CSV /NH` output has a row whose PID column is `pid`.
#[cfg(any(not(unix), test))]
fn tasklist_has_pid(output: &str, pid: u32) -> bool {
    let wanted = pid.to_string();
    output.lines().any(|line| {
        line.split(',')
            .nth(1)
            .map(|field| field.trim().trim_matches('"'))
            == Some(wanted.as_str())
    })
}

fn io_error(program: &str, source: std::io::Error) -> RunError {
    if source.kind() == std::io::ErrorKind::NotFound {
        RunError::NotFound {
            program: program.to_string(),
        }
    } else {
        RunError::Io {
            program: program.to_string(),
            source,
        }
    }
}
