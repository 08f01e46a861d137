//! Scripted [`CommandRunner`] for tests
//!
//! Answers `run` calls from canned responses keyed by program and first
//! argument, records every call, and tracks a fake process table so spawns,
//! probes and kills can be asserted without tmux or a real agent binary.

use super::runner::{CommandOutput, CommandRunner, DetachedSpec, RunError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Canned result for a `run` call
#[derive(Debug, Clone)]
pub enum MockResponse {
    Output(CommandOutput),
    NotFound,
    TimedOut,
}

impl MockResponse {
    /// Exit 0 with `stdout`.
    pub fn ok(stdout: &str) -> Self {
        MockResponse::Output(CommandOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    /// Nonzero exit with `stderr`.
    pub fn fail(code: i32, stderr: &str) -> Self {
        MockResponse::Output(CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }
}

/// Call record for mock runner operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Run { program: String, args: Vec<String> },
    SpawnDetached(DetachedSpec),
    Terminate(u32),
}

#[derive(Debug)]
struct MockState {
    calls: Vec<MockCall>,
    responses: HashMap<(String, String), MockResponse>,
    alive: HashSet<u32>,
    next_pid: u32,
    spawn_error: Option<String>,
}

/// Shared-state fake runner; clones observe the same calls and process table.
#[derive(Debug, Clone)]
pub struct MockRunner {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                responses: HashMap::new(),
                alive: HashSet::new(),
                next_pid: 4000,
                spawn_error: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer `program <first_arg> ...` with `response`. Unmatched calls report NotFound.
    pub fn respond(&self, program: &str, first_arg: &str, response: MockResponse) {
        self.state()
            .responses
            .insert((program.to_string(), first_arg.to_string()), response);
    }

    /// Make the next detached spawns fail with an I/O error.
    pub fn set_spawn_error(&self, error: Option<String>) {
        self.state().spawn_error = error;
    }

    pub fn set_pid_alive(&self, pid: u32, alive: bool) {
        let mut state = self.state();
        if alive {
            state.alive.insert(pid);
        } else {
            state.alive.remove(&pid);
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Argument lists of every `run` of `program`.
    pub fn runs_of(&self, program: &str) -> Vec<Vec<String>> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Run { program: p, args } if p == program => Some(args.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn detached_spawns(&self) -> Vec<DetachedSpec> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::SpawnDetached(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        let mut state = self.state();
        state.calls.push(MockCall::Run {
            program: program.to_string(),
            args: args.to_vec(),
        });
        let key = (
            program.to_string(),
            args.first().cloned().unwrap_or_default(),
        );
        match state.responses.get(&key).cloned() {
            Some(MockResponse::Output(output)) => Ok(output),
            Some(MockResponse::TimedOut) => Err(RunError::TimedOut {
                program: program.to_string(),
                timeout,
            }),
            Some(MockResponse::NotFound) | None => Err(RunError::NotFound {
                program: program.to_string(),
            }),
        }
    }

    async fn spawn_detached(&self, spec: &DetachedSpec) -> Result<u32, RunError> {
        let mut state = self.state();
        state.calls.push(MockCall::SpawnDetached(spec.clone()));
        if let Some(message) = state.spawn_error.clone() {
            return Err(RunError::Io {
                program: spec.program.clone(),
                source: std::io::Error::other(message),
            });
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        state.alive.insert(pid);
        Ok(pid)
    }

    fn pid_alive(&self, pid: u32) -> bool {
        pid != 0 && self.state().alive.contains(&pid)
    }

    async fn terminate(&self, pid: u32) -> Result<(), RunError> {
        let mut state = self.state();
        state.calls.push(MockCall::Terminate(pid));
        state.alive.remove(&pid);
        Ok(())
    }
}
