//! Launch command construction per backend

use crate::schema::TeamMember;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;

/// Default bound on an agent run launched in a tmux pane
pub const SPAWN_TIMEOUT_SECS: u64 = 300;

/// Shell command run inside a new tmux pane.
///
/// `cd <cwd> && timeout <secs> <bin> run --agent <name> --model <model> --format json <prompt>`,
/// with every interpolated value shell-quoted. Fails only when a value
/// contains a NUL byte.
pub fn build_tmux_command(
    member: &TeamMember,
    binary: &Path,
    timeout_secs: u64,
) -> Result<String, shlex::QuoteError> {
    let binary = binary.to_string_lossy();
    let cd = shlex::try_quote(&member.cwd)?;
    let run = shlex::try_join([
        binary.as_ref(),
        "run",
        "--agent",
        member.name.as_str(),
        "--model",
        member.model.as_str(),
        "--format",
        "json",
        member.prompt.as_str(),
    ])?;
    Ok(format!("cd {cd} && timeout {timeout_secs} {run}"))
}

/// Argument vector for `tmux split-window` that prints the new pane id.
pub fn tmux_split_args(shell_command: &str) -> Vec<String> {
    vec![
        "split-window".to_string(),
        "-dP".to_string(),
        "-F".to_string(),
        "#{pane_id}".to_string(),
        shell_command.to_string(),
    ]
}

/// Quote for a PowerShell single-quoted string: only `'` needs doubling.
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// PowerShell script run in a scripted terminal window.
///
/// When `transcript` is given the session output is captured there so the
/// health monitor can fingerprint it.
pub fn build_windows_script(member: &TeamMember, binary: &Path, transcript: Option<&Path>) -> String {
    let mut lines = vec![
        "$ErrorActionPreference = 'Continue'".to_string(),
        format!("Set-Location -Path {}", ps_quote(&member.cwd)),
    ];
    if let Some(path) = transcript {
        lines.push(format!(
            "Start-Transcript -Path {} -Append | Out-Null",
            ps_quote(&path.to_string_lossy())
        ));
    }
    lines.push(format!(
        "Write-Host {} -ForegroundColor Cyan",
        ps_quote(&format!("OpenCode Agent: {}", member.name))
    ));
    lines.push(format!(
        "& {} run --agent {} --model {} --format json {}",
        ps_quote(&binary.to_string_lossy()),
        ps_quote(&member.name),
        ps_quote(&member.model),
        ps_quote(&member.prompt),
    ));
    lines.push("Write-Host ''".to_string());
    lines.push("Write-Host 'Agent exited. Press any key to close...'".to_string());
    lines.push("$null = $Host.UI.RawUI.ReadKey('NoEcho,IncludeKeyDown')".to_string());
    lines.join("\n")
}

/// Base64 of the UTF-16LE script, as `-EncodedCommand` expects.
pub fn encode_powershell(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    BASE64.encode(bytes)
}

/// Full argv for launching the scripted terminal.
pub fn build_windows_command(
    member: &TeamMember,
    binary: &Path,
    transcript: Option<&Path>,
) -> Vec<String> {
    let script = build_windows_script(member, binary, transcript);
    vec![
        "powershell.exe".to_string(),
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-EncodedCommand".to_string(),
        encode_powershell(&script),
    ]
}
