//! Shell command tool
//!
//! Commands run through `sh -c` in the workspace root with a wall-clock
//! timeout. A denylist of destructive patterns is checked before anything is
//! spawned.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use regex::{Regex, RegexSet};
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{required_str, truncate_output, Tool};
use crate::error::ToolError;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_OUTPUT_CHARS: usize = 20_000;

lazy_static! {
    // Matched against each lowercased pipeline segment
    static ref DENYLIST: RegexSet = RegexSet::new([
        // rm -rf, rm -fr, rm -Rvf ...
        r"\brm\s+(?:\S+\s+)*-[a-z]*r[a-z]*f",
        r"\brm\s+(?:\S+\s+)*-[a-z]*f[a-z]*r",
        // rm -r -f / rm --recursive --force in any order
        r"\brm\s+.*(?:-[a-z]*r\b|--recursive).*(?:-[a-z]*f\b|--force)",
        r"\brm\s+.*(?:-[a-z]*f\b|--force).*(?:-[a-z]*r\b|--recursive)",
        r"\bmkfs(?:\.\w+)?\b",
        r"\bdd\s+.*\bof=/dev/",
        r">\s*/dev/(?:sd|hd|vd|nvme|xvd)",
        r"\b(?:shutdown|reboot|halt|poweroff)\b",
        r"\bchmod\s+(?:\S+\s+)*-r\s+777\s+/(?:\s|$)",
        r"\bchown\s+(?:\S+\s+)*-r\s+\S+\s+/(?:\s|$)",
    ])
    .expect("denylist patterns are valid");

    // Spans separators, so it is matched against the whole command
    static ref FORK_BOMB: Regex =
        Regex::new(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:").expect("fork bomb pattern is valid");
}

/// Whether `command` matches a destructive pattern
///
/// Patterns are checked per segment, split on `;`, `&`, `|` and newlines, so
/// flags from one command never combine with another command's name.
pub fn is_blocked(command: &str) -> bool {
    let command = command.to_lowercase();
    FORK_BOMB.is_match(&command)
        || command
            .split(|c: char| matches!(c, ';' | '&' | '|' | '\n'))
            .any(|segment| DENYLIST.is_match(segment))
}

/// Kills a command's process group when dropped
struct ProcessGroup(Pid);

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        // ESRCH when every member already exited
        if let Err(e) = killpg(self.0, Signal::SIGKILL) {
            debug!(pgid = self.0.as_raw(), error = %e, "Process group already gone");
        }
    }
}

/// Run a shell command
pub struct RunCommand {
    root: PathBuf,
}

impl RunCommand {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace directory and return its exit code, stdout and stderr"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 60)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let command = required_str(&args, "command")?;
        let timeout_secs = args
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS);

        if is_blocked(command) {
            warn!(command, "Refusing destructive command");
            return Err(ToolError::Blocked(command.to_string()));
        }

        info!(command, timeout_secs, "Executing command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own group, so pipelines and background jobs die with the shell
            .process_group(0)
            .kill_on_drop(true)
            .spawn()?;

        // Dropped on every exit path: completion, timeout, or the caller
        // abandoning this future on Ctrl-C
        let _group = child.id().map(|id| ProcessGroup(Pid::from_raw(id as i32)));

        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout(timeout_secs))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str("--- stdout ---\n");
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() && !result.ends_with('\n') {
                result.push('\n');
            }
            result.push_str("--- stderr ---\n");
            result.push_str(&stderr);
        }
        let result = truncate_output(&result, MAX_OUTPUT_CHARS);

        match output.status.code() {
            Some(0) => Ok(format!("Exit code: 0\n{}", result)),
            code => Err(ToolError::CommandFailed {
                code: code.unwrap_or(-1),
                output: result,
            }),
        }
    }
}
