// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! External tool invocation boundary

use crate::error::{FirmwareError, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Captured result of an external tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: i32,
    pub stdout: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Narrow capability seam for the shell commands the manager delegates to
/// (version query, index refresh, flashing, factory reset, reboot). The
/// contract is the platform one: exit code 0 means success.
pub trait ExternalTool: Send + Sync {
    fn run(&self, command: &str) -> Result<ToolOutput>;
}

/// Production implementation: runs the command through `sh -c`, blocking the
/// caller until it exits or the bounded timeout expires. Stdout is read only
/// after exit; the tools driven here emit at most a few lines.
#[derive(Debug)]
pub struct ShellTool {
    timeout: Duration,
}

impl ShellTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ExternalTool for ShellTool {
    fn run(&self, command: &str) -> Result<ToolOutput> {
        tracing::debug!("Running external tool: {command}");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FirmwareError::Tool(format!("failed to spawn {command:?}: {e}")))?;

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let mut stdout = String::new();
                    if let Some(mut out) = child.stdout.take() {
                        let _ = out.read_to_string(&mut stdout);
                    }
                    let status = status.code().unwrap_or(-1);
                    tracing::debug!("Tool exited with status {status}: {command}");
                    return Ok(ToolOutput { status, stdout });
                }
                Ok(None) => {
                    if start.elapsed() >= self.timeout {
                        tracing::warn!(
                            "Tool did not finish within {}s, killing: {command}",
                            self.timeout.as_secs()
                        );
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(FirmwareError::Tool(format!(
                            "timed out after {}s: {command}",
                            self.timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(FirmwareError::Tool(format!(
                        "error waiting for {command:?}: {e}"
                    )));
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_tool_captures_stdout() {
        let tool = ShellTool::new(Duration::from_secs(5));
        let output = tool.run("printf 'hello world'").unwrap();
        assert_eq!(output.status, 0);
        assert!(output.success());
        assert_eq!(output.stdout, "hello world");
    }

    #[test]
    fn test_shell_tool_nonzero_exit() {
        let tool = ShellTool::new(Duration::from_secs(5));
        let output = tool.run("exit 3").unwrap();
        assert_eq!(output.status, 3);
        assert!(!output.success());
    }

    #[test]
    fn test_shell_tool_timeout_kills() {
        let tool = ShellTool::new(Duration::from_millis(200));
        let result = tool.run("sleep 10");
        assert!(matches!(result, Err(FirmwareError::Tool(_))));
    }
}
