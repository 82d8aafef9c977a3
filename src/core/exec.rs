//! Command execution primitives.
//!
//! Every external command, local or remote, funnels through the [`Runner`]
//! trait so pipeline logic never touches `std::process` directly and tests
//! can substitute a scripted runner.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::ssh::SshClient;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            success: false,
            exit_code: -1,
            timed_out: false,
        }
    }

    /// Error text for reporting: stderr, falling back to stdout.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            stderr.to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }
}

/// Executes rendered commands on one side or the other.
pub trait Runner {
    fn local(&self, command: &str, timeout: Option<Duration>) -> CommandOutput;
    fn remote(&self, command: &str, timeout: Option<Duration>) -> CommandOutput;
}

/// Production runner: local commands through `sh -c`, remote commands through
/// the SSH client.
pub struct ShellRunner {
    ssh: SshClient,
}

impl ShellRunner {
    pub fn new(ssh: SshClient) -> Self {
        Self { ssh }
    }
}

impl Runner for ShellRunner {
    fn local(&self, command: &str, timeout: Option<Duration>) -> CommandOutput {
        execute_local_command(command, timeout)
    }

    fn remote(&self, command: &str, timeout: Option<Duration>) -> CommandOutput {
        self.ssh.execute(command, timeout)
    }
}

pub fn execute_local_command(command: &str, timeout: Option<Duration>) -> CommandOutput {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    run_command(cmd, timeout)
}

/// Run a prepared command, capturing output, killing it if it outlives the
/// timeout. `make` and queue submissions can legitimately run for a long
/// time, so the default is to wait forever.
pub fn run_command(mut cmd: Command, timeout: Option<Duration>) -> CommandOutput {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return CommandOutput::error(format!("Command error: {}", e)),
    };

    wait_with_timeout(child, timeout)
}

fn wait_with_timeout(mut child: Child, timeout: Option<Duration>) -> CommandOutput {
    let stdout_handle = child.stdout.take().map(spawn_reader);
    let stderr_handle = child.stderr.take().map(spawn_reader);

    let deadline = timeout.map(|t| Instant::now() + t);
    let mut timed_out = false;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        timed_out = true;
                        let _ = child.kill();
                        break child.wait().ok();
                    }
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(_) => break None,
        }
    };

    let stdout = join_reader(stdout_handle);
    let stderr = join_reader(stderr_handle);

    match status {
        Some(status) => CommandOutput {
            stdout,
            stderr,
            success: status.success() && !timed_out,
            exit_code: status.code().unwrap_or(-1),
            timed_out,
        },
        None => CommandOutput {
            stdout,
            stderr: if stderr.is_empty() {
                "Failed to wait for command".to_string()
            } else {
                stderr
            },
            success: false,
            exit_code: -1,
            timed_out,
        },
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn join_reader(handle: Option<std::thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit() {
        let out = execute_local_command("echo hello", None);
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
        assert!(!out.timed_out);
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let out = execute_local_command("exit 3", None);
        assert!(!out.success);
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn error_text_prefers_stderr() {
        let out = execute_local_command("echo out; echo err >&2; exit 1", None);
        assert_eq!(out.error_text(), "err");
    }

    #[test]
    fn timeout_kills_long_command() {
        let out = execute_local_command("sleep 5", Some(Duration::from_millis(200)));
        assert!(!out.success);
        assert!(out.timed_out);
    }
}
