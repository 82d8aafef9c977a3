use std::process::Command;
use std::time::Duration;

use crate::config::Host;
use crate::error::{Error, Result};
use crate::exec::{self, CommandOutput};

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the host is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

impl SshClient {
    pub fn from_host(host: &Host) -> Result<Self> {
        host.validate()?;

        let identity_file = match &host.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        host.host.clone(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&host.host);
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", host.host);
        }

        Ok(Self {
            host: host.host.clone(),
            user: host.user.clone(),
            port: host.port,
            identity_file,
            is_local,
        })
    }

    /// Extra options for tools that spawn their own ssh (rsync -e).
    pub fn rsh_command(&self) -> String {
        rsh_command(self.identity_file.as_deref(), self.port)
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Timeout and keepalive options to prevent hangs on stalled
        // connections or unexpected prompts.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    pub fn execute(&self, command: &str, timeout: Option<Duration>) -> CommandOutput {
        self.execute_with_retry(command, timeout, 3)
    }

    fn execute_with_retry(
        &self,
        command: &str,
        timeout: Option<Duration>,
        max_attempts: u32,
    ) -> CommandOutput {
        let backoff_secs = [0, 2, 5]; // delays before retry 1, 2, 3

        for attempt in 0..max_attempts {
            let result = self.execute_once(command, timeout);

            // Only retry on transient connection errors. Remote command
            // failures and timeouts are never retried: checkouts, deletions
            // and job submissions are too state-changing to re-run blindly.
            if result.success
                || result.timed_out
                || attempt + 1 >= max_attempts
                || !is_transient_ssh_error(&result)
            {
                return result;
            }

            let delay = backoff_secs.get(attempt as usize + 1).copied().unwrap_or(5);
            log_status!(
                "ssh",
                "Connection failed (attempt {}/{}), retrying in {}s...",
                attempt + 1,
                max_attempts,
                delay
            );
            std::thread::sleep(Duration::from_secs(delay));
        }

        // Unreachable, but satisfy the compiler
        CommandOutput::error("SSH retry exhausted")
    }

    fn execute_once(&self, command: &str, timeout: Option<Duration>) -> CommandOutput {
        // Local execution: run command directly instead of over SSH
        if self.is_local {
            return exec::execute_local_command(command, timeout);
        }

        let args = self.build_ssh_args(command);
        let mut cmd = Command::new("ssh");
        cmd.args(&args);
        exec::run_command(cmd, timeout)
    }
}

/// The `ssh` invocation for tools that spawn their own transport (rsync -e).
pub fn rsh_command(identity_file: Option<&str>, port: u16) -> String {
    let mut parts = vec!["ssh".to_string()];
    if let Some(identity_file) = identity_file {
        parts.push("-i".to_string());
        parts.push(shellexpand::tilde(identity_file).to_string());
    }
    if port != 22 {
        parts.push("-p".to_string());
        parts.push(port.to_string());
    }
    parts.join(" ")
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Check if an SSH failure is a transient connection error worth retrying.
fn is_transient_ssh_error(output: &CommandOutput) -> bool {
    let stderr = output.stderr.to_lowercase();
    // SSH exit code 255 = connection error (not a remote command failure)
    let is_connection_exit = output.exit_code == 255;

    let transient_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "temporary failure in name resolution",
        "could not resolve hostname",
        "broken pipe",
        "ssh_exchange_identification",
        "connection closed by remote host",
    ];

    is_connection_exit || transient_patterns.iter().any(|p| stderr.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_hosts_detected() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(!is_local_host("feynman"));
    }

    #[test]
    fn rsh_command_includes_port_and_identity() {
        let client = SshClient {
            host: "feynman".to_string(),
            user: "ucn".to_string(),
            port: 2222,
            identity_file: Some("/keys/id_rsa".to_string()),
            is_local: false,
        };
        assert_eq!(client.rsh_command(), "ssh -i /keys/id_rsa -p 2222");
    }

    #[test]
    fn rsh_command_default_port_omitted() {
        let client = SshClient {
            host: "feynman".to_string(),
            user: "ucn".to_string(),
            port: 22,
            identity_file: None,
            is_local: false,
        };
        assert_eq!(client.rsh_command(), "ssh");
    }

    #[test]
    fn exit_255_is_transient() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            success: false,
            exit_code: 255,
            timed_out: false,
        };
        assert!(is_transient_ssh_error(&output));
    }

    #[test]
    fn remote_command_failure_is_not_transient() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "make: *** [all] Error 2".to_string(),
            success: false,
            exit_code: 2,
            timed_out: false,
        };
        assert!(!is_transient_ssh_error(&output));
    }
}
