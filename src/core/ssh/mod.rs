mod client;

pub use client::{is_local_host, rsh_command, SshClient};
