//! Deployment configuration.
//!
//! An explicit `DeploymentConfig` value is loaded once and passed into every
//! pipeline build; nothing reads process-wide mutable state. The file lives
//! at `~/.config/beamline/beamline.json` unless `BEAMLINE_CONFIG` points
//! somewhere else.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl Default for Host {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            port: default_port(),
            identity_file: None,
        }
    }
}

impl Host {
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.host.is_empty() {
            missing.push("host".to_string());
        }
        if self.user.is_empty() {
            missing.push("user".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ssh_host_invalid(self.host.clone(), missing))
        }
    }

    /// `user@host` spec as used by rsync/scp destinations.
    pub fn spec(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    #[serde(default)]
    pub host: Host,

    /// Remote env var naming the simulation source checkout.
    #[serde(default = "default_project_dir_var")]
    pub project_dir_var: String,

    /// Env var naming the runs directory. Resolved independently on each
    /// side: locally for the transfer source, remotely for the destination.
    #[serde(default = "default_runs_dir_var")]
    pub runs_dir_var: String,

    /// Overrides local resolution of `runs_dir_var` when set.
    #[serde(default)]
    pub local_runs_dir: Option<String>,

    /// Branch `submit` rebuilds from.
    #[serde(default = "default_deploy_branch")]
    pub deploy_branch: String,

    /// Username for queue listings. Falls back to the SSH user.
    #[serde(default)]
    pub batch_user: Option<String>,

    /// Kill any single step running longer than this. None = wait forever.
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
}

fn default_project_dir_var() -> String {
    "UCN_DIR".to_string()
}

fn default_runs_dir_var() -> String {
    "UCN_RUNS".to_string()
}

fn default_deploy_branch() -> String {
    "develop".to_string()
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            host: Host::default(),
            project_dir_var: default_project_dir_var(),
            runs_dir_var: default_runs_dir_var(),
            local_runs_dir: None,
            deploy_branch: default_deploy_branch(),
            batch_user: None,
            step_timeout_secs: None,
        }
    }
}

impl DeploymentConfig {
    /// Local runs directory: explicit override first, then the local value of
    /// the runs-dir env var.
    pub fn local_runs_dir(&self) -> Result<String> {
        if let Some(dir) = &self.local_runs_dir {
            return Ok(shellexpand::tilde(dir).to_string());
        }
        match env::var(&self.runs_dir_var) {
            Ok(dir) if !dir.is_empty() => Ok(shellexpand::tilde(&dir).to_string()),
            _ => Err(Error::config_missing_key(self.runs_dir_var.clone(), None)
                .with_hint(format!(
                    "Export {} locally or set localRunsDir in the config file",
                    self.runs_dir_var
                ))),
        }
    }

    pub fn batch_user(&self) -> String {
        self.batch_user
            .clone()
            .unwrap_or_else(|| self.host.user.clone())
    }
}

/// Config file path: `$BEAMLINE_CONFIG` or `~/.config/beamline/beamline.json`.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("BEAMLINE_CONFIG") {
        if !path.is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
        }
    }

    let home = env::var("HOME").map_err(|_| {
        Error::internal_unexpected("HOME environment variable not set".to_string())
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("beamline")
        .join("beamline.json"))
}

pub fn load() -> Result<DeploymentConfig> {
    load_from(&config_path()?)
}

pub fn load_from(path: &PathBuf) -> Result<DeploymentConfig> {
    if !path.exists() {
        return Ok(DeploymentConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

pub fn save(config: &DeploymentConfig) -> Result<()> {
    save_to(config, &config_path()?)
}

pub fn save_to(config: &DeploymentConfig, path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
        })?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize config".to_string())))?;

    std::fs::write(path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_simulation_layout() {
        let config = DeploymentConfig::default();
        assert_eq!(config.project_dir_var, "UCN_DIR");
        assert_eq!(config.runs_dir_var, "UCN_RUNS");
        assert_eq!(config.deploy_branch, "develop");
        assert_eq!(config.host.port, 22);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beamline.json");

        let mut config = DeploymentConfig::default();
        config.host.host = "feynman".to_string();
        config.host.user = "ucn".to_string();
        config.batch_user = Some("ucnbatch".to_string());

        save_to(&config, &path).unwrap();
        let loaded = load_from(&path).unwrap();

        assert_eq!(loaded.host.host, "feynman");
        assert_eq!(loaded.host.user, "ucn");
        assert_eq!(loaded.batch_user(), "ucnbatch");
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = load_from(&path).unwrap();
        assert!(config.host.host.is_empty());
    }

    #[test]
    fn batch_user_falls_back_to_ssh_user() {
        let mut config = DeploymentConfig::default();
        config.host.user = "ucn".to_string();
        assert_eq!(config.batch_user(), "ucn");
    }

    #[test]
    fn invalid_host_lists_missing_fields() {
        let host = Host::default();
        let err = host.validate().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::SshHostInvalid);
    }
}
