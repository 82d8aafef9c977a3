use clap::{Args, Subcommand};
use serde::Serialize;

use beamline::config::{self, Host};

use super::CmdResult;

#[derive(Args)]
pub struct HostArgs {
    #[command(subcommand)]
    pub subcommand: HostSubcommand,
}

#[derive(Subcommand)]
pub enum HostSubcommand {
    /// Show the configured simulation host
    Show,
    /// Update the simulation host configuration
    Set {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        identity_file: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostOutput {
    pub command: String,
    pub host: Host,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updated_fields: Vec<String>,
}

pub fn run(args: HostArgs, _global: &super::GlobalArgs) -> CmdResult<HostOutput> {
    match args.subcommand {
        HostSubcommand::Show => {
            let config = config::load()?;
            Ok((
                HostOutput {
                    command: "host.show".to_string(),
                    host: config.host,
                    updated_fields: Vec::new(),
                },
                0,
            ))
        }
        HostSubcommand::Set {
            host,
            user,
            port,
            identity_file,
        } => {
            let mut config = config::load()?;
            let mut updated = Vec::new();

            if let Some(host) = host {
                config.host.host = host;
                updated.push("host".to_string());
            }
            if let Some(user) = user {
                config.host.user = user;
                updated.push("user".to_string());
            }
            if let Some(port) = port {
                config.host.port = port;
                updated.push("port".to_string());
            }
            if let Some(identity_file) = identity_file {
                config.host.identity_file = if identity_file.is_empty() {
                    None
                } else {
                    Some(identity_file)
                };
                updated.push("identityFile".to_string());
            }

            if updated.is_empty() {
                return Err(beamline::Error::validation_missing_argument(vec![
                    "host".to_string(),
                    "user".to_string(),
                    "port".to_string(),
                    "identity_file".to_string(),
                ]));
            }

            config::save(&config)?;

            Ok((
                HostOutput {
                    command: "host.set".to_string(),
                    host: config.host,
                    updated_fields: updated,
                },
                0,
            ))
        }
    }
}
