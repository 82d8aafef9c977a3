use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{geometry, host, jobs, particles, push, rebuild, submit};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "beamline")]
#[command(version = VERSION)]
#[command(about = "CLI for deploying and driving remote particle-simulation runs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a run's config files, rebuild, generate, and submit to a queue
    Submit(submit::SubmitArgs),
    /// Check out a branch and rebuild the simulation on the remote host
    Rebuild(rebuild::RebuildArgs),
    /// Mirror a local run directory to the remote runs area
    Push(push::PushArgs),
    /// Generate initial particles for a run
    Particles(particles::ParticlesArgs),
    /// Build geometries from a run's macro files
    Geometry(geometry::GeometryArgs),
    /// List queued batch jobs (best-effort)
    Jobs(jobs::JobsArgs),
    /// Manage the simulation host configuration
    Host(host::HostArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
