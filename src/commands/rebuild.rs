use clap::Args;

use beamline::{config, tasks};

use super::{CmdResult, PipelineOutput};

#[derive(Args)]
pub struct RebuildArgs {
    /// Branch to check out and fast-forward
    pub branch: String,

    /// Remote checkout path (default: the project-dir env var on the host)
    #[arg(long)]
    pub project_dir: Option<String>,

    /// Git remote to pull from
    #[arg(long, default_value = "origin")]
    pub git_remote: String,

    /// Run `make clean` before configuring (destructive, slow)
    #[arg(long)]
    pub clean: bool,

    /// Print the rendered commands without executing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: RebuildArgs, _global: &super::GlobalArgs) -> CmdResult<PipelineOutput> {
    let config = config::load()?;

    let req = tasks::RebuildRequest {
        branch: args.branch,
        project_dir: args.project_dir,
        git_remote: Some(args.git_remote),
        clean: args.clean,
    };
    let (pipeline, params) = tasks::rebuild(&config, &req)?;

    super::execute_or_plan("rebuild", &config, pipeline, params, args.dry_run)
}
