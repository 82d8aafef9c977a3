use clap::Args;

use beamline::{config, tasks};

use super::{CmdResult, PipelineOutput};

#[derive(Args)]
pub struct SubmitArgs {
    /// Run name under the runs directory
    pub run: String,

    /// Batch queue to submit to
    #[arg(short, long)]
    pub queue: String,

    /// Run config file inside the run directory
    #[arg(long, default_value = "config.cfg")]
    pub config: String,

    /// Print the rendered commands without executing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: SubmitArgs, _global: &super::GlobalArgs) -> CmdResult<PipelineOutput> {
    let config = config::load()?;

    let req = tasks::SubmitRequest {
        run: args.run,
        queue: args.queue,
        config_file: Some(args.config),
    };
    let (pipeline, params) = tasks::submit(&config, &req)?;

    super::execute_or_plan("submit", &config, pipeline, params, args.dry_run)
}
