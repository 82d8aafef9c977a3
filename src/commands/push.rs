use clap::Args;

use beamline::{config, tasks};

use super::{CmdResult, PipelineOutput};

#[derive(Args)]
pub struct PushArgs {
    /// Run name under the runs directory
    pub run: String,

    /// Print the rendered commands without executing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: PushArgs, _global: &super::GlobalArgs) -> CmdResult<PipelineOutput> {
    let config = config::load()?;
    let (pipeline, params) = tasks::push(&config, &args.run)?;
    super::execute_or_plan("push", &config, pipeline, params, args.dry_run)
}
