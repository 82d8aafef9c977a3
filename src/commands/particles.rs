use clap::Args;

use beamline::{config, tasks};

use super::{CmdResult, PipelineOutput};

#[derive(Args)]
pub struct ParticlesArgs {
    /// Run name under the runs directory
    pub run: String,

    /// Run config file inside the run directory
    #[arg(long, default_value = "config.cfg")]
    pub config: String,

    /// Ask the generator to display its initial-state plots
    #[arg(long)]
    pub show_plots: bool,

    /// Print the rendered commands without executing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: ParticlesArgs, _global: &super::GlobalArgs) -> CmdResult<PipelineOutput> {
    let config = config::load()?;
    let (pipeline, params) =
        tasks::particles(&config, &args.run, Some(&args.config), args.show_plots)?;
    super::execute_or_plan("particles", &config, pipeline, params, args.dry_run)
}
