use clap::Args;

use beamline::{config, tasks};

use super::{CmdResult, PipelineOutput};

#[derive(Args)]
pub struct GeometryArgs {
    /// Run name under the runs directory
    pub run: String,

    /// Geometry macro to interpret; globs expand in the remote run dir
    #[arg(long = "macro", default_value = "*.C")]
    pub geom_macro: String,

    /// Print the rendered commands without executing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: GeometryArgs, _global: &super::GlobalArgs) -> CmdResult<PipelineOutput> {
    let config = config::load()?;
    let (pipeline, params) = tasks::geometry(&config, &args.run, Some(&args.geom_macro))?;
    super::execute_or_plan("geometry", &config, pipeline, params, args.dry_run)
}
