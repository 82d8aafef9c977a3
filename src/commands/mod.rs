use serde::Serialize;

use beamline::config::DeploymentConfig;
use beamline::pipeline::{self, Params, Pipeline};
use beamline::step::{PlannedCommand, StepResult};
use beamline::tasks;

pub type CmdResult<T> = beamline::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod geometry;
pub mod host;
pub mod jobs;
pub mod particles;
pub mod push;
pub mod rebuild;
pub mod submit;

/// Shared output shape for the pipeline-backed commands.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub command: String,
    pub pipeline: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<PlannedCommand>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepResult>,
}

/// Plan under `--dry-run`, otherwise execute against the configured host.
/// A failed run surfaces as the failing step's classified error.
pub(crate) fn execute_or_plan(
    command: &str,
    config: &DeploymentConfig,
    pipeline: Pipeline,
    params: Params,
    dry_run: bool,
) -> CmdResult<PipelineOutput> {
    if dry_run {
        let planned = pipeline.plan(params)?;
        return Ok((
            PipelineOutput {
                command: command.to_string(),
                pipeline: pipeline.name,
                dry_run: true,
                planned,
                steps: Vec::new(),
            },
            0,
        ));
    }

    let result = tasks::execute(config, &pipeline, params)?;
    if !result.success {
        return Err(pipeline::failure_error(&result));
    }

    Ok((
        PipelineOutput {
            command: command.to_string(),
            pipeline: result.pipeline,
            dry_run: false,
            planned: Vec::new(),
            steps: result.steps,
        },
        0,
    ))
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (beamline::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Submit(args) => dispatch!(args, global, submit),
        crate::Commands::Rebuild(args) => dispatch!(args, global, rebuild),
        crate::Commands::Push(args) => dispatch!(args, global, push),
        crate::Commands::Particles(args) => dispatch!(args, global, particles),
        crate::Commands::Geometry(args) => dispatch!(args, global, geometry),
        crate::Commands::Jobs(args) => dispatch!(args, global, jobs),
        crate::Commands::Host(args) => dispatch!(args, global, host),
    }
}
