use clap::Args;
use serde::Serialize;

use beamline::step::StepStatus;
use beamline::{config, tasks};

use super::CmdResult;

#[derive(Args)]
pub struct JobsArgs {
    /// Queue user to list jobs for (default: configured batch user)
    #[arg(short, long)]
    pub user: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsOutput {
    pub command: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn run(args: JobsArgs, _global: &super::GlobalArgs) -> CmdResult<JobsOutput> {
    let config = config::load()?;
    let user = args.user.clone().unwrap_or_else(|| config.batch_user());

    let (pipeline, params) = tasks::jobs(&config, args.user.as_deref())?;
    let result = tasks::execute(&config, &pipeline, params)?;

    // The status query is best-effort: qstat exits non-zero when the user
    // has no jobs, and the pipeline reports that as a non-critical result.
    let step = result.steps.first();
    let (listing, message) = match step {
        Some(step) if step.status == StepStatus::Succeeded => {
            (Some(step.stdout.clone()), None)
        }
        _ => (None, Some(format!("No jobs listed for {}", user))),
    };

    Ok((
        JobsOutput {
            command: "jobs".to_string(),
            user,
            listing,
            message,
        },
        0,
    ))
}
