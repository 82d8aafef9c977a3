//! Pipeline builders for each deployment task.
//!
//! Every task is a pure function from configuration + request to a
//! `(Pipeline, Params)` pair; nothing here touches the network, so the exact
//! command sequence of any task can be inspected with `Pipeline::plan`.
//! `execute` is the one place that wires a pipeline to the real SSH runner.

use std::time::Duration;

use crate::config::DeploymentConfig;
use crate::error::{Error, Result};
use crate::exec::ShellRunner;
use crate::pipeline::{Params, Pipeline, RunOptions};
use crate::ssh::{self, SshClient};
use crate::step::{FailureClass, PipelineResult, Step};
use crate::transfer;

// Remote collaborators, invoked as opaque commands.
const PARTICLE_GENERATOR: &str = "generate_ucn";
const MACRO_INTERPRETER: &str = "root -l -b -q";
const BATCH_CLIENT: &str = "batch_simulate";
const QUEUE_STATUS: &str = "qstat";

const DEFAULT_CONFIG_FILE: &str = "config.cfg";
const DEFAULT_GEOM_MACRO: &str = "*.C";
const DEFAULT_GIT_REMOTE: &str = "origin";

#[derive(Debug, Clone)]
pub struct RebuildRequest {
    pub branch: String,
    /// Explicit checkout path; default resolves the project-dir env var on
    /// the remote host.
    pub project_dir: Option<String>,
    pub git_remote: Option<String>,
    /// `make clean` before configuring. Opt-in: it is destructive and slow.
    pub clean: bool,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub run: String,
    pub queue: String,
    pub config_file: Option<String>,
}

pub fn rebuild(
    config: &DeploymentConfig,
    req: &RebuildRequest,
) -> Result<(Pipeline, Params)> {
    if req.branch.is_empty() {
        return Err(Error::validation_missing_argument(vec!["branch".to_string()]));
    }

    let mut params = Params::new()
        .arg("branch", &req.branch)
        .arg(
            "git_remote",
            req.git_remote.as_deref().unwrap_or(DEFAULT_GIT_REMOTE),
        );
    if let Some(dir) = &req.project_dir {
        params = params.arg("project_dir", dir);
    }

    let mut pipeline = Pipeline::new("rebuild", rebuild_steps(req.clean));
    if req.project_dir.is_none() {
        pipeline = pipeline.lookup("project_dir", &config.project_dir_var);
    }

    Ok((pipeline, params))
}

fn rebuild_steps(clean: bool) -> Vec<Step> {
    let mut build_steps = Vec::new();
    if clean {
        build_steps.push(
            Step::remote("clean build tree", "make clean").class(FailureClass::Build),
        );
    }
    build_steps.push(Step::remote("configure", "cmake ..").class(FailureClass::Build));
    build_steps.push(Step::remote("compile", "make").class(FailureClass::Build));

    vec![Step::cd(
        "enter project",
        "{{project_dir}}",
        vec![
            Step::remote("checkout branch", "git checkout {{branch}}")
                .class(FailureClass::SourceSync),
            Step::remote(
                "fast-forward pull",
                "git pull --ff-only {{git_remote}} {{branch}}",
            )
            .class(FailureClass::SourceSync),
            Step::cd("enter build tree", "build", build_steps),
        ],
    )]
}

pub fn push(config: &DeploymentConfig, run: &str) -> Result<(Pipeline, Params)> {
    validate_run_name(run)?;
    config.host.validate()?;

    let local_run_dir = format!("{}/{}", config.local_runs_dir()?, run);
    let params = Params::new()
        .arg("run", run)
        .arg("local_run_dir", &local_run_dir)
        .arg("host_spec", &config.host.spec())
        .arg(
            "rsync_rsh",
            &ssh::rsh_command(config.host.identity_file.as_deref(), config.host.port),
        );

    let pipeline =
        Pipeline::new("push", push_steps()).lookup("runs_dir", &config.runs_dir_var);
    Ok((pipeline, params))
}

fn push_steps() -> Vec<Step> {
    let mirror = [
        "rsync -az --delete",
        &transfer::rsync_filter_args(&transfer::run_filters()),
        "-e {{rsync_rsh}}",
        "{{local_run_dir}}/",
        "{{host_spec}}:{{runs_dir}}/{{run}}",
    ]
    .join(" ");

    vec![
        Step::remote("create remote run dir", "mkdir -p {{runs_dir}}/{{run}}")
            .class(FailureClass::Transfer),
        Step::local("mirror run files", mirror).class(FailureClass::Transfer),
    ]
}

pub fn particles(
    config: &DeploymentConfig,
    run: &str,
    config_file: Option<&str>,
    show_plots: bool,
) -> Result<(Pipeline, Params)> {
    validate_run_name(run)?;

    let params = Params::new()
        .arg("run", run)
        .arg("config", config_file.unwrap_or(DEFAULT_CONFIG_FILE))
        .arg("show_plots", if show_plots { "true" } else { "false" });

    let pipeline = Pipeline::new("particles", particle_steps())
        .lookup("runs_dir", &config.runs_dir_var);
    Ok((pipeline, params))
}

fn particle_steps() -> Vec<Step> {
    vec![Step::cd(
        "enter run dir",
        "{{runs_dir}}/{{run}}",
        vec![Step::remote(
            "generate particles",
            format!("{} {{{{config}}}} --plots={{{{show_plots}}}}", PARTICLE_GENERATOR),
        )],
    )]
}

pub fn geometry(
    config: &DeploymentConfig,
    run: &str,
    geom_macro: Option<&str>,
) -> Result<(Pipeline, Params)> {
    validate_run_name(run)?;

    // Raw binding: the default macro argument is a glob that must expand in
    // the remote run directory.
    let params = Params::new()
        .arg("run", run)
        .raw("geom_macro", geom_macro.unwrap_or(DEFAULT_GEOM_MACRO));

    let pipeline = Pipeline::new("geometry", geometry_steps())
        .lookup("runs_dir", &config.runs_dir_var);
    Ok((pipeline, params))
}

fn geometry_steps() -> Vec<Step> {
    vec![Step::cd(
        "enter run dir",
        "{{runs_dir}}/{{run}}",
        vec![Step::remote(
            "build geometries",
            format!("{} {{{{geom_macro}}}}", MACRO_INTERPRETER),
        )],
    )]
}

/// Full submission: mirror config files, rebuild the deploy branch, generate
/// particles, build geometries, then hand the run to the batch client.
pub fn submit(config: &DeploymentConfig, req: &SubmitRequest) -> Result<(Pipeline, Params)> {
    validate_run_name(&req.run)?;
    if req.queue.is_empty() {
        return Err(Error::validation_missing_argument(vec!["queue".to_string()]));
    }
    config.host.validate()?;

    let local_run_dir = format!("{}/{}", config.local_runs_dir()?, req.run);
    let params = Params::new()
        .arg("run", &req.run)
        .arg("queue", &req.queue)
        .arg("config", req.config_file.as_deref().unwrap_or(DEFAULT_CONFIG_FILE))
        .arg("show_plots", "false")
        .raw("geom_macro", DEFAULT_GEOM_MACRO)
        .arg("branch", &config.deploy_branch)
        .arg("git_remote", DEFAULT_GIT_REMOTE)
        .arg("local_run_dir", &local_run_dir)
        .arg("host_spec", &config.host.spec())
        .arg(
            "rsync_rsh",
            &ssh::rsh_command(config.host.identity_file.as_deref(), config.host.port),
        );

    let mut steps = push_steps();
    steps.extend(rebuild_steps(false));
    steps.extend(particle_steps());
    steps.extend(geometry_steps());
    steps.push(Step::cd(
        "enter run dir",
        "{{runs_dir}}/{{run}}",
        vec![Step::remote(
            "submit batch job",
            format!("{} -q {{{{queue}}}} {{{{config}}}}", BATCH_CLIENT),
        )],
    ));

    let pipeline = Pipeline::new("submit", steps)
        .lookup("runs_dir", &config.runs_dir_var)
        .lookup("project_dir", &config.project_dir_var);
    Ok((pipeline, params))
}

/// Queue listing. Best-effort by design: `qstat` exits non-zero when the
/// user has no jobs, and that must never read as a pipeline failure.
pub fn jobs(config: &DeploymentConfig, user: Option<&str>) -> Result<(Pipeline, Params)> {
    let user = match user {
        Some(u) => u.to_string(),
        None => config.batch_user(),
    };
    if user.is_empty() {
        return Err(Error::validation_missing_argument(vec!["user".to_string()]));
    }

    let params = Params::new().arg("job_user", &user);
    let steps = vec![Step::remote(
        "list queued jobs",
        format!("{} -u {{{{job_user}}}}", QUEUE_STATUS),
    )
    .best_effort()];

    Ok((Pipeline::new("jobs", steps), params))
}

/// Run a built pipeline against the configured host.
pub fn execute(
    config: &DeploymentConfig,
    pipeline: &Pipeline,
    params: Params,
) -> Result<PipelineResult> {
    let ssh = SshClient::from_host(&config.host)?;
    let runner = ShellRunner::new(ssh);
    let opts = RunOptions {
        step_timeout: config.step_timeout_secs.map(Duration::from_secs),
        host: config.host.host.clone(),
    };
    pipeline.run(&runner, params, &opts)
}

fn validate_run_name(run: &str) -> Result<()> {
    if run.is_empty() {
        return Err(Error::validation_missing_argument(vec![
            "path_to_run".to_string()
        ]));
    }
    if run.contains('/') || run.contains("..") {
        return Err(Error::validation_invalid_argument(
            "path_to_run",
            "Run name must be a plain directory name under the runs directory",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Location;

    fn test_config() -> DeploymentConfig {
        let mut config = DeploymentConfig::default();
        config.host.host = "feynman".to_string();
        config.host.user = "ucn".to_string();
        config.local_runs_dir = Some("/local/runs".to_string());
        config
    }

    fn planned_commands(pipeline: &Pipeline, params: Params) -> Vec<String> {
        pipeline
            .plan(params)
            .unwrap()
            .into_iter()
            .map(|p| p.command)
            .collect()
    }

    #[test]
    fn rebuild_without_clean_omits_make_clean() {
        let config = test_config();
        let req = RebuildRequest {
            branch: "deploy".to_string(),
            project_dir: None,
            git_remote: None,
            clean: false,
        };
        let (pipeline, params) = rebuild(&config, &req).unwrap();
        let commands = planned_commands(&pipeline, params);

        assert_eq!(
            commands,
            vec![
                "cd \"$UCN_DIR\" && git checkout deploy",
                "cd \"$UCN_DIR\" && git pull --ff-only origin deploy",
                "cd \"$UCN_DIR\" && cd build && cmake ..",
                "cd \"$UCN_DIR\" && cd build && make",
            ]
        );
    }

    #[test]
    fn rebuild_with_clean_precedes_configure() {
        let config = test_config();
        let req = RebuildRequest {
            branch: "deploy".to_string(),
            project_dir: None,
            git_remote: None,
            clean: true,
        };
        let (pipeline, params) = rebuild(&config, &req).unwrap();
        let commands = planned_commands(&pipeline, params);

        let clean_pos = commands.iter().position(|c| c.ends_with("make clean")).unwrap();
        let cmake_pos = commands.iter().position(|c| c.ends_with("cmake ..")).unwrap();
        assert!(clean_pos < cmake_pos);
    }

    #[test]
    fn rebuild_with_explicit_project_dir_skips_lookup() {
        let config = test_config();
        let req = RebuildRequest {
            branch: "deploy".to_string(),
            project_dir: Some("/opt/ucn".to_string()),
            git_remote: Some("upstream".to_string()),
            clean: false,
        };
        let (pipeline, params) = rebuild(&config, &req).unwrap();

        assert!(pipeline.lookups.is_empty());
        let commands = planned_commands(&pipeline, params);
        assert_eq!(commands[0], "cd /opt/ucn && git checkout deploy");
        assert_eq!(
            commands[1],
            "cd /opt/ucn && git pull --ff-only upstream deploy"
        );
    }

    #[test]
    fn push_mirrors_with_ordered_filters_and_delete() {
        let config = test_config();
        let (pipeline, params) = push(&config, "exp1").unwrap();
        let commands = planned_commands(&pipeline, params);

        assert_eq!(commands[0], "mkdir -p \"$UCN_RUNS\"/exp1");
        assert_eq!(
            commands[1],
            "rsync -az --delete --include='*.cfg' --include='*.C' --include='*.dta' \
             --include='*.txt' --exclude='*' -e ssh /local/runs/exp1/ \
             ucn@feynman:\"$UCN_RUNS\"/exp1"
        );
    }

    #[test]
    fn push_mirror_runs_locally() {
        let config = test_config();
        let (pipeline, params) = push(&config, "exp1").unwrap();
        let planned = pipeline.plan(params).unwrap();

        assert_eq!(planned[0].location, Location::Remote);
        assert_eq!(planned[1].location, Location::Local);
    }

    #[test]
    fn particles_runs_generator_in_run_dir() {
        let config = test_config();
        let (pipeline, params) = particles(&config, "exp1", None, false).unwrap();
        let commands = planned_commands(&pipeline, params);

        assert_eq!(
            commands,
            vec!["cd \"$UCN_RUNS\"/exp1 && generate_ucn config.cfg --plots=false"]
        );
    }

    #[test]
    fn geometry_macro_glob_stays_unquoted() {
        let config = test_config();
        let (pipeline, params) = geometry(&config, "exp1", None).unwrap();
        let commands = planned_commands(&pipeline, params);

        assert_eq!(commands, vec!["cd \"$UCN_RUNS\"/exp1 && root -l -b -q *.C"]);
    }

    #[test]
    fn submit_composes_full_sequence_in_order() {
        let config = test_config();
        let req = SubmitRequest {
            run: "exp1".to_string(),
            queue: "batch1".to_string(),
            config_file: None,
        };
        let (pipeline, params) = submit(&config, &req).unwrap();
        let commands = planned_commands(&pipeline, params);

        assert_eq!(
            commands,
            vec![
                "mkdir -p \"$UCN_RUNS\"/exp1".to_string(),
                "rsync -az --delete --include='*.cfg' --include='*.C' --include='*.dta' \
                 --include='*.txt' --exclude='*' -e ssh /local/runs/exp1/ \
                 ucn@feynman:\"$UCN_RUNS\"/exp1"
                    .to_string(),
                "cd \"$UCN_DIR\" && git checkout develop".to_string(),
                "cd \"$UCN_DIR\" && git pull --ff-only origin develop".to_string(),
                "cd \"$UCN_DIR\" && cd build && cmake ..".to_string(),
                "cd \"$UCN_DIR\" && cd build && make".to_string(),
                "cd \"$UCN_RUNS\"/exp1 && generate_ucn config.cfg --plots=false".to_string(),
                "cd \"$UCN_RUNS\"/exp1 && root -l -b -q *.C".to_string(),
                "cd \"$UCN_RUNS\"/exp1 && batch_simulate -q batch1 config.cfg".to_string(),
            ]
        );
    }

    #[test]
    fn jobs_is_best_effort() {
        let config = test_config();
        let (pipeline, params) = jobs(&config, None).unwrap();

        assert!(pipeline.steps[0].best_effort);
        let commands = planned_commands(&pipeline, params);
        assert_eq!(commands, vec!["qstat -u ucn"]);
    }

    #[test]
    fn jobs_explicit_user_overrides_config() {
        let config = test_config();
        let (pipeline, params) = jobs(&config, Some("mplitt")).unwrap();
        let commands = planned_commands(&pipeline, params);
        assert_eq!(commands, vec!["qstat -u mplitt"]);
    }

    #[test]
    fn run_names_cannot_escape_runs_dir() {
        let config = test_config();
        assert!(push(&config, "../etc").is_err());
        assert!(push(&config, "a/b").is_err());
        assert!(push(&config, "").is_err());
    }
}
