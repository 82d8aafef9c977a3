//! Pipeline construction and execution.
//!
//! A pipeline is an ordered list of typed steps plus the remote environment
//! lookups its templates depend on. Running is three phases: resolve remote
//! lookups once, validate that every placeholder is bound, then execute in
//! order with fail-fast semantics. Directory scopes always unwind, even when
//! a nested step fails.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, ErrorCode, Result};
use crate::exec::Runner;
use crate::step::{
    Location, PipelineResult, PlannedCommand, Step, StepKind, StepResult, StepStatus,
};
use crate::utils::shell;
use crate::utils::template;

/// Parameter bindings for one run. Values added with [`Params::arg`] are
/// shell-quoted at insertion, so rendered commands are injection-safe;
/// [`Params::raw`] is for values that must reach the remote shell unquoted
/// (deliberate globs, pre-quoted fragments).
#[derive(Debug, Clone, Default)]
pub struct Params {
    vars: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, key: impl Into<String>, value: &str) -> Self {
        self.vars.insert(key.into(), shell::quote_arg(value));
        self
    }

    pub fn raw(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }
}

/// A parameter whose value only exists on the remote host: resolved by
/// evaluating an environment variable there, once per run.
#[derive(Debug, Clone)]
pub struct RemoteLookup {
    pub param: String,
    pub variable: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub step_timeout: Option<Duration>,
    /// Host label used in error details only.
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    pub lookups: Vec<RemoteLookup>,
    pub steps: Vec<Step>,
}

struct ExecutionContext {
    vars: HashMap<String, String>,
    dir_stack: Vec<String>,
    results: Vec<StepResult>,
}

impl ExecutionContext {
    fn new(vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            dir_stack: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Apply the open directory scopes to a rendered command.
    fn scoped(&self, command: &str) -> String {
        if self.dir_stack.is_empty() {
            return command.to_string();
        }
        let mut parts: Vec<String> = self
            .dir_stack
            .iter()
            .map(|dir| format!("cd {}", dir))
            .collect();
        parts.push(command.to_string());
        parts.join(" && ")
    }
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            lookups: Vec::new(),
            steps,
        }
    }

    pub fn lookup(mut self, param: impl Into<String>, variable: impl Into<String>) -> Self {
        self.lookups.push(RemoteLookup {
            param: param.into(),
            variable: variable.into(),
        });
        self
    }

    /// Execute the pipeline. Pre-execution failures (unresolvable remote
    /// environment, unbound placeholders) return `Err`; step outcomes,
    /// including fatal step failures, are reported in the result.
    pub fn run(
        &self,
        runner: &dyn Runner,
        params: Params,
        opts: &RunOptions,
    ) -> Result<PipelineResult> {
        let mut vars = params.vars;
        self.resolve_lookups(runner, &mut vars, opts)?;
        self.validate(&vars)?;

        let mut ctx = ExecutionContext::new(vars);
        self.execute_steps(&self.steps, runner, &mut ctx, opts);
        debug_assert!(ctx.dir_stack.is_empty());

        let failed_step = ctx
            .results
            .iter()
            .find(|r| matches!(r.status, StepStatus::Failed | StepStatus::TimedOut))
            .map(|r| r.step.clone());

        Ok(PipelineResult {
            pipeline: self.name.clone(),
            success: failed_step.is_none(),
            failed_step,
            steps: ctx.results,
        })
    }

    /// Render the ordered command list without executing anything. Remote
    /// lookups that have no explicit binding render as `"$VAR"` so the plan
    /// stays a faithful shell transcript.
    pub fn plan(&self, params: Params) -> Result<Vec<PlannedCommand>> {
        let mut vars = params.vars;
        for lookup in &self.lookups {
            vars.entry(lookup.param.clone())
                .or_insert_with(|| format!("\"${}\"", lookup.variable));
        }
        self.validate(&vars)?;

        let mut ctx = ExecutionContext::new(vars);
        let mut planned = Vec::new();
        plan_steps(&self.steps, &mut ctx, &mut planned);
        Ok(planned)
    }

    fn resolve_lookups(
        &self,
        runner: &dyn Runner,
        vars: &mut HashMap<String, String>,
        opts: &RunOptions,
    ) -> Result<()> {
        for lookup in &self.lookups {
            // An explicit binding (e.g. --project-dir) wins over the lookup.
            if vars.contains_key(&lookup.param) {
                continue;
            }

            let command = format!("printf '%s' \"${}\"", lookup.variable);
            let output = runner.remote(&command, opts.step_timeout);
            if !output.success {
                return Err(Error::new(
                    ErrorCode::RemoteCommandFailed,
                    format!("Failed to resolve ${} on the remote host", lookup.variable),
                    serde_json::json!({
                        "variable": lookup.variable,
                        "command": command,
                        "stderr": output.stderr,
                        "exitCode": output.exit_code,
                    }),
                ));
            }

            let value = output.stdout.trim().to_string();
            if value.is_empty() {
                return Err(Error::remote_env_unset(
                    lookup.variable.clone(),
                    opts.host.clone(),
                ));
            }

            log_status!("resolve", "${} = {}", lookup.variable, value);
            vars.insert(lookup.param.clone(), shell::quote_arg(&value));
        }
        Ok(())
    }

    /// Every placeholder in every template must be bound before anything
    /// executes; partial runs from typos would leave remote state half-updated.
    fn validate(&self, vars: &HashMap<String, String>) -> Result<()> {
        let mut missing = Vec::new();
        collect_unbound(&self.steps, vars, &mut missing);
        if missing.is_empty() {
            Ok(())
        } else {
            missing.dedup();
            Err(Error::template_missing_parameter(self.name.clone(), missing))
        }
    }

    /// Returns false when a fatal failure aborted the remaining steps.
    fn execute_steps(
        &self,
        steps: &[Step],
        runner: &dyn Runner,
        ctx: &mut ExecutionContext,
        opts: &RunOptions,
    ) -> bool {
        for step in steps {
            match &step.kind {
                StepKind::ChangeDirectory { dir, children } => {
                    let rendered = template::render_map(dir, &ctx.vars);
                    ctx.dir_stack.push(rendered);
                    let keep_going = self.execute_steps(children, runner, ctx, opts);
                    ctx.dir_stack.pop();
                    if !keep_going {
                        return false;
                    }
                }
                StepKind::LocalCommand { template } => {
                    if !self.execute_command(step, template, Location::Local, runner, ctx, opts) {
                        return false;
                    }
                }
                StepKind::RemoteCommand { template } => {
                    if !self.execute_command(step, template, Location::Remote, runner, ctx, opts) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn execute_command(
        &self,
        step: &Step,
        template: &str,
        location: Location,
        runner: &dyn Runner,
        ctx: &mut ExecutionContext,
        opts: &RunOptions,
    ) -> bool {
        let command = ctx.scoped(&template::render_map(template, &ctx.vars));

        log_status!(
            "run",
            "{}: {}",
            step.name,
            command
        );

        let output = match location {
            Location::Local => runner.local(&command, opts.step_timeout),
            Location::Remote => runner.remote(&command, opts.step_timeout),
        };

        let (status, note) = if output.success {
            (StepStatus::Succeeded, None)
        } else if step.best_effort {
            log_status!("run", "{} failed (non-critical)", step.name);
            (
                StepStatus::Noncritical,
                Some(format!("'{}' failed; continuing", step.name)),
            )
        } else if output.timed_out {
            (StepStatus::TimedOut, None)
        } else {
            (StepStatus::Failed, None)
        };

        let fatal = matches!(status, StepStatus::Failed | StepStatus::TimedOut);

        ctx.results.push(StepResult {
            step: step.name.clone(),
            location,
            command,
            status,
            class: step.class,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            note,
        });

        !fatal
    }
}

fn plan_steps(steps: &[Step], ctx: &mut ExecutionContext, out: &mut Vec<PlannedCommand>) {
    for step in steps {
        match &step.kind {
            StepKind::ChangeDirectory { dir, children } => {
                let rendered = template::render_map(dir, &ctx.vars);
                ctx.dir_stack.push(rendered);
                plan_steps(children, ctx, out);
                ctx.dir_stack.pop();
            }
            StepKind::LocalCommand { template } => out.push(PlannedCommand {
                step: step.name.clone(),
                location: Location::Local,
                command: ctx.scoped(&template::render_map(template, &ctx.vars)),
            }),
            StepKind::RemoteCommand { template } => out.push(PlannedCommand {
                step: step.name.clone(),
                location: Location::Remote,
                command: ctx.scoped(&template::render_map(template, &ctx.vars)),
            }),
        }
    }
}

fn collect_unbound(steps: &[Step], vars: &HashMap<String, String>, missing: &mut Vec<String>) {
    for step in steps {
        match &step.kind {
            StepKind::ChangeDirectory { dir, children } => {
                missing.extend(template::unbound(dir, vars));
                collect_unbound(children, vars, missing);
            }
            StepKind::LocalCommand { template } | StepKind::RemoteCommand { template } => {
                missing.extend(template::unbound(template, vars));
            }
        }
    }
}

/// Build the fatal error for a pipeline whose run failed, classified by the
/// failing step.
pub fn failure_error(result: &PipelineResult) -> Error {
    match result.first_failure() {
        Some(step) => Error::step_failed(
            step.class.error_code(step.status == StepStatus::TimedOut),
            crate::error::StepFailureDetails {
                pipeline: result.pipeline.clone(),
                step: step.step.clone(),
                command: step.command.clone(),
                exit_code: step.exit_code,
                stdout: step.stdout.clone(),
                stderr: step.stderr.clone(),
            },
        ),
        None => Error::internal_unexpected(format!(
            "Pipeline '{}' reported failure without a failing step",
            result.pipeline
        )),
    }
}
