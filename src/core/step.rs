//! Typed pipeline steps.
//!
//! A step is a local command, a remote command, or a directory scope wrapping
//! nested steps. Templates carry `{{name}}` placeholders bound at run time;
//! steps themselves are immutable once built.

use serde::Serialize;

use crate::error::ErrorCode;

#[derive(Debug, Clone)]
pub enum StepKind {
    LocalCommand { template: String },
    RemoteCommand { template: String },
    ChangeDirectory { dir: String, children: Vec<Step> },
}

/// Which error a failure of this step maps to. Distinguishes "code didn't
/// update" from "code didn't compile" from "files didn't copy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    SourceSync,
    Build,
    Transfer,
    Command,
}

impl FailureClass {
    pub fn error_code(&self, timed_out: bool) -> ErrorCode {
        if timed_out {
            return ErrorCode::RemoteCommandTimeout;
        }
        match self {
            FailureClass::SourceSync => ErrorCode::SourceSyncFailed,
            FailureClass::Build => ErrorCode::BuildFailed,
            FailureClass::Transfer => ErrorCode::TransferFailed,
            FailureClass::Command => ErrorCode::RemoteCommandFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
    pub class: FailureClass,
    /// Failure is logged and reported, never fatal. Used for diagnostics
    /// like queue listings where a non-zero exit is benign.
    pub best_effort: bool,
}

impl Step {
    pub fn local(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::LocalCommand {
                template: template.into(),
            },
            class: FailureClass::Command,
            best_effort: false,
        }
    }

    pub fn remote(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::RemoteCommand {
                template: template.into(),
            },
            class: FailureClass::Command,
            best_effort: false,
        }
    }

    pub fn cd(name: impl Into<String>, dir: impl Into<String>, children: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::ChangeDirectory {
                dir: dir.into(),
                children,
            },
            class: FailureClass::Command,
            best_effort: false,
        }
    }

    pub fn class(mut self, class: FailureClass) -> Self {
        self.class = class;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    TimedOut,
    /// Best-effort step failed; recorded for information only.
    Noncritical,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step: String,
    pub location: Location,
    pub command: String,
    pub status: StepStatus,
    pub class: FailureClass,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One rendered command from a dry-run plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedCommand {
    pub step: String,
    pub location: Location,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub pipeline: String,
    pub steps: Vec<StepResult>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
}

impl PipelineResult {
    /// The first fatally failed step, if any.
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|s| matches!(s.status, StepStatus::Failed | StepStatus::TimedOut))
    }
}
