//! IaC tool invocation
//!
//! The orchestrator only sees [`IacExecutor`]; [`TerraformCli`] is the
//! subprocess implementation.

use crate::error::{ProvisionError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use skyforge_cloud::CredentialEnv;
use skyforge_core::OutputMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Marker whose presence in a step's output means the step failed
pub const ERROR_MARKER: &str = "Error";

pub const PLAN_FILE: &str = "tfplan";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Init,
    Plan,
    /// Apply, consuming the saved plan when one was produced
    Apply { saved_plan: bool },
    Destroy,
    Output,
}

impl Step {
    /// Log section header label
    pub fn label(&self) -> &'static str {
        match self {
            Step::Init => "INIT",
            Step::Plan => "PLAN",
            Step::Apply { .. } => "APPLY",
            Step::Destroy => "DESTROY",
            Step::Output => "OUTPUT",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::Init => "init",
            Step::Plan => "plan",
            Step::Apply { .. } => "apply",
            Step::Destroy => "destroy",
            Step::Output => "output",
        }
    }

    pub fn args(&self) -> Vec<&'static str> {
        match self {
            Step::Init => vec!["init", "-input=false", "-no-color"],
            Step::Plan => vec!["plan", "-input=false", "-no-color", "-out=tfplan"],
            Step::Apply { saved_plan: true } => {
                vec!["apply", "-input=false", "-no-color", "-auto-approve", PLAN_FILE]
            }
            Step::Apply { saved_plan: false } => {
                vec!["apply", "-input=false", "-no-color", "-auto-approve"]
            }
            Step::Destroy => vec!["destroy", "-input=false", "-no-color", "-auto-approve"],
            Step::Output => vec!["output", "-no-color", "-json"],
        }
    }
}

/// Captured result of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// stdout followed by stderr, verbatim
    pub text: String,
    pub exit_ok: bool,
}

impl StepOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_ok: true,
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_ok: false,
        }
    }

    pub fn failed(&self) -> bool {
        !self.exit_ok || self.text.contains(ERROR_MARKER)
    }
}

/// Runs IaC tool steps inside a workspace
#[async_trait]
pub trait IacExecutor: Send + Sync {
    async fn run(&self, step: Step, workspace: &Path, env: &CredentialEnv) -> Result<StepOutput>;
}

/// `terraform` (or a compatible binary) as a subprocess
#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: String,
    timeout: Option<Duration>,
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new("terraform")
    }
}

impl TerraformCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Per-step wall-clock limit
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl IacExecutor for TerraformCli {
    async fn run(&self, step: Step, workspace: &Path, env: &CredentialEnv) -> Result<StepOutput> {
        let args = step.args();
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args);
        cmd.current_dir(workspace);
        cmd.env("TF_IN_AUTOMATION", "1");
        env.apply(&mut cmd);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: {} {} in {}", self.binary, args.join(" "), workspace.display());

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| ProvisionError::ExternalTool {
                    step: step.name(),
                    message: format!("timed out after {}s", limit.as_secs()),
                })?,
            None => cmd.output().await,
        };

        let output = output.map_err(|e| ProvisionError::ExternalTool {
            step: step.name(),
            message: format!("could not start {}: {}", self.binary, e),
        })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(StepOutput {
            text,
            exit_ok: output.status.success(),
        })
    }
}

/// `{added, changed, destroyed}` from "Apply complete! Resources: 1 added, 0 changed, 0 destroyed."
pub fn parse_resource_counts(text: &str) -> Option<Value> {
    let line = text
        .lines()
        .find_map(|l| l.split_once("Apply complete! Resources:").map(|(_, rest)| rest))?;

    let mut counts = OutputMap::new();
    for part in line.trim().trim_end_matches('.').split(',') {
        let mut words = part.split_whitespace();
        let (Some(number), Some(label)) = (words.next(), words.next()) else {
            continue;
        };
        let Ok(number) = number.parse::<u64>() else {
            continue;
        };
        let label = label.trim_end_matches('.');
        if matches!(label, "added" | "changed" | "destroyed") {
            counts.insert(label.to_string(), json!(number));
        }
    }

    (counts.len() == 3).then(|| Value::Object(counts))
}

/// Output values from `output -json`; sensitive outputs are left out
pub fn parse_outputs(text: &str) -> Option<Value> {
    let parsed: Value = serde_json::from_str(text.trim()).ok()?;
    let outputs: OutputMap = parsed
        .as_object()?
        .iter()
        .filter(|(_, o)| !o.get("sensitive").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|(name, o)| o.get("value").map(|v| (name.clone(), v.clone())))
        .collect();
    Some(Value::Object(outputs))
}
