//! Pipeline definition models for `.shipline/pipelines/*.yaml`.
//!
//! A pipeline is a named set of stages. Each stage declares the stages it
//! `needs`, the secrets it is allowed to see, and the action it performs.

use crate::action_models::StageAction;
use crate::run_models::Trigger;
use serde::{Deserialize, Serialize};

/// Branch filter for push events.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PushFilter {
    /// Branches that start a run. Empty means every branch.
    ///
    /// A trailing `*` matches any branch with the given prefix
    /// (e.g. `release/*`).
    #[serde(default)]
    pub branches: Vec<String>,
}

/// Events that start a pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerConfig {
    #[serde(default)]
    pub push: PushFilter,
}

/// One stage of a pipeline.
///
/// # Example
///
/// ```yaml
/// name: image
/// needs: [quality-gate]
/// secrets: [DOCKERHUB_USERNAME, DOCKERHUB_TOKEN]
/// action:
///   image:
///     registry: docker.io
///     repository: acme/banking-app
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StageDef {
    /// Unique name of the stage within its pipeline.
    pub name: String,

    /// Stages that must have succeeded before this one may run.
    #[serde(default)]
    pub needs: Vec<String>,

    /// Names of secrets injected into this stage's context.
    ///
    /// Secrets not listed here are never visible to the stage.
    #[serde(default)]
    pub secrets: Vec<String>,

    /// What the stage does.
    pub action: StageAction,
}

impl StageDef {
    pub fn new(name: impl Into<String>, action: StageAction) -> Self {
        Self {
            name: name.into(),
            needs: Vec::new(),
            secrets: Vec::new(),
            action,
        }
    }

    pub fn needs(mut self, stage: impl Into<String>) -> Self {
        self.needs.push(stage.into());
        self
    }

    pub fn secret(mut self, name: impl Into<String>) -> Self {
        self.secrets.push(name.into());
        self
    }
}

/// A full delivery pipeline.
///
/// # Example
///
/// ```yaml
/// name: delivery
/// on:
///   push:
///     branches: [main]
/// stages:
///   - name: build
///     action:
///       build: {}
///   - name: test
///     needs: [build]
///     action:
///       test: {}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Pipeline {
    /// Unique name identifying this pipeline.
    pub name: String,

    /// Trigger filters.
    #[serde(default)]
    pub on: TriggerConfig,

    /// Stage definitions, in declaration order.
    pub stages: Vec<StageDef>,
}

impl Pipeline {
    /// Look up a stage by name.
    pub fn stage(&self, name: &str) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Whether a push described by `trigger` should start this pipeline.
    pub fn accepts(&self, trigger: &Trigger) -> bool {
        let branches = &self.on.push.branches;
        if branches.is_empty() {
            return true;
        }
        branches.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => trigger.branch.starts_with(prefix),
            None => *pattern == trigger.branch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_models::ShellSettings;

    fn shell(cmd: &str) -> StageAction {
        StageAction::Shell(ShellSettings {
            command: vec![cmd.to_string()],
            env: Default::default(),
        })
    }

    fn pipeline_on(branches: &[&str]) -> Pipeline {
        Pipeline {
            name: "p".to_string(),
            on: TriggerConfig {
                push: PushFilter {
                    branches: branches.iter().map(|b| b.to_string()).collect(),
                },
            },
            stages: vec![StageDef::new("only", shell("true"))],
        }
    }

    #[test]
    fn test_accepts_any_branch_without_filter() {
        let pipeline = pipeline_on(&[]);
        assert!(pipeline.accepts(&Trigger::push("feature/x")));
    }

    #[test]
    fn test_accepts_exact_branch() {
        let pipeline = pipeline_on(&["main"]);
        assert!(pipeline.accepts(&Trigger::push("main")));
        assert!(!pipeline.accepts(&Trigger::push("main-old")));
        assert!(!pipeline.accepts(&Trigger::push("develop")));
    }

    #[test]
    fn test_accepts_prefix_pattern() {
        let pipeline = pipeline_on(&["release/*"]);
        assert!(pipeline.accepts(&Trigger::push("release/1.2")));
        assert!(!pipeline.accepts(&Trigger::push("main")));
    }

    #[test]
    fn test_stage_builder_and_lookup() {
        let mut pipeline = pipeline_on(&[]);
        pipeline
            .stages
            .push(StageDef::new("deploy", shell("true")).needs("only").secret("KEY"));

        let deploy = pipeline.stage("deploy").unwrap();
        assert_eq!(deploy.needs, vec!["only".to_string()]);
        assert_eq!(deploy.secrets, vec!["KEY".to_string()]);
        assert!(pipeline.stage("missing").is_none());
    }
}
