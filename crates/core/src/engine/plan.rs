//! Execution planning.
//!
//! Stages run one at a time in an order where every stage comes after all
//! of the stages it `needs`. Among stages that are ready at the same time,
//! declaration order wins, so a linear pipeline runs exactly as written.

use sl_protocol::{Pipeline, StageDef};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Pipeline '{0}' has no stages")]
    Empty(String),

    #[error("Stage '{0}' is defined more than once")]
    DuplicateStage(String),

    #[error("Stage '{stage}' needs unknown stage '{dependency}'")]
    UnknownDependency { stage: String, dependency: String },

    #[error("Stage '{0}' needs itself")]
    SelfDependency(String),

    #[error("Dependency cycle between stages: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Check the structure of `pipeline` without ordering it.
fn validate(pipeline: &Pipeline) -> Result<(), PlanError> {
    if pipeline.stages.is_empty() {
        return Err(PlanError::Empty(pipeline.name.clone()));
    }

    let mut names = HashSet::new();
    for stage in &pipeline.stages {
        if !names.insert(stage.name.as_str()) {
            return Err(PlanError::DuplicateStage(stage.name.clone()));
        }
    }

    for stage in &pipeline.stages {
        for dependency in &stage.needs {
            if dependency == &stage.name {
                return Err(PlanError::SelfDependency(stage.name.clone()));
            }
            if !names.contains(dependency.as_str()) {
                return Err(PlanError::UnknownDependency {
                    stage: stage.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }
    Ok(())
}

/// The order stages of `pipeline` execute in.
pub fn execution_order(pipeline: &Pipeline) -> Result<Vec<&StageDef>, PlanError> {
    validate(pipeline)?;

    let mut placed: HashSet<&str> = HashSet::new();
    let mut order: Vec<&StageDef> = Vec::with_capacity(pipeline.stages.len());

    while order.len() < pipeline.stages.len() {
        let next = pipeline.stages.iter().find(|stage| {
            !placed.contains(stage.name.as_str())
                && stage
                    .needs
                    .iter()
                    .all(|dependency| placed.contains(dependency.as_str()))
        });

        match next {
            Some(stage) => {
                placed.insert(stage.name.as_str());
                order.push(stage);
            }
            None => {
                let remaining = pipeline
                    .stages
                    .iter()
                    .filter(|stage| !placed.contains(stage.name.as_str()))
                    .map(|stage| stage.name.clone())
                    .collect();
                return Err(PlanError::Cycle(remaining));
            }
        }
    }

    Ok(order)
}
