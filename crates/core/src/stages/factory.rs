//! Stage factory for creating stage instances from definitions.

use crate::quality::{QualityGateService, SonarQubeService};
use crate::stages::adapters::{
    BuildStage, DeployStage, ImageStage, QualityGateStage, SecurityScanStage, ShellStage,
    TestSuiteStage,
};
use crate::stages::base::Stage;
use crate::stages::command::{ProcessRunner, ToolRunner};
use anyhow::{bail, Result};
use sl_protocol::{StageAction, StageDef};
use std::sync::Arc;

/// External services every stage adapter is built on.
#[derive(Clone)]
pub struct Toolchain {
    pub runner: Arc<dyn ToolRunner>,
    pub quality_gate: Arc<dyn QualityGateService>,
}

impl Toolchain {
    pub fn new(runner: Arc<dyn ToolRunner>, quality_gate: Arc<dyn QualityGateService>) -> Self {
        Self {
            runner,
            quality_gate,
        }
    }

    /// Local subprocesses and a SonarQube client.
    pub fn system() -> Self {
        Self::new(Arc::new(ProcessRunner::new()), Arc::new(SonarQubeService::new()))
    }
}

/// Factory for creating stage adapters based on their action.
pub struct StageFactory;

impl StageFactory {
    /// Create the adapter for `def`.
    ///
    /// Fails for definitions no adapter can run, such as an empty command.
    pub fn create(def: &StageDef, toolchain: &Toolchain) -> Result<Arc<dyn Stage>> {
        let runner = Arc::clone(&toolchain.runner);
        let stage: Arc<dyn Stage> = match &def.action {
            StageAction::Build(settings) => {
                if settings.command.is_empty() {
                    bail!("stage '{}': build command is empty", def.name);
                }
                Arc::new(BuildStage::new(settings.clone(), runner))
            }
            StageAction::SecurityScan(settings) => {
                Arc::new(SecurityScanStage::new(settings.clone(), runner))
            }
            StageAction::Test(settings) => {
                if settings.command.is_empty() {
                    bail!("stage '{}': test command is empty", def.name);
                }
                Arc::new(TestSuiteStage::new(settings.clone(), runner))
            }
            StageAction::QualityGate(settings) => {
                if settings.analysis_command.is_empty() {
                    bail!("stage '{}': analysis command is empty", def.name);
                }
                Arc::new(QualityGateStage::new(
                    settings.clone(),
                    runner,
                    Arc::clone(&toolchain.quality_gate),
                ))
            }
            StageAction::Image(settings) => {
                if settings.repository.trim().is_empty() {
                    bail!("stage '{}': image repository is empty", def.name);
                }
                Arc::new(ImageStage::new(settings.clone(), runner))
            }
            StageAction::Deploy(settings) => {
                if settings.manifests.is_empty() {
                    bail!("stage '{}': no manifests to deploy", def.name);
                }
                Arc::new(DeployStage::new(settings.clone(), runner))
            }
            StageAction::Shell(settings) => {
                if settings.command.is_empty() {
                    bail!("stage '{}': shell command is empty", def.name);
                }
                Arc::new(ShellStage::new(settings.clone(), runner))
            }
        };
        Ok(stage)
    }
}
