//! Build stage: compile and package the application.

use crate::stages::base::{Stage, StageError, StageFailure, StageOutput};
use crate::stages::command::{run_checked, ToolRunner};
use crate::stages::context::StageContext;
use async_trait::async_trait;
use sl_protocol::{Artifact, BuildSettings};
use std::sync::Arc;
use walkdir::WalkDir;

pub struct BuildStage {
    settings: BuildSettings,
    runner: Arc<dyn ToolRunner>,
}

impl BuildStage {
    pub fn new(settings: BuildSettings, runner: Arc<dyn ToolRunner>) -> Self {
        Self { settings, runner }
    }

    /// Packaged outputs directly under the artifact directory, sorted by
    /// name, as workspace-relative paths.
    fn find_packages(&self, context: &StageContext) -> Result<Vec<Artifact>, StageError> {
        let dir = context.workspace.join(&self.settings.artifact_dir);
        if !dir.is_dir() {
            return Err(StageError::Build(format!(
                "artifact directory '{}' was not produced",
                self.settings.artifact_dir
            )));
        }

        let mut names: Vec<String> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().extension().and_then(|ext| ext.to_str())
                    == Some(self.settings.artifact_extension.as_str())
            })
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();

        if names.is_empty() {
            return Err(StageError::Build(format!(
                "no .{} artifact found in '{}'",
                self.settings.artifact_extension, self.settings.artifact_dir
            )));
        }

        let base = self.settings.artifact_dir.trim_end_matches('/');
        Ok(names
            .into_iter()
            .map(|name| Artifact::Package {
                path: format!("{base}/{name}"),
            })
            .collect())
    }
}

#[async_trait]
impl Stage for BuildStage {
    async fn check_availability(&self) -> bool {
        self.settings
            .command
            .first()
            .is_some_and(|program| self.runner.is_available(program))
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure> {
        let invocation = context.tool(&self.settings.command)?;
        run_checked(
            self.runner.as_ref(),
            &invocation,
            context.log_sink(),
            StageError::Build,
        )
        .await?;

        let packages = self.find_packages(context)?;
        for package in &packages {
            context.log(format!("packaged {package}"));
        }
        Ok(StageOutput::new(packages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::scripted::ScriptedRunner;
    use tempfile::TempDir;

    fn setup() -> (TempDir, StageContext) {
        let dir = TempDir::new().unwrap();
        let context = StageContext::new("build", dir.path().to_path_buf());
        (dir, context)
    }

    #[tokio::test]
    async fn test_build_records_packages() {
        let (dir, context) = setup();
        std::fs::create_dir_all(dir.path().join("target/classes")).unwrap();
        std::fs::write(dir.path().join("target/app-1.0.jar"), b"jar").unwrap();
        std::fs::write(dir.path().join("target/app-1.0.pom"), b"pom").unwrap();

        let runner = Arc::new(ScriptedRunner::new());
        let stage = BuildStage::new(BuildSettings::default(), runner.clone());
        let output = stage.execute(&context).await.unwrap();

        assert_eq!(
            output.artifacts,
            vec![Artifact::Package {
                path: "target/app-1.0.jar".to_string()
            }]
        );
        assert_eq!(
            runner.command_lines(),
            vec!["mvn -B package -DskipTests".to_string()]
        );
    }

    #[tokio::test]
    async fn test_build_failure() {
        let (_dir, context) = setup();
        let runner = Arc::new(ScriptedRunner::new().respond("mvn", 1));
        let stage = BuildStage::new(BuildSettings::default(), runner);

        let failure = stage.execute(&context).await.unwrap_err();
        assert!(matches!(failure.error, StageError::Build(_)));
    }

    #[tokio::test]
    async fn test_build_without_package() {
        let (dir, context) = setup();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        let stage = BuildStage::new(BuildSettings::default(), Arc::new(ScriptedRunner::new()));

        let failure = stage.execute(&context).await.unwrap_err();
        match failure.error {
            StageError::Build(msg) => assert!(msg.contains("no .jar artifact")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_availability() {
        let runner = Arc::new(ScriptedRunner::new().missing("mvn"));
        let stage = BuildStage::new(BuildSettings::default(), runner);
        assert!(!stage.check_availability().await);
    }
}
