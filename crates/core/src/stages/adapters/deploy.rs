//! Deploy stage: apply manifests to a GKE cluster.
//!
//! Each execution authenticates into a private gcloud configuration and
//! kubeconfig, so concurrent runs never share cluster credentials. The
//! namespace is created only when it does not exist and manifests are
//! applied declaratively, so re-running against an unchanged cluster is a
//! no-op.

use crate::secrets::Secret;
use crate::stages::base::{Stage, StageError, StageFailure, StageOutput};
use crate::stages::command::{run_checked, ToolInvocation, ToolRunner};
use crate::stages::context::StageContext;
use async_trait::async_trait;
use sl_protocol::{Artifact, DeploySettings};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub struct DeployStage {
    settings: DeploySettings,
    runner: Arc<dyn ToolRunner>,
}

/// Per-execution credential home, removed on drop.
struct CredentialHome {
    dir: TempDir,
}

impl CredentialHome {
    fn create(key: &Secret) -> Result<Self, StageError> {
        let dir = TempDir::new()
            .map_err(|e| StageError::Execution(format!("cannot create credential dir: {e}")))?;
        let mut file = std::fs::File::create(dir.path().join("key.json"))
            .map_err(|e| StageError::Execution(format!("cannot write service-account key: {e}")))?;
        file.write_all(key.expose().as_bytes())
            .map_err(|e| StageError::Execution(format!("cannot write service-account key: {e}")))?;
        Ok(Self { dir })
    }

    fn key_file(&self) -> String {
        self.path("key.json")
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }

    /// Point gcloud and kubectl at this home.
    fn scope(&self, invocation: ToolInvocation) -> ToolInvocation {
        invocation
            .env("CLOUDSDK_CONFIG", self.path("gcloud"))
            .env("KUBECONFIG", self.path("kubeconfig"))
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }
}

impl DeployStage {
    pub fn new(settings: DeploySettings, runner: Arc<dyn ToolRunner>) -> Self {
        Self { settings, runner }
    }

    async fn namespace_exists(
        &self,
        context: &StageContext,
        home: &CredentialHome,
    ) -> Result<bool, StageError> {
        let get = home.scope(
            context.tool_with("kubectl", ["get", "namespace", self.settings.namespace.as_str()]),
        );
        Ok(self.runner.run(&get, context.log_sink()).await?.success())
    }

    async fn ensure_namespace(
        &self,
        context: &StageContext,
        home: &CredentialHome,
    ) -> Result<(), StageError> {
        let namespace = self.settings.namespace.as_str();
        if self.namespace_exists(context, home).await? {
            context.log(format!("namespace {namespace} exists"));
            return Ok(());
        }

        let create = home.scope(context.tool_with("kubectl", ["create", "namespace", namespace]));
        let created = self.runner.run(&create, context.log_sink()).await?;
        // Another run may have created it in the meantime.
        if created.success() || self.namespace_exists(context, home).await? {
            Ok(())
        } else {
            Err(StageError::DeployApply(format!(
                "cannot create namespace '{namespace}' (exit code {})",
                created.exit_code
            )))
        }
    }
}

#[async_trait]
impl Stage for DeployStage {
    async fn check_availability(&self) -> bool {
        self.runner.is_available("gcloud") && self.runner.is_available("kubectl")
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure> {
        if self.settings.manifests.is_empty() {
            return Err(StageError::DeployApply("no manifests configured".to_string()).into());
        }
        let key = context.secret(&self.settings.credential_secret)?;
        let home = CredentialHome::create(key)?;
        tracing::debug!(home = %home.root().display(), "using private credential home");

        let runner = self.runner.as_ref();
        let log = context.log_sink();
        let settings = &self.settings;

        let auth = home.scope(context.tool_with(
            "gcloud",
            [
                "auth".to_string(),
                "activate-service-account".to_string(),
                format!("--key-file={}", home.key_file()),
            ],
        ));
        run_checked(runner, &auth, log, StageError::DeployAuth).await?;

        let credentials = home.scope(context.tool_with(
            "gcloud",
            [
                "container",
                "clusters",
                "get-credentials",
                settings.cluster.as_str(),
                "--zone",
                settings.zone.as_str(),
                "--project",
                settings.project.as_str(),
            ],
        ));
        run_checked(runner, &credentials, log, StageError::ClusterUnreachable).await?;

        self.ensure_namespace(context, &home).await?;

        let mut args = vec![
            "apply".to_string(),
            "--namespace".to_string(),
            settings.namespace.clone(),
        ];
        for manifest in &settings.manifests {
            args.push("-f".to_string());
            args.push(manifest.clone());
        }
        let apply = home.scope(context.tool_with("kubectl", args));
        run_checked(runner, &apply, log, StageError::DeployApply).await?;

        if let Some(image) = context.upstream_image() {
            context.log(format!("deployed with image {image}"));
        }
        Ok(StageOutput::new(vec![Artifact::Deployment {
            cluster: settings.cluster.clone(),
            namespace: settings.namespace.clone(),
            manifests: settings.manifests.clone(),
        }]))
    }
}
