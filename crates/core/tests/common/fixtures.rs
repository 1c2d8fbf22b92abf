//! Test fixtures for the delivery pipeline and its tool chain.

use sl_core::secrets::MapSecretStore;
use sl_core::stages::command::ToolInvocation;
use sl_core::stages::{ScriptedResponse, ScriptedRunner};
use sl_protocol::{
    BuildSettings, DeploySettings, ImageSettings, Pipeline, QualityGateSettings,
    SecurityScanSettings, StageAction, StageDef, TestSettings, TriggerConfig,
};
use std::path::Path;

pub const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";
pub const IMAGE_REF: &str = "docker.io/acme/banking-app:0123456789ab";
pub const SONAR_HOST: &str = "https://sonar.example.com";
pub const DOCKERHUB_TOKEN: &str = "dckr_pat_s3cr3t-value";
pub const GCP_KEY: &str = "{\"type\":\"service_account\",\"private_key\":\"-----BEGIN KEY-----\"}";

/// The six-stage delivery chain for a Maven service shipped to GKE.
pub fn delivery_pipeline() -> Pipeline {
    let quality_gate = QualityGateSettings {
        poll_interval_secs: 0,
        timeout_secs: 5,
        ..QualityGateSettings::default()
    };

    Pipeline {
        name: "delivery".to_string(),
        on: TriggerConfig::default(),
        stages: vec![
            StageDef::new("build", StageAction::Build(BuildSettings::default())),
            StageDef::new(
                "security-scan",
                StageAction::SecurityScan(SecurityScanSettings::default()),
            )
            .needs("build"),
            StageDef::new("test", StageAction::Test(TestSettings::default()))
                .needs("security-scan"),
            StageDef::new("quality-gate", StageAction::QualityGate(quality_gate))
                .needs("test")
                .secret("SONAR_HOST_URL")
                .secret("SONAR_TOKEN"),
            StageDef::new("image", StageAction::Image(image_settings()))
                .needs("quality-gate")
                .secret("DOCKERHUB_USERNAME")
                .secret("DOCKERHUB_TOKEN"),
            StageDef::new("deploy", StageAction::Deploy(deploy_settings()))
                .needs("image")
                .secret("GCP_SA_KEY"),
        ],
    }
}

pub fn image_settings() -> ImageSettings {
    ImageSettings {
        registry: "docker.io".to_string(),
        repository: "acme/banking-app".to_string(),
        tag: None,
        context: ".".to_string(),
        dockerfile: "Dockerfile".to_string(),
        username_secret: "DOCKERHUB_USERNAME".to_string(),
        password_secret: "DOCKERHUB_TOKEN".to_string(),
        require_package: true,
    }
}

pub fn deploy_settings() -> DeploySettings {
    DeploySettings {
        project: "acme-prod".to_string(),
        zone: "europe-west1-b".to_string(),
        cluster: "banking".to_string(),
        namespace: "banking-app".to_string(),
        manifests: vec!["k8s/deployment.yaml".to_string(), "k8s/service.yaml".to_string()],
        credential_secret: "GCP_SA_KEY".to_string(),
    }
}

/// Every secret the delivery pipeline declares.
pub fn delivery_secrets() -> MapSecretStore {
    MapSecretStore::new()
        .with("SONAR_HOST_URL", SONAR_HOST)
        .with("SONAR_TOKEN", "sq-token-value")
        .with("DOCKERHUB_USERNAME", "acme-bot")
        .with("DOCKERHUB_TOKEN", DOCKERHUB_TOKEN)
        .with("GCP_SA_KEY", GCP_KEY)
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("{e}"));
    }
    std::fs::write(path, contents).unwrap_or_else(|e| panic!("{e}"));
}

/// The value following `flag` in the invocation's arguments.
fn flag_value<'a>(invocation: &'a ToolInvocation, flag: &str) -> &'a str {
    invocation
        .args
        .iter()
        .position(|arg| arg == flag)
        .and_then(|i| invocation.args.get(i + 1))
        .map(String::as_str)
        .unwrap_or_else(|| panic!("{flag} missing from {}", invocation.command_line()))
}

/// Rules that make each tool behave like the real one on a clean project:
/// Maven packages a jar, the scanners write empty reports, the test run
/// leaves surefire reports and the analysis scanner writes its task file.
fn with_healthy_tools(runner: ScriptedRunner) -> ScriptedRunner {
    runner
        .respond_with("mvn -B package", |call| {
            write(&call.working_dir, "target/banking-app-1.0.jar", "jar");
            ScriptedResponse::exit(0).with_line("[INFO] BUILD SUCCESS")
        })
        .respond_with("trivy fs", |call| {
            write(&call.working_dir, flag_value(call, "--output"), r#"{"Results": []}"#);
            ScriptedResponse::exit(0)
        })
        .respond_with("gitleaks detect", |call| {
            write(&call.working_dir, flag_value(call, "--report-path"), "[]");
            ScriptedResponse::exit(0)
        })
        .respond_with("mvn -B test", |call| {
            write(
                &call.working_dir,
                "target/surefire-reports/TEST-AccountTest.xml",
                "<testsuite/>",
            );
            ScriptedResponse::exit(0).with_line("Tests run: 42, Failures: 0")
        })
        .respond_with("mvn -B sonar:sonar", |call| {
            write(
                &call.working_dir,
                "target/sonar/report-task.txt",
                "projectKey=acme:banking\nceTaskId=TASK-1\n",
            );
            ScriptedResponse::exit(0)
        })
}

/// A tool chain where every tool succeeds and the namespace already exists.
pub fn healthy_toolchain() -> ScriptedRunner {
    with_healthy_tools(ScriptedRunner::new())
}

/// A healthy tool chain except for `overrides`: calls starting with one of
/// the prefixes exit with the paired code.
pub fn toolchain_with(overrides: &[(&str, i32)]) -> ScriptedRunner {
    let runner = overrides
        .iter()
        .fold(ScriptedRunner::new(), |runner, (prefix, code)| {
            runner.respond(*prefix, *code)
        });
    with_healthy_tools(runner)
}
