//! Stage actions and their settings.
//!
//! Each built-in action wraps one external tool chain. Every settings
//! struct has defaults matching a Maven project shipped as a Docker image
//! to GKE, so `action: { build: {} }` is a complete definition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a stage does.
///
/// Serialized externally tagged with kebab-case names:
///
/// ```yaml
/// action:
///   security-scan:
///     policy:
///       mode: blocking
///       threshold: CRITICAL
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum StageAction {
    /// Compile and package the application.
    Build(BuildSettings),
    /// Vulnerability scan plus secret scan of the checkout.
    SecurityScan(SecurityScanSettings),
    /// Run the automated test suite.
    Test(TestSettings),
    /// Static analysis blocked on a quality-gate verdict.
    QualityGate(QualityGateSettings),
    /// Build, tag and push a container image.
    Image(ImageSettings),
    /// Apply manifests to a managed Kubernetes cluster.
    Deploy(DeploySettings),
    /// Run an arbitrary command.
    Shell(ShellSettings),
}

impl StageAction {
    /// Kebab-case name of the action, as written in pipeline files.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::SecurityScan(_) => "security-scan",
            Self::Test(_) => "test",
            Self::QualityGate(_) => "quality-gate",
            Self::Image(_) => "image",
            Self::Deploy(_) => "deploy",
            Self::Shell(_) => "shell",
        }
    }
}

fn mvn(args: &[&str]) -> Vec<String> {
    std::iter::once("mvn")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BuildSettings {
    /// Build command, program first.
    pub command: Vec<String>,
    /// Directory (relative to the workspace) holding the packaged output.
    pub artifact_dir: String,
    /// File extension identifying packaged artifacts.
    pub artifact_extension: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            command: mvn(&["-B", "package", "-DskipTests"]),
            artifact_dir: "target".to_string(),
            artifact_extension: "jar".to_string(),
        }
    }
}

/// Vulnerability severity, ordered from least to most severe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a scanner severity label. Unrecognized labels map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            "CRITICAL" => Self::Critical,
            _ => Self::Unknown,
        }
    }
}

fn default_threshold() -> Severity {
    Severity::Critical
}

fn default_true() -> bool {
    true
}

/// Whether scan findings fail the stage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ScanPolicy {
    /// Reports are produced; findings never fail the stage.
    #[default]
    Advisory,
    /// Findings at or above `threshold` fail the stage.
    Blocking {
        #[serde(default = "default_threshold")]
        threshold: Severity,
        /// Any leaked secret fails the stage.
        #[serde(default = "default_true")]
        fail_on_secrets: bool,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityScanSettings {
    pub policy: ScanPolicy,
    /// Directory (relative to the workspace) the reports are written to.
    pub report_dir: String,
}

impl Default for SecurityScanSettings {
    fn default() -> Self {
        Self {
            policy: ScanPolicy::Advisory,
            report_dir: "reports".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TestSettings {
    pub command: Vec<String>,
    /// Test report directory recorded as a report artifact when present.
    pub reports_dir: String,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            command: mvn(&["-B", "test"]),
            reports_dir: "target/surefire-reports".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct QualityGateSettings {
    /// Rebuild producing coverage data. Empty reuses the existing build.
    pub build_command: Vec<String>,
    /// Static analysis submission.
    pub analysis_command: Vec<String>,
    /// Scanner metadata file holding the `ceTaskId`.
    pub report_task_file: String,
    pub host_url_secret: String,
    pub token_secret: String,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for QualityGateSettings {
    fn default() -> Self {
        Self {
            build_command: mvn(&["-B", "verify"]),
            analysis_command: mvn(&["-B", "sonar:sonar"]),
            report_task_file: "target/sonar/report-task.txt".to_string(),
            host_url_secret: "SONAR_HOST_URL".to_string(),
            token_secret: "SONAR_TOKEN".to_string(),
            poll_interval_secs: 5,
            timeout_secs: 300,
        }
    }
}

fn default_registry() -> String {
    "docker.io".to_string()
}

fn default_context() -> String {
    ".".to_string()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

fn default_username_secret() -> String {
    "DOCKERHUB_USERNAME".to_string()
}

fn default_password_secret() -> String {
    "DOCKERHUB_TOKEN".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    #[serde(default = "default_registry")]
    pub registry: String,
    /// Repository path within the registry, e.g. `acme/banking-app`.
    pub repository: String,
    /// Fixed tag. Defaults to the short trigger commit, then `latest`.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
    #[serde(default = "default_username_secret")]
    pub username_secret: String,
    #[serde(default = "default_password_secret")]
    pub password_secret: String,
    /// Refuse to build unless an upstream stage produced a package.
    #[serde(default = "default_true")]
    pub require_package: bool,
}

fn default_credential_secret() -> String {
    "GCP_SA_KEY".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
    pub project: String,
    pub zone: String,
    pub cluster: String,
    pub namespace: String,
    /// Manifest files or directories, relative to the workspace.
    pub manifests: Vec<String>,
    /// Secret holding the service-account key JSON.
    #[serde(default = "default_credential_secret")]
    pub credential_secret: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
