//! Security scan stage: dependency/filesystem vulnerabilities with trivy,
//! leaked secrets with gitleaks.
//!
//! Both scanners write JSON reports into the report directory. The reports
//! are recorded as artifacts whether or not the policy lets the stage pass.

use crate::stages::base::{Stage, StageError, StageFailure, StageOutput};
use crate::stages::command::{run_checked, ToolRunner};
use crate::stages::context::StageContext;
use async_trait::async_trait;
use serde::Deserialize;
use sl_protocol::{Artifact, ScanPolicy, SecurityScanSettings, Severity};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub const TRIVY_REPORT: &str = "trivy-fs-report.json";
pub const GITLEAKS_REPORT: &str = "gitleaks-report.json";

#[derive(Debug, Deserialize)]
struct TrivyReport {
    #[serde(rename = "Results", default)]
    results: Option<Vec<TrivyResult>>,
}

#[derive(Debug, Deserialize)]
struct TrivyResult {
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Option<Vec<TrivyVulnerability>>,
}

#[derive(Debug, Deserialize)]
struct TrivyVulnerability {
    #[serde(rename = "Severity", default)]
    severity: String,
}

#[derive(Debug, Deserialize)]
struct GitleaksFinding {
    #[serde(rename = "RuleID", default)]
    rule_id: String,
    #[serde(rename = "File", default)]
    file: String,
}

/// Findings counted from both reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub vulnerabilities: BTreeMap<Severity, usize>,
    /// `rule file` of each leaked secret.
    pub leaks: Vec<String>,
}

impl ScanSummary {
    pub fn at_or_above(&self, threshold: Severity) -> usize {
        self.vulnerabilities
            .iter()
            .filter(|(severity, _)| **severity >= threshold)
            .map(|(_, count)| count)
            .sum()
    }

    /// Violations of `policy`, empty when the stage may pass.
    pub fn violations(&self, policy: ScanPolicy) -> Vec<String> {
        let ScanPolicy::Blocking {
            threshold,
            fail_on_secrets,
        } = policy
        else {
            return Vec::new();
        };

        let mut violations = Vec::new();
        let blocking = self.at_or_above(threshold);
        if blocking > 0 {
            violations.push(format!(
                "{blocking} vulnerabilit{} at or above {threshold:?}",
                if blocking == 1 { "y" } else { "ies" }
            ));
        }
        if fail_on_secrets && !self.leaks.is_empty() {
            violations.push(format!("{} leaked secret(s)", self.leaks.len()));
        }
        violations
    }

    fn describe(&self) -> String {
        let counts: Vec<String> = self
            .vulnerabilities
            .iter()
            .rev()
            .map(|(severity, count)| format!("{severity:?}={count}"))
            .collect();
        let counts = if counts.is_empty() {
            "none".to_string()
        } else {
            counts.join(" ")
        };
        format!("vulnerabilities: {counts}; leaked secrets: {}", self.leaks.len())
    }
}

pub fn parse_trivy_report(json: &str) -> Result<BTreeMap<Severity, usize>, serde_json::Error> {
    let report: TrivyReport = serde_json::from_str(json)?;
    let mut counts = BTreeMap::new();
    for vulnerability in report
        .results
        .unwrap_or_default()
        .into_iter()
        .flat_map(|result| result.vulnerabilities.unwrap_or_default())
    {
        *counts
            .entry(Severity::from_label(&vulnerability.severity))
            .or_insert(0) += 1;
    }
    Ok(counts)
}

pub fn parse_gitleaks_report(json: &str) -> Result<Vec<String>, serde_json::Error> {
    // gitleaks writes an empty file when it has nothing to report on some
    // versions.
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let findings: Vec<GitleaksFinding> = serde_json::from_str(json)?;
    Ok(findings
        .into_iter()
        .map(|f| format!("{} {}", f.rule_id, f.file))
        .collect())
}

pub struct SecurityScanStage {
    settings: SecurityScanSettings,
    runner: Arc<dyn ToolRunner>,
}

impl SecurityScanStage {
    pub fn new(settings: SecurityScanSettings, runner: Arc<dyn ToolRunner>) -> Self {
        Self { settings, runner }
    }

    fn report_path(&self, file: &str) -> String {
        format!("{}/{file}", self.settings.report_dir.trim_end_matches('/'))
    }

    fn read_report(workspace: &Path, relative: &str) -> Result<String, StageError> {
        std::fs::read_to_string(workspace.join(relative))
            .map_err(|e| StageError::Scan(format!("cannot read report '{relative}': {e}")))
    }

    async fn scan(
        &self,
        context: &StageContext,
        trivy: &str,
        gitleaks: &str,
    ) -> Result<(), StageError> {
        let invocation = context.tool_with(
            "trivy",
            ["fs", "--format", "json", "--output", trivy, "--exit-code", "0", "."],
        );
        run_checked(self.runner.as_ref(), &invocation, context.log_sink(), StageError::Scan).await?;

        let invocation = context.tool_with(
            "gitleaks",
            [
                "detect",
                "--source",
                ".",
                "--no-banner",
                "--report-format",
                "json",
                "--report-path",
                gitleaks,
                "--exit-code",
                "0",
            ],
        );
        run_checked(self.runner.as_ref(), &invocation, context.log_sink(), StageError::Scan).await?;
        Ok(())
    }

    fn summarize(workspace: &Path, trivy: &str, gitleaks: &str) -> Result<ScanSummary, StageError> {
        let vulnerabilities = parse_trivy_report(&Self::read_report(workspace, trivy)?)
            .map_err(|e| StageError::Scan(format!("malformed trivy report: {e}")))?;
        let leaks = parse_gitleaks_report(&Self::read_report(workspace, gitleaks)?)
            .map_err(|e| StageError::Scan(format!("malformed gitleaks report: {e}")))?;
        Ok(ScanSummary {
            vulnerabilities,
            leaks,
        })
    }
}

#[async_trait]
impl Stage for SecurityScanStage {
    async fn check_availability(&self) -> bool {
        self.runner.is_available("trivy") && self.runner.is_available("gitleaks")
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure> {
        let report_dir = context.workspace.join(&self.settings.report_dir);
        std::fs::create_dir_all(&report_dir).map_err(|e| {
            StageError::Scan(format!(
                "cannot create report directory '{}': {e}",
                self.settings.report_dir
            ))
        })?;

        let trivy = self.report_path(TRIVY_REPORT);
        let gitleaks = self.report_path(GITLEAKS_REPORT);
        let reports = vec![
            Artifact::report("trivy", trivy.clone()),
            Artifact::report("gitleaks", gitleaks.clone()),
        ];

        if let Err(error) = self.scan(context, &trivy, &gitleaks).await {
            return Err(StageFailure::with_artifacts(error, reports));
        }

        let summary = match Self::summarize(&context.workspace, &trivy, &gitleaks) {
            Ok(summary) => summary,
            Err(error) => return Err(StageFailure::with_artifacts(error, reports)),
        };
        context.log(summary.describe());
        for leak in &summary.leaks {
            context.log(format!("leak: {leak}"));
        }

        let violations = summary.violations(self.settings.policy);
        if violations.is_empty() {
            Ok(StageOutput::new(reports))
        } else {
            Err(StageFailure::with_artifacts(
                StageError::ScanFindings(violations.join(", ")),
                reports,
            ))
        }
    }
}
