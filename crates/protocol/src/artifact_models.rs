//! Artifacts recorded on stage results.
//!
//! Artifacts are pointers to state owned outside the pipeline: a file in the
//! workspace, an image in a registry, a verdict on the analysis server, a
//! set of resources in a cluster. Contents are never copied into the run.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Artifact {
    /// A packaged build output.
    Package { path: String },

    /// A machine-readable report (scan results, test reports).
    Report { name: String, path: String },

    /// A pushed container image.
    Image { reference: String },

    /// The verdict of a static-analysis quality gate.
    QualityGate { analysis_id: String, status: String },

    /// A manifest set applied to a cluster namespace.
    Deployment {
        cluster: String,
        namespace: String,
        manifests: Vec<String>,
    },
}

impl Artifact {
    pub fn report(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Report {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn is_report(&self) -> bool {
        matches!(self, Self::Report { .. })
    }

    /// Path of a packaged build output, if this is one.
    pub fn package_path(&self) -> Option<&str> {
        match self {
            Self::Package { path } => Some(path),
            _ => None,
        }
    }

    /// Reference of a pushed image, if this is one.
    pub fn image_reference(&self) -> Option<&str> {
        match self {
            Self::Image { reference } => Some(reference),
            _ => None,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package { path } => write!(f, "package {path}"),
            Self::Report { name, path } => write!(f, "report {name} ({path})"),
            Self::Image { reference } => write!(f, "image {reference}"),
            Self::QualityGate {
                analysis_id,
                status,
            } => write!(f, "quality gate {status} (analysis {analysis_id})"),
            Self::Deployment {
                cluster,
                namespace,
                manifests,
            } => write!(
                f,
                "deployment {cluster}/{namespace} ({} manifest(s))",
                manifests.len()
            ),
        }
    }
}
