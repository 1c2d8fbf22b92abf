//! Stage adapter implementations.

mod build;
mod deploy;
mod image;
pub mod mock_stage;
mod quality_gate;
pub mod security_scan;
mod shell;
mod test_suite;

pub use build::BuildStage;
pub use deploy::DeployStage;
pub use image::ImageStage;
pub use mock_stage::MockStage;
pub use quality_gate::QualityGateStage;
pub use security_scan::SecurityScanStage;
pub use shell::ShellStage;
pub use test_suite::TestSuiteStage;
