//! Stage abstraction and adapters.
//!
//! This module provides the `Stage` trait, one adapter per built-in action,
//! the `StageRegistry` the engine resolves stages from, and the tool-runner
//! seam every adapter drives external tools through.

pub mod adapters;
pub mod base;
pub mod command;
pub mod context;
pub mod factory;
pub mod registry;
pub mod scripted;

pub use adapters::MockStage;
pub use base::{Stage, StageError, StageFailure, StageOutput};
pub use command::{ProcessRunner, ToolInvocation, ToolOutput, ToolRunner};
pub use context::{LogSink, StageContext};
pub use factory::{StageFactory, Toolchain};
pub use registry::StageRegistry;
pub use scripted::{ScriptedResponse, ScriptedRunner};
