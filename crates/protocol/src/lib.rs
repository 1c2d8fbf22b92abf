//! # sl-protocol
//!
//! Data models shared by every shipline crate.
//!
//! This crate defines:
//! - Pipeline definitions parsed from `.shipline/pipelines/*.yaml`
//! - Stage actions and their tool settings
//! - Runtime run state and stage results
//! - Artifacts (pointers to externally owned state)
//! - Events emitted while a run progresses
//!
//! ## Modules
//!
//! - [`pipeline_models`]: Pipelines, stages, trigger filters
//! - [`action_models`]: Built-in stage actions and their settings
//! - [`config_models`]: Global configuration from config.toml
//! - [`run_models`]: Runs, stage results, triggers
//! - [`artifact_models`]: Artifacts recorded on stage results
//! - [`ipc`]: Events emitted by the engine
//!
//! Secrets never appear in this crate: nothing here can carry one into a
//! serialized run record.

pub mod action_models;
pub mod artifact_models;
pub mod config_models;
pub mod ipc;
pub mod pipeline_models;
pub mod run_models;

// Re-export all public types for convenience
pub use action_models::*;
pub use artifact_models::*;
pub use config_models::*;
pub use ipc::*;
pub use pipeline_models::*;
pub use run_models::*;
