//! # sl-core
//!
//! Core pipeline engine and stage adapters for shipline.
//!
//! This crate provides:
//! - Configuration loading from `.shipline/` directory
//! - Execution planning over stage dependencies
//! - Stage trait and adapters for the build, scan, test, quality-gate,
//!   image and deploy tool chains
//! - Scoped, masked secret handling
//! - Run state machine and on-disk run records
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and pipeline selection
//! - [`engine`]: Planning and sequential pipeline execution
//! - [`init`]: `.shipline/` scaffolding from embedded templates
//! - [`quality`]: Static-analysis quality-gate client
//! - [`secrets`]: Secret stores and per-stage scoping
//! - [`stages`]: Stage trait, tool runner and built-in adapters
//! - [`state`]: Run state transitions and run records

pub mod config;
pub mod engine;
pub mod init;
pub mod quality;
pub mod secrets;
pub mod stages;
pub mod state;
