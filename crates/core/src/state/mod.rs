//! Run state management.
//!
//! This module provides:
//! - Run state machine (run.rs)
//! - Run records on disk (store.rs)

pub mod run;
pub mod store;

pub use run::RunStateError;
pub use store::RunStore;
