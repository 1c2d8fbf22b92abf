//! Common test utilities shared by the integration tests.
//!
//! This module provides:
//! - Test fixtures (delivery pipeline, secrets, scripted tool chain)
//! - A fake analysis server
//! - Event assertions
#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod gate;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use gate::*;
