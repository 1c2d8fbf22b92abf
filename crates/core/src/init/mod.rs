//! Initialization module for creating `.shipline/` directory structures.
//!
//! `shipline init` writes a global `config.toml` and ready-to-edit pipeline
//! definitions into the current repository.
//!
//! # Example
//!
//! ```no_run
//! use sl_core::init::{generate_shipline_structure, InitOptions};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = InitOptions {
//!     target_dir: PathBuf::from("."),
//!     force: false,
//!     minimal: true,
//! };
//!
//! generate_shipline_structure(options).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

pub use error::{InitError, InitResult};
pub use generator::{generate_shipline_structure, InitOptions};
pub use templates::{get_template, list_templates};
