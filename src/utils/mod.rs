//! Utility Functions
//!
//! User-friendly error formatting for the CLI.
//!
//! ```rust,no_run
//! use lamco_qsv::utils::format_user_error;
//!
//! let error = anyhow::anyhow!("No hardware adapters found: enumeration empty");
//! eprintln!("{}", format_user_error(&error));
//! ```
//!
//! Error categories with context-aware help:
//! - Loader errors → runtime and driver installation
//! - Adapter errors → render node permissions, adapter index
//! - Fixture errors → scripted runtime file problems
//! - Job errors → rate control target, encoder choice
//! - Config errors → syntax and values

pub mod errors;

pub use errors::format_user_error;
