//! # cidflow
//!
//! Runs a two-phase batch computation on a remote, content-addressed
//! execution network: one local job per input partition, then a single
//! aggregate job over every local job's published output.
//!
//! ## Usage
//!
//! ```bash
//! cidflow run hashes_train.txt -n 2
//! ```
//!
//! ## Modules
//!
//! - `app` - Logging, CLI-level configuration and fatal error reporting
//! - `config` - Workflow configuration with TOML loading and defaults
//! - `error` - Crate-wide error type
//! - `job` - Job types plus the submit / poll / fetch operations
//! - `subprocess` - Process runner abstraction and the execution network client
//! - `workflow` - Input loading, worker pool and the phase orchestrator
pub mod app;
pub mod config;
pub mod error;
pub mod job;
pub mod subprocess;
pub mod workflow;

pub use error::{FlowError, Result};
