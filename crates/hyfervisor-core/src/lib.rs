//! # hyfervisor-core
//!
//! Install and run orchestration for macOS virtual machines.
//!
//! This crate ties the Virtualization.framework bindings in `hyfervisor-vz`
//! to a VM bundle on disk:
//!
//! - [`bundle`]: bundle layout and artifact persistence
//! - [`config`]: layered configuration
//! - [`installer`]: artifact set-up and macOS installation
//! - [`runner`]: booting an installed bundle
//! - [`download`]: restore image download
//!
//! Bundle, configuration and sizing logic is available on every platform;
//! installing and running require Apple Silicon.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod config;
pub mod download;
pub mod error;
pub mod installer;
pub mod machine;
pub mod resources;
pub mod runner;

pub use bundle::VmBundle;
pub use config::Config;
pub use error::{CoreError, Result};
pub use installer::HyfervisorInstaller;
pub use runner::RunOutcome;
