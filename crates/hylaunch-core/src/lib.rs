//! Core of the hylaunch game launcher.
//!
//! Before each launch the launcher brings a local installation of the game to
//! a runnable state. This crate contains the pieces that do that work:
//!
//! - **Installation**: streaming downloads with retry, SHA-256
//!   verification, zip and tar.gz extraction guarded against path traversal,
//!   and provisioning of the Java runtime and the butler delivery tool
//! - **Patcher**: rewrites the authentication domain inside the client binary
//!   (UTF-16LE) and the server jar (UTF-8), with backups and idempotence markers
//! - **Versions and variant**: remote version queries and the optional
//!   Windows-only replacement client
//! - **Pipeline**: the coordinator that sequences all of the above and reports
//!   progress on a channel
//! - **Configuration**: YAML configuration with environment overrides

pub mod config;
pub mod errors;
pub mod installation;
pub mod patcher;
pub mod pipeline;
pub mod progress;
pub mod variant;
pub mod versions;

pub use config::*;
pub use errors::{PipelineError, TransferError, TransferFailure};
pub use patcher::{DomainPatcher, PatchOutcome, PatchSummary};
pub use pipeline::{FileSync, Pipeline, PipelineReport, PipelineStage, PipelineState, SyncRequest, ToolSync};
pub use progress::{ProgressReporter, TransferProgress};
pub use variant::{VariantInstaller, VariantOutcome};
pub use versions::{check_versions, HttpVersionSource, VersionSource, VersionState};

#[cfg(test)]
pub mod test_utils;
