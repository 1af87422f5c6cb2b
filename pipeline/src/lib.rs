//! Dependency update pipeline.
//!
//! Given a dependency and the files that declare it, [`UpdatePipeline`]
//! picks the strategy for the dependency's ecosystem, asks it for the newest
//! version the whole dependency set resolves with, and returns the files
//! rewritten to that version. Only the targeted declarations change.
//!
//! The library installs no tracing subscriber; callers choose where logs go.

pub mod dispatch;
pub mod pipeline;

pub use bump_core::{
    Config, Credential, Dependency, DependencyFile, DependencySource, GitSource, ImageSource, PackageManager,
    Requirement, RequirementRecord, Result, UpdateError, UpdateTarget,
};
pub use dispatch::{file_updater, update_checker};
pub use pipeline::{UpdateOutcome, UpdatePipeline};
