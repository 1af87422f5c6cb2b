//! Shared building blocks for dependency update strategies: the domain
//! model, version and requirement grammar, requirement rewriting, span
//! based manifest editing, sandboxed process execution and git inspection.

pub mod config;
pub mod credentials;
pub mod editor;
pub mod error;
pub mod git;
pub mod registry;
pub mod requirement;
pub mod rewrite;
pub mod sandbox;
pub mod strategy;
pub mod types;
pub mod version;

// Re-export commonly used types at crate root
pub use config::Config;
pub use credentials::Credential;
pub use error::{Result, UpdateError};
pub use requirement::{Constraint, Operator};
pub use rewrite::{RequirementStyle, RequirementsUpdater};
pub use strategy::{FileUpdater, StrategyContext, UpdateChecker};
pub use types::{
    Dependency, DependencyFile, DependencySource, GitSource, ImageSource, PackageManager, Requirement,
    RequirementRecord, UpdateTarget, VersionResolution,
};
pub use version::{Version, VersionError};
