//! Docker update strategy.
//!
//! Images are updated to the newest tag with the same shape as the one in
//! use (`17.04` to `17.10`, `3.6-slim` to `3.7-slim`). Digest pins follow
//! the tag they were taken from.

pub mod checker;
pub mod dockerfile;
pub mod registry;
pub mod tag;
pub mod updater;

pub use checker::DockerUpdateChecker;
pub use registry::DockerRegistryClient;
pub use updater::DockerFileUpdater;
