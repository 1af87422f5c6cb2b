//! Rust/Cargo update strategy.
//!
//! Latest versions come from crates.io with yanked releases skipped.
//! Resolution runs the real `cargo update` inside a sandbox against a copy
//! of the manifest whose target requirement is relaxed to `*`.

pub mod checker;
pub mod cratesio;
pub mod errors;
pub mod lockfile;
pub mod manifest;
pub mod requirement;
pub mod resolver;
pub mod updater;

pub use checker::CargoUpdateChecker;
pub use cratesio::CratesIoClient;
pub use updater::CargoFileUpdater;
