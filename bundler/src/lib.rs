//! Ruby/Bundler update strategy.
//!
//! Resolution runs Bundler out of process through the ruby helper, against
//! copies of the Gemfile, lockfile and gemspecs with the target gem's
//! requirement loosened. Manifest edits replace only the requirement list
//! of the matching `gem` / `add_dependency` call.

pub mod checker;
pub mod errors;
pub mod grammar;
pub mod lockfile;
pub mod prepare;
pub mod updater;

pub use checker::BundlerUpdateChecker;
pub use prepare::FilePreparer;
pub use updater::BundlerFileUpdater;
