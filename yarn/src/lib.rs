//! JavaScript/Yarn update strategy.
//!
//! Latest versions come straight from the npm registry. package.json is
//! edited in place; yarn.lock is regenerated by the javascript helper.

pub mod checker;
pub mod errors;
pub mod manifest;
pub mod npm;
pub mod requirement;
pub mod updater;

pub use checker::YarnUpdateChecker;
pub use npm::NpmClient;
pub use updater::YarnFileUpdater;
