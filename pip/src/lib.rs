//! Python/pip update strategy.
//!
//! pip has no lockfile, so the latest release on PyPI is also the latest
//! resolvable one. requirements.txt pins are rewritten in place at the
//! precision the author used.

pub mod checker;
pub mod grammar;
pub mod pypi;
pub mod requirement;
pub mod updater;

pub use checker::PipUpdateChecker;
pub use pypi::PyPiClient;
pub use updater::PipFileUpdater;
