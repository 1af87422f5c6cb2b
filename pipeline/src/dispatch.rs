//! Strategy lookup keyed on the dependency's ecosystem.

use bump_bundler::{BundlerFileUpdater, BundlerUpdateChecker};
use bump_cargo::{CargoFileUpdater, CargoUpdateChecker};
use bump_core::{FileUpdater, PackageManager, Result, StrategyContext, UpdateChecker};
use bump_docker::{DockerFileUpdater, DockerUpdateChecker};
use bump_pip::{PipFileUpdater, PipUpdateChecker};
use bump_yarn::{YarnFileUpdater, YarnUpdateChecker};

pub fn update_checker(context: StrategyContext) -> Box<dyn UpdateChecker> {
    match context.dependency.package_manager {
        PackageManager::Bundler => Box::new(BundlerUpdateChecker::new(context)),
        PackageManager::Yarn => Box::new(YarnUpdateChecker::new(context)),
        PackageManager::Pip => Box::new(PipUpdateChecker::new(context)),
        PackageManager::Docker => Box::new(DockerUpdateChecker::new(context)),
        PackageManager::Cargo => Box::new(CargoUpdateChecker::new(context)),
    }
}

/// Fails when the files the ecosystem edits aren't in the context
pub fn file_updater(context: StrategyContext) -> Result<Box<dyn FileUpdater>> {
    Ok(match context.dependency.package_manager {
        PackageManager::Bundler => Box::new(BundlerFileUpdater::new(context)?),
        PackageManager::Yarn => Box::new(YarnFileUpdater::new(context)?),
        PackageManager::Pip => Box::new(PipFileUpdater::new(context)?),
        PackageManager::Docker => Box::new(DockerFileUpdater::new(context)?),
        PackageManager::Cargo => Box::new(CargoFileUpdater::new(context)?),
    })
}
