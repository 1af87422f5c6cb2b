use crate::error::Result;
use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Prefix for every sandbox directory
pub const TEMP_DIR_PREFIX: &str = "bump_";

/// Create a fresh, uniquely named directory under `scratch_root`, which is
/// created if missing
pub fn create_temporary_directory(scratch_root: &Path) -> Result<TempDir> {
    std::fs::create_dir_all(scratch_root)?;
    let dir = tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .tempdir_in(scratch_root)?;
    debug!(path = %dir.path().display(), "created sandbox directory");
    Ok(dir)
}

/// Run `f` inside a fresh directory that is removed afterwards.
///
/// The directory is removed on success and on error. If the future is
/// dropped before completing, `TempDir`'s destructor still removes it.
pub async fn with_temporary_directory<T, F, Fut>(scratch_root: &Path, f: F) -> Result<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let dir = create_temporary_directory(scratch_root)?;
    let result = f(dir.path().to_path_buf()).await;
    let path = dir.path().to_path_buf();
    if let Err(err) = dir.close() {
        warn!(path = %path.display(), error = %err, "failed to remove sandbox directory");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpdateError;

    #[tokio::test]
    async fn test_directory_removed_after_success() {
        let root = tempfile::tempdir().unwrap();
        let seen = with_temporary_directory(root.path(), |path| async move {
            assert!(path.is_dir());
            assert!(path.file_name().unwrap().to_string_lossy().starts_with("bump_"));
            tokio::fs::write(path.join("Gemfile"), "source 'https://rubygems.org'").await?;
            Ok(path)
        })
        .await
        .unwrap();
        assert!(!seen.exists());
    }

    #[tokio::test]
    async fn test_directory_removed_after_error() {
        let root = tempfile::tempdir().unwrap();
        let mut seen = None;
        let result: Result<()> = with_temporary_directory(root.path(), |path| {
            seen = Some(path);
            async { Err(UpdateError::not_evaluatable("boom")) }
        })
        .await;
        assert!(result.is_err());
        assert!(!seen.unwrap().exists());
    }

    #[tokio::test]
    async fn test_scratch_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("nested").join("tmp");
        with_temporary_directory(&scratch, |_| async { Ok(()) }).await.unwrap();
        assert!(scratch.is_dir());
    }

    #[tokio::test]
    async fn test_concurrent_directories_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let (a, b) = tokio::join!(
            with_temporary_directory(root.path(), |p| async move { Ok(p) }),
            with_temporary_directory(root.path(), |p| async move { Ok(p) }),
        );
        assert_ne!(a.unwrap(), b.unwrap());
    }
}
