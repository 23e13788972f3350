//! Application paths for cache and run state.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application paths.
///
/// Constructed once per run. Tests inject a temporary root instead of
/// the platform default so isolated stores never collide.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Cache root directory. All namespaces live beneath it.
    pub cache_root: PathBuf,
}

impl AppPaths {
    /// Platform-default cache root for the wxgen application.
    #[must_use]
    pub fn new() -> Self {
        let cache_root = ProjectDirs::from("com", "wxgen", "wxgen").map_or_else(
            || PathBuf::from(".wxgen_cache"),
            |dirs| dirs.cache_dir().to_path_buf(),
        );
        Self { cache_root }
    }

    /// Build paths rooted at an explicit directory.
    #[must_use]
    pub fn with_root(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    /// Path to the per-target refresh state file.
    #[must_use]
    pub fn run_state_file(&self) -> PathBuf {
        self.cache_root.join("run_state.json")
    }

    /// Directory holding write-only prompt snapshots.
    #[must_use]
    pub fn prompt_snapshot_dir(&self) -> PathBuf {
        self.cache_root.join("prompts")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_root_overrides_default() {
        let paths = AppPaths::with_root("/tmp/wx-test");
        assert_eq!(paths.cache_root, PathBuf::from("/tmp/wx-test"));
        assert_eq!(
            paths.run_state_file(),
            PathBuf::from("/tmp/wx-test/run_state.json")
        );
    }
}
