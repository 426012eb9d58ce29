//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - A private temporary directory per test
//! - Unique kernel file paths
//! - Project-local config files
//!
//! # Usage
//!
//! ```ignore
//! use segfile_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     let spk = env.kernel_path("orbit.bsp");
//!     // spk lives in a directory removed when env is dropped
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Directory holding kernels created by the test
    pub kernel_dir: PathBuf,
    /// Project root for the test
    pub project_root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let project_root = root.join("project");
        let kernel_dir = root.join("kernels");

        std::fs::create_dir_all(&project_root)?;
        std::fs::create_dir_all(&kernel_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            kernel_dir,
            project_root,
            test_id,
        })
    }

    /// Path for a kernel file that does not exist yet
    pub fn kernel_path(&self, name: &str) -> PathBuf {
        self.kernel_dir.join(format!("t{}-{}", self.test_id, name))
    }

    /// Project config path: `<project>/.segfile/config.toml`
    pub fn project_config_path(&self) -> PathBuf {
        self.project_root.join(".segfile").join("config.toml")
    }

    /// Write a project config file
    pub fn write_project_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.project_config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Create a text file with content under the project root
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.project_root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_directories() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.project_root.exists());
        assert!(env.kernel_dir.exists());
    }

    #[test]
    fn test_kernel_paths_are_unique() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.kernel_path("a.bsp"), env2.kernel_path("a.bsp"));
        assert!(!env1.kernel_path("a.bsp").exists());
    }

    #[test]
    fn test_write_project_config() {
        let env = TestEnvironment::new().unwrap();
        let path = env.write_project_config("[storage]\nline_length = 80\n").unwrap();
        assert!(path.exists());
    }
}
