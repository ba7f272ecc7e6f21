//! Common test utilities and fixtures

use flux_core::lock::LockConfig;
use flux_core::repository::Repository;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// A temporary repository plus a scratch area for input files.
pub struct TestRepo {
    pub temp_dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let repo_root = temp_dir.path().join("repo");
        let repo = Repository::init(&repo_root)
            .expect("failed to init repository")
            .with_lock_config(fast_locks());
        Self { temp_dir, repo }
    }

    /// Write a CSV input file into the scratch area.
    pub fn write_csv(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content).expect("failed to write csv fixture");
        path
    }
}

/// Short timeouts so contention tests finish quickly.
pub fn fast_locks() -> LockConfig {
    LockConfig {
        timeout: Duration::from_secs(5),
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(50),
        stale_after: Duration::from_secs(600),
    }
}

/// A small labeled dataset used across tests.
pub const SAMPLE_CSV: &str = "\
text,label
The Quick Brown Fox,animal
Jumped Over the Lazy Dog,animal
Pack my box with five dozen jugs,misc
";
