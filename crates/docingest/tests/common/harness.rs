//! Test harness for isolated test execution.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use docingest::config::{Config, ImageOcrConfig};

/// Test harness providing isolated directories for integration tests.
pub struct TestHarness {
    /// Temporary directory containing the input and scratch subdirectories.
    temp_dir: TempDir,
    /// Path to the input directory within temp_dir.
    pub input_dir: PathBuf,
    /// Parent directory for per-document image scratch space.
    pub scratch_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        let scratch_dir = temp_dir.path().join("scratch");

        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        std::fs::create_dir_all(&scratch_dir).expect("Failed to create scratch dir");

        Self {
            temp_dir,
            input_dir,
            scratch_dir,
        }
    }

    /// Get the base temp directory path.
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a test input file to the input directory.
    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Write a config file to the temp directory.
    pub fn write_config(&self, filename: &str, config: &Config) -> PathBuf {
        let path = self.temp_dir.path().join(filename);
        let json = serde_json::to_string_pretty(config).expect("Failed to serialize config");
        std::fs::write(&path, json).expect("Failed to write config file");
        path
    }

    /// Image settings whose converters are guaranteed to be missing, scratch
    /// space inside the harness.
    pub fn image_config(&self) -> ImageOcrConfig {
        ImageOcrConfig {
            scratch_dir: Some(self.scratch_dir.to_string_lossy().to_string()),
            office_command: "docingest-test-missing-soffice".to_string(),
            image_magick_command: "docingest-test-missing-convert".to_string(),
            conversion_timeout_secs: 5,
            ..ImageOcrConfig::default()
        }
    }

    /// Entries left behind in the scratch directory.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.scratch_dir)
            .expect("Failed to read scratch dir")
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_creates_directories() {
        let harness = TestHarness::new();

        assert!(harness.input_dir.exists());
        assert!(harness.scratch_dir.exists());
        assert!(harness.scratch_entries().is_empty());
    }
}
