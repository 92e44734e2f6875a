//! Shared test helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

/// Isolated workspace: its own config file and database
pub struct TestEnv {
    pub tmp: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.yaml"), "").unwrap();
        Self { tmp }
    }

    pub fn db_path(&self) -> PathBuf {
        self.tmp.path().join("forecast.db")
    }

    /// A tft command pointed at this workspace
    pub fn tft(&self) -> Command {
        let mut cmd = Command::new(cargo::cargo_bin!("tft"));
        cmd.current_dir(self.tmp.path())
            .env("TFT_CONFIG", self.tmp.path().join("config.yaml"))
            .env("TFT_DB", self.db_path())
            .env_remove("TFT_SEED")
            .env_remove("TFT_ITERATIONS")
            .env_remove("TFT_LOG")
            .env_remove("TFT_LOG_FORMAT");
        cmd
    }

    /// Write a file into the workspace and return its path
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.tmp.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Run with `-f json` and parse stdout
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.tft().args(["-f", "json"]).args(args).output().unwrap();
        assert!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

pub const SMALL_SCOPE: &str = r#"
target: 12
tasks:
  - estimated_effort: 3
    complexity: low
  - estimated_effort: 2
    complexity: high
  - estimated_effort: 4
"#;

pub const REFERENCE_PIPELINE: &str = r#"
- amount: 50000
  probability: 0.8
- amount: 100000
  probability: 0.5
- amount: 20000
  probability: 0.9
- amount: 200000
  probability: 0.3
"#;
