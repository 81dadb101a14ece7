//! Shared setup for the binary tests: every test gets its own config file
//! and scope directory, with analytics switched off.

#![allow(dead_code)]

use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use tempfile::TempDir;

pub const TOKEN: &str = "dp.st.dev.cli-test";

pub struct TestHome {
    pub dir: TempDir,
    pub scope: TempDir,
}

impl TestHome {
    pub fn new() -> Result<Self> {
        let home = Self {
            dir: TempDir::new()?,
            scope: TempDir::new()?,
        };
        std::fs::write(home.config_path(), "flags:\n  analytics: false\n")?;
        Ok(home)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join(".doppler.yaml")
    }

    pub fn scope_path(&self) -> &Path {
        self.scope.path()
    }

    pub fn config_text(&self) -> Result<String> {
        Ok(std::fs::read_to_string(self.config_path())?)
    }

    /// The binary with isolated configuration and no `DOPPLER_*` input.
    pub fn doppler(&self) -> Result<assert_cmd::Command> {
        let mut cmd = assert_cmd::Command::cargo_bin("doppler")?;
        cmd.arg("--configuration")
            .arg(self.config_path())
            .arg("--scope")
            .arg(self.scope_path())
            .arg("--no-read-env")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        Ok(cmd)
    }
}
