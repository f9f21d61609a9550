//! Filesystem layout for client state.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

const BASE_DIR_NAME: &str = ".expediente";
const CREDENTIALS_FILE: &str = "credentials.json";
const CREDENTIALS_MIRROR_FILE: &str = "credentials.mirror.json";

/// Resolves every on-disk location the client touches.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.expediente)
    base_dir: PathBuf,
}

impl Paths {
    /// Use `~/.expediente` as the base directory.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Use a caller-provided base directory (tests, `--base-dir`).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// ~/.expediente/config.json
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Primary credential file (~/.expediente/credentials.json).
    pub fn credentials_file(&self) -> PathBuf {
        self.base_dir.join(CREDENTIALS_FILE)
    }

    /// Secondary credential file used when storage is mirrored.
    pub fn credentials_mirror_file(&self) -> PathBuf {
        self.base_dir.join(CREDENTIALS_MIRROR_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// JSONL log file (~/.expediente/logs/client.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("client.jsonl")
    }

    /// Create the base and log directories.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
