//! Notifier configuration

use anyhow::Result;
use chrono::NaiveDateTime;
use outage_directory::DirectoryConfig;
use std::env;
use std::path::{Path, PathBuf};

/// Staging directory name format, one directory per run
pub const RUN_DIR_FORMAT: &str = "%y-%m-%d_%H:%M:%S";

/// Run log file name inside the staging directory
pub const RUN_LOG_NAME: &str = "notify.log";

/// Notifier configuration
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Where templates are looked up by name
    pub templates_dir: PathBuf,

    /// Root of the staging area
    pub outbox_dir: PathBuf,

    /// Subject used when no custom subject is given
    pub default_subject: String,

    pub directory: DirectoryConfig,
}

impl NotifierConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = NotifierConfig {
            templates_dir: env::var("TEMPLATES_DIR")
                .unwrap_or_else(|_| "templates".to_string())
                .into(),

            outbox_dir: env::var("OUTBOX_DIR")
                .unwrap_or_else(|_| "outbox".to_string())
                .into(),

            default_subject: env::var("DEFAULT_SUBJECT")
                .unwrap_or_else(|_| "Research Cloud outage".to_string()),

            directory: DirectoryConfig::from_env()?,
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_subject.trim().is_empty() {
            anyhow::bail!("DEFAULT_SUBJECT must not be empty");
        }

        Ok(())
    }

    /// Staging directory for a run started at `started`
    pub fn run_dir(&self, started: NaiveDateTime) -> PathBuf {
        run_dir(&self.outbox_dir, started)
    }
}

pub fn run_dir(outbox: &Path, started: NaiveDateTime) -> PathBuf {
    outbox.join(started.format(RUN_DIR_FORMAT).to_string())
}
