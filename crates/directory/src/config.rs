//! Directory configuration
//!
//! Loads directory settings from environment variables. When
//! `DIRECTORY_FIXTURE` is set the fixture directory is used, otherwise the
//! compute and identity endpoints plus a token are required.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::info;

use crate::fixture::FixtureDirectory;
use crate::http::HttpDirectory;
use crate::service::DirectoryService;

/// Directory configuration
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    /// JSON fixture to serve the directory from (dry runs)
    pub fixture_path: Option<PathBuf>,

    /// Compute API base URL
    pub compute_url: Option<String>,

    /// Identity API base URL
    pub identity_url: Option<String>,

    /// Pre-issued API token
    pub token: Option<String>,

    /// Page size for paginated instance listings
    pub page_size: Option<usize>,
}

impl DirectoryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = DirectoryConfig {
            fixture_path: env::var("DIRECTORY_FIXTURE").ok().map(PathBuf::from),

            compute_url: env::var("OS_COMPUTE_URL").ok(),

            identity_url: env::var("OS_IDENTITY_URL")
                .or_else(|_| env::var("OS_AUTH_URL"))
                .ok(),

            token: env::var("OS_TOKEN").ok(),

            page_size: env::var("DIRECTORY_PAGE_SIZE")
                .ok()
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("Invalid DIRECTORY_PAGE_SIZE")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.page_size == Some(0) {
            anyhow::bail!("DIRECTORY_PAGE_SIZE must be greater than 0");
        }

        if self.fixture_path.is_none() {
            if self.compute_url.is_none() {
                anyhow::bail!("OS_COMPUTE_URL is required when DIRECTORY_FIXTURE is not set");
            }
            if self.identity_url.is_none() {
                anyhow::bail!("OS_IDENTITY_URL is required when DIRECTORY_FIXTURE is not set");
            }
            if self.token.is_none() {
                anyhow::bail!(
                    "OS_TOKEN is required when DIRECTORY_FIXTURE is not set, have you sourced your openrc?"
                );
            }
        }

        Ok(())
    }

    /// Build the configured directory
    pub async fn connect(&self) -> Result<Box<dyn DirectoryService>> {
        if let Some(path) = &self.fixture_path {
            info!("Using fixture directory: {}", path.display());
            let mut directory = FixtureDirectory::load(path)
                .await
                .with_context(|| format!("Failed to load fixture {}", path.display()))?;
            if let Some(page_size) = self.page_size {
                directory = directory.with_page_size(page_size);
            }
            return Ok(Box::new(directory));
        }

        let (Some(compute_url), Some(identity_url), Some(token)) =
            (&self.compute_url, &self.identity_url, &self.token)
        else {
            anyhow::bail!("Directory endpoints are not configured");
        };

        info!("Using control plane directory: compute={}, identity={}", compute_url, identity_url);
        Ok(Box::new(HttpDirectory::new(
            compute_url.clone(),
            identity_url.clone(),
            token.clone(),
        )))
    }
}
