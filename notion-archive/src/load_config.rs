//! Turns the process environment into an [`ArchiveConfig`].
//!
//! `.env` is loaded by `main` before this runs, so values from the file and from the
//! real environment look the same here. Every failure is a configuration error and
//! aborts before any network or file activity.
use anyhow::{Context, Result};
use notion_archive_core::config::ArchiveConfig;
use tracing::{error, info};

pub fn load_config() -> Result<ArchiveConfig> {
    info!("Loading configuration from environment");
    match ArchiveConfig::from_env() {
        Ok(config) => {
            info!(
                target_repo = %config.target_repo.display(),
                branch = %config.branch,
                "Configuration loaded"
            );
            Ok(config)
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            Err(e).context("invalid configuration (check your .env)")
        }
    }
}
