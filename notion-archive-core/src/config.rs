use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::{ArchiveError, Result};
use crate::export::{ExportSettings, ExportTokens, REDACTED};

pub const DEFAULT_SUBDIR: &str = "pdfs";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_GIT_NAME: &str = "notion-archiver";
pub const DEFAULT_GIT_EMAIL: &str = "notion-archiver@example.com";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_API_BASE_URL: &str = "https://api.notion.com";
pub const DEFAULT_EXPORT_BASE_URL: &str = "https://www.notion.so";

/// Committer identity written to the target repository when none is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// Everything an archive run needs, read once at startup.
#[derive(Clone)]
pub struct ArchiveConfig {
    pub notion_token: String,
    /// Only required for a full run; a dry run never exports.
    pub export_tokens: Option<ExportTokens>,
    /// Canonical path of the target repository (contains `.git`).
    pub target_repo: PathBuf,
    pub target_subdir: String,
    pub branch: String,
    pub identity: GitIdentity,
    pub remote: String,
    pub auto_push: bool,
    pub api_base_url: String,
    pub export: ExportSettings,
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("notion_token", &REDACTED)
            .field("export_tokens", &self.export_tokens)
            .field("target_repo", &self.target_repo)
            .field("target_subdir", &self.target_subdir)
            .field("branch", &self.branch)
            .field("identity", &self.identity)
            .field("remote", &self.remote)
            .field("auto_push", &self.auto_push)
            .field("api_base_url", &self.api_base_url)
            .field("export", &self.export)
            .finish()
    }
}

impl ArchiveConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let notion_token = var("NOTION_TOKEN").ok_or_else(|| {
            error!("NOTION_TOKEN environment variable not set");
            ArchiveError::Configuration("missing NOTION_TOKEN".into())
        })?;

        let export_tokens = match (var("NOTION_TOKEN_V2"), var("NOTION_FILE_TOKEN")) {
            (Some(token_v2), Some(file_token)) => Some(ExportTokens {
                token_v2,
                file_token,
            }),
            _ => {
                debug!("Export cookies not configured; only dry runs are possible");
                None
            }
        };

        let raw_repo = var("TARGET_REPO_DIR").ok_or_else(|| {
            error!("TARGET_REPO_DIR environment variable not set");
            ArchiveError::Configuration("missing TARGET_REPO_DIR".into())
        })?;
        let target_repo = resolve_target_repo(&raw_repo)?;

        let target_subdir = or_default("TARGET_SUBDIR", DEFAULT_SUBDIR);
        let escapes = target_subdir.split(['/', '\\']).any(|c| c == "..");
        if Path::new(&target_subdir).is_absolute() || escapes {
            error!(subdir = %target_subdir, "TARGET_SUBDIR escapes the repository");
            return Err(ArchiveError::Configuration(format!(
                "TARGET_SUBDIR must be a relative path inside the repository, got {target_subdir:?}"
            )));
        }

        let branch = or_default("TARGET_BRANCH", DEFAULT_BRANCH);
        if branch.starts_with('-') || branch.chars().any(char::is_whitespace) {
            error!(branch = %branch, "Invalid TARGET_BRANCH");
            return Err(ArchiveError::Configuration(format!(
                "invalid TARGET_BRANCH {branch:?}"
            )));
        }

        let remote = or_default("GIT_REMOTE", DEFAULT_REMOTE);
        if remote.starts_with('-') {
            return Err(ArchiveError::Configuration(format!(
                "invalid GIT_REMOTE {remote:?}"
            )));
        }

        let auto_push = match var("GIT_AUTO_PUSH") {
            None => false,
            Some(v) => parse_bool(&v).ok_or_else(|| {
                error!(value = %v, "GIT_AUTO_PUSH must be a boolean");
                ArchiveError::Configuration(format!("GIT_AUTO_PUSH must be a boolean, got {v:?}"))
            })?,
        };

        let export = ExportSettings {
            base_url: or_default("NOTION_EXPORT_BASE_URL", DEFAULT_EXPORT_BASE_URL),
            poll_interval: Duration::from_secs(parse_secs(&var, "NOTION_EXPORT_POLL_SECS", 2)?),
            timeout: Duration::from_secs(parse_secs(&var, "NOTION_EXPORT_TIMEOUT_SECS", 300)?),
            time_zone: or_default("NOTION_EXPORT_TIMEZONE", "UTC"),
        };

        let config = ArchiveConfig {
            notion_token,
            export_tokens,
            target_repo,
            target_subdir,
            branch,
            identity: GitIdentity {
                name: or_default("GIT_USER_NAME", DEFAULT_GIT_NAME),
                email: or_default("GIT_USER_EMAIL", DEFAULT_GIT_EMAIL),
            },
            remote,
            auto_push,
            api_base_url: or_default("NOTION_API_BASE_URL", DEFAULT_API_BASE_URL),
            export,
        };
        config.trace_loaded();
        Ok(config)
    }

    /// Export cookies, or a configuration error when a full run is attempted without them.
    pub fn require_export_tokens(&self) -> Result<&ExportTokens> {
        self.export_tokens.as_ref().ok_or_else(|| {
            error!("NOTION_TOKEN_V2 or NOTION_FILE_TOKEN environment variable not set");
            ArchiveError::Configuration("missing NOTION_TOKEN_V2 or NOTION_FILE_TOKEN".into())
        })
    }

    /// Directory inside the target repository receiving the PDFs.
    pub fn output_dir(&self) -> PathBuf {
        self.target_repo.join(&self.target_subdir)
    }

    pub fn trace_loaded(&self) {
        info!(
            target_repo = %self.target_repo.display(),
            subdir = %self.target_subdir,
            branch = %self.branch,
            auto_push = self.auto_push,
            export_tokens = self.export_tokens.is_some(),
            "Loaded ArchiveConfig"
        );
    }
}

/// Expand `~`, require the directory and its `.git` marker, canonicalise.
fn resolve_target_repo(raw: &str) -> Result<PathBuf> {
    let expanded = expand_home(raw)?;
    if !expanded.is_dir() {
        error!(path = %expanded.display(), "Target path does not exist");
        return Err(ArchiveError::Configuration(format!(
            "target path does not exist: {}",
            expanded.display()
        )));
    }
    if !expanded.join(".git").exists() {
        error!(path = %expanded.display(), "Target is not a git repository");
        return Err(ArchiveError::Configuration(format!(
            "{} is not a git repo (no .git found)",
            expanded.display()
        )));
    }
    expanded
        .canonicalize()
        .map_err(|e| ArchiveError::io(format!("resolving {}", expanded.display()), e))
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    let rest = match raw.strip_prefix('~') {
        None => return Ok(PathBuf::from(raw)),
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        Some(_) => return Ok(PathBuf::from(raw)),
    };
    let home = directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| {
            ArchiveError::Configuration(format!("cannot expand {raw:?}: no home directory"))
        })?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_secs<F>(var: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(v) => v.trim().parse::<u64>().map_err(|e| {
            error!(error = ?e, key, value = %v, "Expected a whole number of seconds");
            ArchiveError::Configuration(format!("{key} must be a whole number of seconds: {e}"))
        }),
    }
}
