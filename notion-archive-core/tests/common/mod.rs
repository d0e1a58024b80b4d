#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Once;
use std::time::Duration;

use notion_archive_core::config::{ArchiveConfig, GitIdentity};
use notion_archive_core::export::ExportSettings;

static ISOLATE: Once = Once::new();

/// Keep the developer's global git config (identity, default branch, hooks) out of the tests.
pub fn isolate_git_env() {
    ISOLATE.call_once(|| {
        std::env::set_var("GIT_CONFIG_GLOBAL", "/dev/null");
        std::env::set_var("GIT_CONFIG_NOSYSTEM", "1");
    });
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    isolate_git_env();
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// `git init` with HEAD on an unborn `initial` branch.
pub fn init_repo(dir: &Path) {
    git(dir, &["init", "--quiet"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/initial"]);
}

/// Commit a seed file with a throwaway identity so HEAD exists.
pub fn seed_commit(dir: &Path) {
    std::fs::write(dir.join("README.md"), "archive\n").unwrap();
    git(dir, &["add", "README.md"]);
    git(
        dir,
        &[
            "-c",
            "user.name=seed",
            "-c",
            "user.email=seed@example.com",
            "commit",
            "--quiet",
            "-m",
            "seed",
        ],
    );
}

pub fn commit_count(dir: &Path) -> usize {
    git(dir, &["rev-list", "--count", "HEAD"]).parse().unwrap()
}

pub fn test_config(repo: &Path) -> ArchiveConfig {
    ArchiveConfig {
        notion_token: "secret".into(),
        export_tokens: None,
        target_repo: repo.canonicalize().unwrap(),
        target_subdir: "pdfs".into(),
        branch: "main".into(),
        identity: GitIdentity {
            name: "archiver".into(),
            email: "archiver@example.com".into(),
        },
        remote: "origin".into(),
        auto_push: false,
        api_base_url: "http://127.0.0.1:9".into(),
        export: ExportSettings {
            base_url: "http://127.0.0.1:9".into(),
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_secs(1),
            time_zone: "UTC".into(),
        },
    }
}

pub fn pdf_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
