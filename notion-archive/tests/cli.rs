use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const VARS: &[&str] = &[
    "NOTION_TOKEN",
    "NOTION_TOKEN_V2",
    "NOTION_FILE_TOKEN",
    "TARGET_REPO_DIR",
    "TARGET_SUBDIR",
    "TARGET_BRANCH",
    "GIT_USER_NAME",
    "GIT_USER_EMAIL",
    "GIT_AUTO_PUSH",
    "GIT_REMOTE",
    "NOTION_API_BASE_URL",
    "NOTION_EXPORT_BASE_URL",
];

/// A fake target repository: only the `.git` marker matters before any git call.
fn target_repo() -> TempDir {
    let dir = tempdir().expect("temp dir");
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    dir
}

/// The binary with a clean configuration, run from an empty directory so no `.env` is picked up.
fn cli(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("notion-archive").expect("Binary exists");
    cmd.current_dir(workdir);
    for var in VARS {
        cmd.env_remove(var);
    }
    // Nothing in these tests may reach the real API.
    cmd.env("NOTION_API_BASE_URL", "http://127.0.0.1:9")
        .env("NOTION_EXPORT_BASE_URL", "http://127.0.0.1:9");
    cmd
}

#[test]
fn archive_requires_at_least_one_url() {
    let workdir = tempdir().unwrap();
    cli(workdir.path())
        .arg("archive")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URLS>"));
}

#[test]
fn missing_token_fails_before_any_work() {
    let workdir = tempdir().unwrap();
    let repo = target_repo();
    cli(workdir.path())
        .args(["archive", "--dry-run", "https://notion.so/0123456789abcdef0123456789abcdef"])
        .env("TARGET_REPO_DIR", repo.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("NOTION_TOKEN"));
}

#[test]
fn target_without_git_marker_is_rejected() {
    let workdir = tempdir().unwrap();
    let plain = tempdir().unwrap();
    cli(workdir.path())
        .args(["archive", "--dry-run", "https://notion.so/0123456789abcdef0123456789abcdef"])
        .env("NOTION_TOKEN", "secret")
        .env("TARGET_REPO_DIR", plain.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a git repo"));
}

#[test]
fn full_run_without_export_cookies_is_a_configuration_error() {
    let workdir = tempdir().unwrap();
    let repo = target_repo();
    cli(workdir.path())
        .args(["archive", "https://notion.so/0123456789abcdef0123456789abcdef"])
        .env("NOTION_TOKEN", "secret")
        .env("TARGET_REPO_DIR", repo.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("NOTION_TOKEN_V2"));
    assert!(!repo.path().join("pdfs").exists());
}

#[test]
fn invalid_urls_are_reported_and_fail_the_run() {
    let workdir = tempdir().unwrap();
    let repo = target_repo();
    cli(workdir.path())
        .args(["archive", "--dry-run", "https://example.com/abc"])
        .env("NOTION_TOKEN", "secret")
        .env("TARGET_REPO_DIR", repo.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Dry run complete: 1 page(s) checked, 1 failed"))
        .stderr(predicate::str::contains("[error] https://example.com/abc"))
        .stderr(predicate::str::contains("no Notion page id found"));
}

#[test]
fn check_prints_the_resolved_configuration() {
    let workdir = tempdir().unwrap();
    let repo = target_repo();
    cli(workdir.path())
        .arg("check")
        .env("NOTION_TOKEN", "secret")
        .env("TARGET_REPO_DIR", repo.path())
        .env("TARGET_BRANCH", "notes")
        .assert()
        .success()
        .stdout(predicate::str::contains("[check] branch=notes"))
        .stdout(predicate::str::contains("[check] notion_token_length=6"))
        .stdout(predicate::str::contains("[check] export_tokens=missing"))
        .stdout(predicate::str::contains("Configuration OK."));
}
