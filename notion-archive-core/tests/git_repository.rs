mod common;

use common::{commit_count, git, init_repo, isolate_git_env, seed_commit};
use notion_archive_core::config::GitIdentity;
use notion_archive_core::git::GitRepository;
use notion_archive_core::ArchiveError;
use std::fs;
use tempfile::tempdir;

fn identity() -> GitIdentity {
    GitIdentity {
        name: "notion-archiver".into(),
        email: "notion-archiver@example.com".into(),
    }
}

#[test]
fn identity_and_branch_are_established_on_a_fresh_repo() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    let repo = GitRepository::open(dir.path());

    repo.ensure_identity(&identity()).unwrap();
    repo.ensure_branch("main").unwrap();

    assert_eq!(git(dir.path(), &["config", "user.name"]), "notion-archiver");
    assert_eq!(
        git(dir.path(), &["config", "user.email"]),
        "notion-archiver@example.com"
    );
    assert_eq!(git(dir.path(), &["branch", "--show-current"]), "main");
}

#[test]
fn existing_identity_is_left_alone() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    git(dir.path(), &["config", "user.name", "Someone Else"]);
    let repo = GitRepository::open(dir.path());

    repo.ensure_identity(&identity()).unwrap();

    assert_eq!(git(dir.path(), &["config", "user.name"]), "Someone Else");
    assert_eq!(
        git(dir.path(), &["config", "user.email"]),
        "notion-archiver@example.com"
    );
}

#[test]
fn ensure_branch_creates_a_missing_branch() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    seed_commit(dir.path());
    let repo = GitRepository::open(dir.path());
    assert!(!repo.branch_exists("main").unwrap());

    repo.ensure_branch("main").unwrap();

    assert!(repo.branch_exists("main").unwrap());
    assert_eq!(repo.current_branch().unwrap().as_deref(), Some("main"));
}

#[test]
fn ensure_branch_only_checks_out_an_existing_branch() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    seed_commit(dir.path());
    git(dir.path(), &["branch", "main"]);
    let main_tip = git(dir.path(), &["rev-parse", "refs/heads/main"]);
    let branches_before = git(dir.path(), &["branch", "--list"]).lines().count();
    let repo = GitRepository::open(dir.path());

    repo.ensure_branch("main").unwrap();

    assert_eq!(repo.current_branch().unwrap().as_deref(), Some("main"));
    assert_eq!(git(dir.path(), &["rev-parse", "HEAD"]), main_tip);
    assert_eq!(
        git(dir.path(), &["branch", "--list"]).lines().count(),
        branches_before
    );
}

#[test]
fn stage_and_commit_commits_new_files_and_skips_unchanged_ones() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    let repo = GitRepository::open(dir.path());
    repo.ensure_identity(&identity()).unwrap();
    repo.ensure_branch("main").unwrap();

    fs::create_dir(dir.path().join("pdfs")).unwrap();
    let pdf = dir.path().join("pdfs/notes-05-03-2024.pdf");
    fs::write(&pdf, b"%PDF-1.7 first").unwrap();

    assert!(repo.stage_and_commit(&pdf, "backup: upload notes of - Notes").unwrap());
    assert_eq!(commit_count(dir.path()), 1);
    assert_eq!(
        git(dir.path(), &["log", "-1", "--format=%s"]),
        "backup: upload notes of - Notes"
    );

    // Same bytes again: staged, but nothing differs from HEAD.
    fs::write(&pdf, b"%PDF-1.7 first").unwrap();
    assert!(!repo.stage_and_commit(&pdf, "backup: again").unwrap());
    assert_eq!(commit_count(dir.path()), 1);
}

#[test]
fn unrelated_untracked_files_do_not_trigger_a_commit() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    seed_commit(dir.path());
    let repo = GitRepository::open(dir.path());
    repo.ensure_identity(&identity()).unwrap();
    let pdf = dir.path().join("README.md");
    fs::write(dir.path().join("scratch.txt"), b"not archived").unwrap();

    assert!(!repo.stage_and_commit(&pdf, "backup: nothing").unwrap());
    assert_eq!(commit_count(dir.path()), 1);
}

#[test]
fn changes_staged_by_the_user_stay_out_of_the_backup_commit() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    seed_commit(dir.path());
    let repo = GitRepository::open(dir.path());
    repo.ensure_identity(&identity()).unwrap();

    fs::write(dir.path().join("private.txt"), b"work in progress").unwrap();
    git(dir.path(), &["add", "private.txt"]);
    let pdf = dir.path().join("page.pdf");
    fs::write(&pdf, b"%PDF-1.7 page").unwrap();

    assert!(repo.stage_and_commit(&pdf, "backup: upload notes of - Page").unwrap());

    assert_eq!(
        git(dir.path(), &["show", "--name-only", "--format=", "HEAD"]),
        "page.pdf"
    );
    assert_eq!(
        git(dir.path(), &["diff", "--cached", "--name-only"]),
        "private.txt"
    );
}

#[test]
fn shell_metacharacters_in_messages_are_passed_verbatim() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    let repo = GitRepository::open(dir.path());
    repo.ensure_identity(&identity()).unwrap();
    let pdf = dir.path().join("odd \"name\" $(x).pdf");
    fs::write(&pdf, b"%PDF").unwrap();
    let message = "backup: upload notes of - \"quoted\" $(rm -rf /) `tick`";

    assert!(repo.stage_and_commit(&pdf, message).unwrap());
    assert_eq!(git(dir.path(), &["log", "-1", "--format=%s"]), message);
}

#[test]
fn git_failures_surface_as_version_control_errors() {
    isolate_git_env();
    let dir = tempdir().unwrap();
    // Not a repository at all.
    let repo = GitRepository::open(dir.path().join("missing"));

    match repo.ensure_branch("main") {
        Err(ArchiveError::VersionControl { command, .. }) => {
            assert!(command.starts_with("git "), "{command}")
        }
        other => panic!("expected VersionControl error, got {other:?}"),
    }
}

#[test]
fn commit_artifact_pushes_only_when_asked() {
    isolate_git_env();
    let remote = tempdir().unwrap();
    git(remote.path(), &["init", "--quiet", "--bare"]);
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    git(
        dir.path(),
        &["remote", "add", "origin", remote.path().to_str().unwrap()],
    );
    let repo = GitRepository::open(dir.path());

    let first = dir.path().join("a.pdf");
    fs::write(&first, b"a").unwrap();
    let outcome = repo
        .commit_artifact(&identity(), "main", &first, "backup: a", None)
        .unwrap();
    assert!(outcome.committed);
    assert!(!outcome.pushed);
    assert!(!GitRepository::open(remote.path()).branch_exists("main").unwrap());

    let second = dir.path().join("b.pdf");
    fs::write(&second, b"b").unwrap();
    let outcome = repo
        .commit_artifact(&identity(), "main", &second, "backup: b", Some("origin"))
        .unwrap();
    assert!(outcome.committed);
    assert!(outcome.pushed);
    assert_eq!(
        git(remote.path(), &["rev-parse", "refs/heads/main"]),
        git(dir.path(), &["rev-parse", "HEAD"])
    );

    // Nothing new: no commit, so no push either.
    let outcome = repo
        .commit_artifact(&identity(), "main", &second, "backup: b", Some("origin"))
        .unwrap();
    assert!(!outcome.committed);
    assert!(!outcome.pushed);
}
