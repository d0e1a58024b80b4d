//! Git plumbing for the target repository.
//!
//! Every command is a structured `git -C <root> <args...>` invocation; nothing goes
//! through a shell, so titles and paths are never interpreted.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, error, info};

use crate::config::GitIdentity;
use crate::error::{ArchiveError, Result};

/// Result of committing one archived file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub committed: bool,
    pub pushed: bool,
}

/// Handle on an existing git working tree.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn command_line(args: &[&str]) -> String {
        format!("git {}", args.join(" "))
    }

    /// Run git and return its output whatever the exit status.
    fn probe(&self, args: &[&str]) -> Result<Output> {
        debug!(repo = %self.root.display(), args = ?args, "Running git");
        Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|e| {
                error!(error = ?e, args = ?args, "Failed to launch git process");
                ArchiveError::VersionControl {
                    command: Self::command_line(args),
                    status: "not started".into(),
                    stderr: e.to_string(),
                }
            })
    }

    /// Run git and fail on a non-zero exit.
    fn run(&self, args: &[&str]) -> Result<Output> {
        let output = self.probe(args)?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!(
            repo = %self.root.display(),
            args = ?args,
            status = %output.status,
            stderr = %stderr,
            "Git exited with non-zero code"
        );
        Err(ArchiveError::VersionControl {
            command: Self::command_line(args),
            status: output.status.to_string(),
            stderr,
        })
    }

    fn config_value(&self, key: &str) -> Result<Option<String>> {
        let output = self.probe(&["config", "--get", key])?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((output.status.success() && !value.is_empty()).then_some(value))
    }

    /// Set `user.name` / `user.email` locally for whichever is not configured yet.
    pub fn ensure_identity(&self, identity: &GitIdentity) -> Result<()> {
        for (key, value) in [
            ("user.name", identity.name.as_str()),
            ("user.email", identity.email.as_str()),
        ] {
            match self.config_value(key)? {
                Some(existing) => debug!(key, value = %existing, "Git identity already set"),
                None => {
                    self.run(&["config", key, value])?;
                    info!(key, value = %value, "Configured git identity");
                }
            }
        }
        Ok(())
    }

    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let reference = format!("refs/heads/{branch}");
        Ok(self
            .probe(&["rev-parse", "--verify", "--quiet", reference.as_str()])?
            .status
            .success())
    }

    /// Name of the branch HEAD points at, including an unborn one.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let output = self.probe(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((output.status.success() && !name.is_empty()).then_some(name))
    }

    /// Check out `branch`, creating it from the current HEAD when it does not exist.
    pub fn ensure_branch(&self, branch: &str) -> Result<()> {
        if self.branch_exists(branch)? {
            self.run(&["checkout", branch])?;
            info!(branch, "Checked out existing branch");
        } else if self.current_branch()?.as_deref() == Some(branch) {
            // Fresh repository: HEAD already names the branch, it just has no commit yet.
            debug!(branch, "Branch is unborn and already checked out");
        } else {
            self.run(&["checkout", "-b", branch])?;
            info!(branch, "Created and checked out new branch");
        }
        Ok(())
    }

    /// Path relative to the repository root when it lies inside it.
    fn relative(&self, path: &Path) -> PathBuf {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        canonical
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or(canonical)
    }

    /// True when the index differs from HEAD for `pathspec`.
    pub fn has_staged_changes(&self, pathspec: &str) -> Result<bool> {
        let args = ["diff", "--cached", "--quiet", "--", pathspec];
        let output = self.probe(&args)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(ArchiveError::VersionControl {
                command: Self::command_line(&args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    /// Stage `path` and commit only that path. Returns `false` when staging left nothing to commit.
    pub fn stage_and_commit(&self, path: &Path, message: &str) -> Result<bool> {
        let rel = self.relative(path);
        let pathspec = rel.to_string_lossy().to_string();
        self.run(&["add", "--", pathspec.as_str()])?;

        if !self.has_staged_changes(&pathspec)? {
            info!(path = %pathspec, "No changes to commit");
            return Ok(false);
        }

        // Limit the commit to the artifact; anything else already staged stays staged.
        self.run(&["commit", "-m", message, "--only", "--", pathspec.as_str()])?;
        info!(path = %pathspec, message, "Committed archived file");
        Ok(true)
    }

    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", remote, branch])?;
        info!(remote, branch, "Pushed branch");
        Ok(())
    }

    /// Identity, branch, stage + commit, then push when asked and something was committed.
    pub fn commit_artifact(
        &self,
        identity: &GitIdentity,
        branch: &str,
        path: &Path,
        message: &str,
        push: Option<&str>,
    ) -> Result<CommitOutcome> {
        self.ensure_identity(identity)?;
        self.ensure_branch(branch)?;
        let committed = self.stage_and_commit(path, message)?;
        let pushed = match push {
            Some(remote) if committed => {
                self.push(remote, branch)?;
                true
            }
            _ => false,
        };
        Ok(CommitOutcome { committed, pushed })
    }
}
