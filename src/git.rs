use std::io::Write;
use std::path::PathBuf;
use std::process::{Command as GitCommand, Stdio};

use anyhow::{anyhow, Context};
use log::debug;

use crate::error::{AppError, Result};

/// Staged changes as printed by `git diff --staged`. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffText(String);

impl DiffText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What `git commit` reported on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub summary: String,
}

/// The slice of the version-control tool this crate needs.
pub trait Vcs {
    fn is_work_tree(&self) -> bool;

    /// Raw staged diff; may be empty.
    fn staged_diff(&self) -> Result<String>;

    /// Full messages of the last `count` commits, newest first.
    fn recent_messages(&self, count: usize) -> Vec<String>;

    fn commit(&self, message: &str) -> Result<CommitResult>;
}

/// Collect the staged diff, refusing to run outside a work tree.
pub fn collect(vcs: &dyn Vcs) -> Result<DiffText> {
    if !vcs.is_work_tree() {
        return Err(AppError::NotARepository);
    }

    let diff = vcs.staged_diff()?;
    if diff.trim().is_empty() {
        return Err(AppError::NoStagedChanges);
    }

    debug!("Collected staged diff ({} bytes)", diff.len());
    Ok(DiffText(diff))
}

/// Commit the staged changes with exactly `message`.
pub fn commit(vcs: &dyn Vcs, message: &str) -> Result<CommitResult> {
    if message.trim().is_empty() {
        return Err(AppError::CommitFailed(
            "refusing to commit with an empty message".to_string(),
        ));
    }
    vcs.commit(message)
}

/// `git` on the PATH, run in `workdir` (or the current directory).
#[derive(Debug, Default, Clone)]
pub struct GitCli {
    workdir: Option<PathBuf>,
}

impl GitCli {
    pub fn new() -> Self {
        GitCli::default()
    }

    #[cfg(test)]
    pub fn at(workdir: impl Into<PathBuf>) -> Self {
        GitCli {
            workdir: Some(workdir.into()),
        }
    }

    fn command(&self, args: &[&str]) -> GitCommand {
        let mut cmd = GitCommand::new("git");
        cmd.args(args);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run a git command and capture stdout as String.
    fn git_output(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = self
            .command(args)
            .output()
            .with_context(|| format!("failed to run git {:?}", args))?;

        if !output.status.success() {
            return Err(anyhow!(
                "git {:?} exited with status {:?}: {}",
                args,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Vcs for GitCli {
    fn is_work_tree(&self) -> bool {
        match self.git_output(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) => out.trim() == "true",
            Err(e) => {
                debug!("Work tree probe failed: {e}");
                false
            }
        }
    }

    fn staged_diff(&self) -> Result<String> {
        let diff = self.git_output(&["diff", "--staged", "--no-color", "--no-ext-diff"])?;
        Ok(diff)
    }

    fn recent_messages(&self, count: usize) -> Vec<String> {
        let n = count.to_string();
        match self.git_output(&["log", "-n", &n, "--pretty=format:%B%x00"]) {
            Ok(out) => out
                .split('\0')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                debug!("No recent commits available: {e}");
                Vec::new()
            }
        }
    }

    fn commit(&self, message: &str) -> Result<CommitResult> {
        // `whitespace` cleanup keeps lines starting with '#'.
        let mut child = self
            .command(&["commit", "--cleanup=whitespace", "-F", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to run git commit")?;

        if let Some(mut stdin) = child.stdin.take() {
            // git may exit before reading the message; its own error is reported below.
            if let Err(e) = stdin.write_all(message.as_bytes()) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let text = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(AppError::CommitFailed(text));
        }

        Ok(CommitResult {
            summary: stdout.trim().to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeVcs;
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn run_git(dir: &Path, args: &[&str]) {
        let status = GitCommand::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "-q"]);
        run_git(dir.path(), &["config", "user.name", "Test"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "commit.gpgsign", "false"]);
        dir
    }

    #[test]
    fn outside_repo_fails_before_querying_diff() {
        let vcs = FakeVcs {
            outside_repo: true,
            diff: "+added line\n".into(),
            ..Default::default()
        };

        assert!(matches!(collect(&vcs), Err(AppError::NotARepository)));
        assert_eq!(*vcs.diff_queries.borrow(), 0);
    }

    #[test]
    fn empty_diff_is_no_staged_changes() {
        for diff in ["", "\n", "  \n\t"] {
            let vcs = FakeVcs::with_diff(diff);
            assert!(matches!(collect(&vcs), Err(AppError::NoStagedChanges)));
        }
    }

    #[test]
    fn diff_is_returned_verbatim() {
        let vcs = FakeVcs::with_diff("+added line\n");
        assert_eq!(collect(&vcs).unwrap().as_str(), "+added line\n");
    }

    #[test]
    fn empty_message_never_reaches_vcs() {
        let vcs = FakeVcs::with_diff("+x\n");
        assert!(matches!(commit(&vcs, "  \n"), Err(AppError::CommitFailed(_))));
        assert!(vcs.commits.borrow().is_empty());
    }

    #[test]
    fn real_git_outside_work_tree() {
        let dir = TempDir::new().unwrap();
        let git = GitCli::at(dir.path());
        assert!(matches!(collect(&git), Err(AppError::NotARepository)));
    }

    #[test]
    fn real_git_without_staged_changes() {
        let dir = init_repo();
        fs::write(dir.path().join("untracked.txt"), "hello\n").unwrap();
        let git = GitCli::at(dir.path());
        assert!(matches!(collect(&git), Err(AppError::NoStagedChanges)));
    }

    #[test]
    fn real_git_diff_and_commit_keep_message_exact() {
        let dir = init_repo();
        fs::write(dir.path().join("file.txt"), "added line\n").unwrap();
        run_git(dir.path(), &["add", "file.txt"]);

        let git = GitCli::at(dir.path());
        let diff = collect(&git).unwrap();
        assert!(diff.as_str().contains("+added line"));

        let message = "Add new line to file\n\n# Details\n- one file";
        commit(&git, message).unwrap();

        let history = git.recent_messages(5);
        assert_eq!(history, vec![message.to_string()]);
    }

    #[test]
    fn real_git_commit_failure_surfaces_git_text() {
        let dir = init_repo();
        let git = GitCli::at(dir.path());

        let err = commit(&git, "Nothing to see").unwrap_err();
        match err {
            AppError::CommitFailed(text) => assert!(!text.trim().is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn recent_messages_empty_without_history() {
        let dir = init_repo();
        assert!(GitCli::at(dir.path()).recent_messages(5).is_empty());
    }
}
