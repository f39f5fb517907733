//! Git integration
//!
//! The engine talks to version control through the [`Vcs`] trait; [`GitCli`]
//! implements it by spawning `git`. Failures surface the tool's stderr
//! verbatim as [`ForkError::ExternalTool`]. The extra operations used only by
//! the pull-request commands live on `GitCli` itself.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::core::error::ForkError;

/// Commit identity for generated commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// The bot identity used for override and rewire commits
    pub fn bot() -> Self {
        Self {
            name: "Radashi Bot".to_string(),
            email: "175859458+radashi-bot@users.noreply.github.com".to_string(),
        }
    }

    /// `Name <email>` as accepted by `git commit --author`
    pub fn signature(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// Version-control operations the engine depends on.
pub trait Vcs {
    /// Clone `url` at `git_ref` into `dest`; shallow clones fetch one branch
    fn clone_repo(&self, url: &str, git_ref: &str, shallow: bool, dest: &Path) -> Result<()>;

    fn fetch(&self, cwd: &Path) -> Result<()>;

    /// Pull `git_ref` from origin
    fn pull(&self, git_ref: &str, cwd: &Path) -> Result<()>;

    fn checkout(&self, git_ref: &str, cwd: &Path) -> Result<()>;

    /// Stage `files` (relative to `cwd`) and commit them
    fn commit(&self, message: &str, author: &Author, files: &[PathBuf], cwd: &Path) -> Result<()>;

    /// No uncommitted changes under `pathspec` (everything when empty)
    fn is_clean(&self, cwd: &Path, pathspec: &[&str]) -> Result<bool>;
}

/// Run `cmd`, returning stdout. Non-zero exits become `ForkError::ExternalTool`.
pub fn run_tool(cmd: &mut Command) -> Result<String> {
    let rendered = render_command(cmd);
    debug!(command = %rendered, "spawn");

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to spawn `{rendered}`"))?;

    if !output.status.success() {
        return Err(ForkError::ExternalTool {
            command: rendered,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        }
        .into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run `cmd` attached to the terminal (for tools that prompt or stream).
pub fn run_tool_inherited(cmd: &mut Command) -> Result<()> {
    let rendered = render_command(cmd);
    debug!(command = %rendered, "spawn (inherited stdio)");

    let status = cmd
        .status()
        .with_context(|| format!("failed to spawn `{rendered}`"))?;

    if !status.success() {
        return Err(ForkError::ExternalTool {
            command: rendered,
            status: status.to_string(),
            stderr: String::new(),
        }
        .into());
    }

    Ok(())
}

fn render_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line of `git diff --name-status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// First letter of the status column (`A`, `M`, `D`, `R`, ...)
    pub status: char,
    pub path: PathBuf,
}

/// Parse `git diff --name-status` output. Renames and copies report the
/// destination path.
pub fn parse_name_status(stdout: &str) -> Vec<FileChange> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            let status = cols.next()?.chars().next()?;
            let path = cols.last()?;
            Some(FileChange {
                status,
                path: PathBuf::from(path),
            })
        })
        .collect()
}

/// `git` on PATH
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn git(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(cwd);
        cmd
    }

    pub fn current_branch(&self, cwd: &Path) -> Result<String> {
        let out = run_tool(self.git(cwd).args(["rev-parse", "--abbrev-ref", "HEAD"]))?;
        Ok(out.trim().to_string())
    }

    /// Create `branch` from HEAD and switch to it; an existing branch is
    /// switched to instead.
    pub fn create_branch(&self, branch: &str, cwd: &Path) -> Result<()> {
        let exists = self
            .git(cwd)
            .args(["rev-parse", "--verify", "--quiet"])
            .arg(format!("refs/heads/{branch}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);

        if exists {
            run_tool(self.git(cwd).args(["checkout", branch]))?;
        } else {
            run_tool(self.git(cwd).args(["checkout", "-b", branch]))?;
        }
        Ok(())
    }

    pub fn rebase(&self, onto: &str, cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).args(["rebase", onto]))?;
        Ok(())
    }

    pub fn diff_name_status(&self, base: &str, cwd: &Path) -> Result<Vec<FileChange>> {
        let out = run_tool(self.git(cwd).args(["diff", base, "--name-status"]))?;
        Ok(parse_name_status(&out))
    }

    pub fn remotes(&self, cwd: &Path) -> Result<Vec<String>> {
        let out = run_tool(self.git(cwd).arg("remote"))?;
        Ok(out.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
    }

    pub fn add_remote(&self, name: &str, url: &str, cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).args(["remote", "add", name, url]))?;
        Ok(())
    }

    pub fn push(&self, remote: &str, branch: &str, cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).args(["push", "-u", remote, branch]))?;
        Ok(())
    }

    /// Push the current branch to its upstream.
    pub fn push_current(&self, cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).arg("push"))?;
        Ok(())
    }

    /// Subject line of the HEAD commit.
    pub fn last_commit_subject(&self, cwd: &Path) -> Result<String> {
        let out = run_tool(self.git(cwd).args(["log", "-1", "--format=%s"]))?;
        Ok(out.trim().to_string())
    }

    /// Stage everything and commit under the user's own identity.
    pub fn commit_all(&self, message: &str, cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).args(["add", "-A"]))?;
        run_tool(self.git(cwd).args(["commit", "-m", message]))?;
        Ok(())
    }
}

impl Vcs for GitCli {
    fn clone_repo(&self, url: &str, git_ref: &str, shallow: bool, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }

        let mut cmd = Command::new("git");
        cmd.arg("clone").arg(url);
        if shallow {
            cmd.args(["--depth", "1", "--branch", git_ref, "--single-branch"]);
        }
        cmd.arg(dest);

        run_tool(&mut cmd)?;
        Ok(())
    }

    fn fetch(&self, cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).args(["fetch", "origin", "--tags"]))?;
        Ok(())
    }

    fn pull(&self, git_ref: &str, cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).args(["pull", "origin", git_ref]))?;
        Ok(())
    }

    fn checkout(&self, git_ref: &str, cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).args(["checkout", git_ref]))?;
        Ok(())
    }

    fn commit(&self, message: &str, author: &Author, files: &[PathBuf], cwd: &Path) -> Result<()> {
        run_tool(self.git(cwd).args(["add", "--all", "--"]).args(files))?;
        run_tool(
            self.git(cwd)
                .args(["commit", "-m", message])
                .arg(format!("--author={}", author.signature())),
        )?;
        Ok(())
    }

    fn is_clean(&self, cwd: &Path, pathspec: &[&str]) -> Result<bool> {
        let mut cmd = self.git(cwd);
        cmd.args(["status", "--porcelain", "--untracked-files=all"]);
        if !pathspec.is_empty() {
            cmd.arg("--").args(pathspec);
        }

        let out = run_tool(&mut cmd)?;
        Ok(out.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_status_reports_destination_of_renames() {
        let out = "M\tsrc/array/sum.ts\nA\tdocs/array/sum.mdx\nR100\tsrc/old.ts\tsrc/async/new.ts\n";
        let changes = parse_name_status(out);

        assert_eq!(
            changes,
            vec![
                FileChange { status: 'M', path: "src/array/sum.ts".into() },
                FileChange { status: 'A', path: "docs/array/sum.mdx".into() },
                FileChange { status: 'R', path: "src/async/new.ts".into() },
            ]
        );
    }

    #[test]
    fn bot_signature_is_git_author_format() {
        assert_eq!(
            Author::bot().signature(),
            "Radashi Bot <175859458+radashi-bot@users.noreply.github.com>"
        );
    }

    #[test]
    fn failed_tool_surfaces_stderr() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = run_tool(Command::new("git").current_dir(tmp.path()).args(["rev-parse", "HEAD"]))
            .unwrap_err();

        match err.downcast_ref::<ForkError>() {
            Some(ForkError::ExternalTool { command, stderr, .. }) => {
                assert_eq!(command, "git rev-parse HEAD");
                assert!(!stderr.is_empty());
            }
            other => panic!("expected ExternalTool, got {other:?}"),
        }
    }
}
