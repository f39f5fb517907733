//! `fw pr create` and `fw pr import`.
//!
//! Both commands work inside the upstream mirror: `create` copies the
//! project's functions into it and opens a pull request from there, `import`
//! checks a pull request out there and brings its files into the project.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cli::{AppContext, PrCommand};
use crate::core::{
    error::ForkError,
    git::{FileChange, GitCli, run_tool, run_tool_inherited},
    override_engine::{apply_override, assert_clean},
    project::{ProjectEnv, ProjectState},
    prompt,
    session::Session,
    source_index::{ArtifactKind, FunctionPath, SOURCE_EXT},
    umbrella::write_umbrella,
};
use crate::infra::{
    io::{CopyOutcome, copy_if_exists},
    utils::Paint,
};

/// Remote names accepted as the user's fork, in preference order.
pub const FORK_REMOTES: [&str; 2] = ["fork", "pr"];

/// Conventional Commit types with descriptions, for the title prompt.
pub const COMMIT_TYPES: [(&str, &str); 11] = [
    ("feat", "A new feature"),
    ("fix", "A bug fix"),
    ("docs", "Documentation only changes"),
    ("style", "Changes that do not affect the meaning of the code"),
    ("refactor", "A code change that neither fixes a bug nor adds a feature"),
    ("perf", "A code change that improves performance"),
    ("test", "Adding missing tests or correcting existing tests"),
    ("build", "Changes that affect the build system or external dependencies"),
    ("ci", "Changes to our CI configuration files and scripts"),
    ("chore", "Other changes that don't modify src or test files"),
    ("revert", "Reverts a previous commit"),
];

const GH_MISSING: &str = "the GitHub CLI (gh) is not installed.

Install it with Homebrew:
  brew install gh

or from https://cli.github.com/";

/// The `gh` tool.
#[derive(Debug, Clone, Default)]
pub struct GhCli;

impl GhCli {
    pub fn available(&self) -> bool {
        which::which("gh").is_ok()
    }

    fn gh(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new("gh");
        cmd.current_dir(cwd);
        cmd
    }

    pub fn pr_checkout(&self, number: u64, cwd: &Path) -> Result<()> {
        run_tool_inherited(self.gh(cwd).args(["pr", "checkout"]).arg(number.to_string()))
    }

    /// One field of the checked-out pull request (`title`, `baseRefName`).
    pub fn pr_view_field(&self, field: &str, cwd: &Path) -> Result<String> {
        let out = run_tool(
            self.gh(cwd)
                .args(["pr", "view", "--json", field, "--jq"])
                .arg(format!(".{field}")),
        )?;
        Ok(out.trim().to_string())
    }

    pub fn pr_create(&self, breaking: bool, cwd: &Path) -> Result<()> {
        let mut cmd = self.gh(cwd);
        cmd.args(["pr", "create", "--fill", "--web"]);
        if breaking {
            cmd.arg("--base=next");
        }
        run_tool_inherited(&mut cmd)
    }
}

static CONVENTIONAL_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(build|chore|ci|docs|feat|fix|perf|refactor|revert|style|test)(\([^):]+\))?!?: \S")
        .expect("conventional title pattern compiles")
});

/// Whether `title` follows the Conventional Commits format.
pub fn is_conventional_title(title: &str) -> bool {
    CONVENTIONAL_TITLE.is_match(title)
}

/// A GitHub remote URL, over HTTPS or SSH.
pub fn is_github_url(url: &str) -> bool {
    let url = url.trim();
    (url.starts_with("https://") || url.starts_with("git@") || url.starts_with("ssh://"))
        && url.contains("github.com")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrCreateReport {
    pub branch: String,
    pub copied: Vec<PathBuf>,
    pub remote: String,
    pub breaking: bool,
}

/// Copy every artifact of the project's own and overridden functions into
/// the mirror, overwriting what is there. Returns the mirror paths written.
pub fn export_functions(env: &ProjectEnv, state: &ProjectState, mirror_dir: &Path) -> Vec<PathBuf> {
    let sources = [(&state.own, env.root.clone()), (&state.overridden, env.override_root())];

    let mut written = Vec::new();
    for (functions, base) in sources {
        for fp in functions {
            for kind in ArtifactKind::ALL {
                let dst = kind.path_for(mirror_dir, fp);
                if copy_if_exists(&kind.path_for(&base, fp), &dst, true) == CopyOutcome::Copied {
                    written.push(dst);
                }
            }
        }
    }
    written
}

/// Publish the project's functions as a pull request against upstream.
pub fn create_pull_request(
    session: &mut Session,
    git: &GitCli,
    gh: &GhCli,
    breaking: Option<bool>,
) -> Result<PrCreateReport> {
    let root = session.env.root.clone();

    let branch = git.current_branch(&root)?;
    if branch == "main" {
        bail!("Cannot create a PR from your main branch");
    }

    session.ensure_mirror()?;
    let mirror = session.mirror.dir.clone();
    git.create_branch(&branch, &mirror)?;

    let state = ProjectState::scan(&session.env)?;
    let copied = export_functions(&session.env, &state, &mirror);
    debug!(files = copied.len(), "exported to mirror");

    if session.vcs.is_clean(&mirror, &[])? {
        bail!("Nothing to submit: the upstream mirror has no changes from this project");
    }

    let breaking = match breaking {
        Some(b) => b,
        None => prompt::confirm(session.prompter.as_ref(), "Is this a breaking change?", false)?
            .unwrap_or(false),
    };

    let remotes = git.remotes(&mirror)?;
    let remote = match FORK_REMOTES.iter().find(|r| remotes.iter().any(|have| have == *r)) {
        Some(r) => r.to_string(),
        None => {
            let url = prompt::text(
                session.prompter.as_ref(),
                "Please enter the Git URL for your personal fork on GitHub:",
            )?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no `fork` remote in {}; add one with `git remote add fork <url>`",
                    mirror.display()
                )
            })?;

            if !is_github_url(&url) {
                bail!("\"{}\" is not a GitHub URL", url.trim());
            }
            git.add_remote("pr", url.trim(), &mirror)?;
            info!(url = url.trim(), "added `pr` remote");
            "pr".to_string()
        }
    };

    let subject = git.last_commit_subject(&root)?;
    git.commit_all(&subject, &mirror)?;
    git.push(&remote, &branch, &mirror)?;
    gh.pr_create(breaking, &mirror)?;

    Ok(PrCreateReport { branch, copied, remote, breaking })
}

/// How the files of a pull request map into the project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    /// Added upstream paths, copied into the project root
    pub added: Vec<PathBuf>,
    /// Modified upstream paths, copied into `overrides/`
    pub modified: Vec<PathBuf>,
    /// Functions whose source the PR modifies; overridden from the base branch
    pub to_override: Vec<FunctionPath>,
}

fn is_function_source(path: &Path) -> bool {
    let s = path.to_string_lossy();
    let Some(rest) = s.strip_prefix("src/") else { return false };
    rest.ends_with(SOURCE_EXT) && rest.matches('/').count() == 1
}

fn function_of_source(path: &Path) -> Option<FunctionPath> {
    FunctionPath::from_file(Path::new("src"), path, SOURCE_EXT)
}

/// Decide what to do with each changed file. Function sources are considered
/// first so that collisions are reported for them before anything else.
pub fn plan_import(mut changes: Vec<FileChange>, state: &ProjectState) -> Result<ImportPlan> {
    changes.sort_by(|a, b| {
        is_function_source(&b.path)
            .cmp(&is_function_source(&a.path))
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut plan = ImportPlan::default();
    for change in changes {
        debug!(status = %change.status, path = %change.path.display(), "pr change");

        match change.status {
            'A' => {
                if let Some(fp) = function_of_source(&change.path)
                    && state.own.contains(&fp)
                {
                    bail!(
                        "Cannot import PR. File named \"{}\" is already a source file created by you.",
                        change.path.display()
                    );
                }
                plan.added.push(change.path);
            }
            'M' => {
                if let Some(fp) = function_of_source(&change.path) {
                    if state.is_overridden(&fp) {
                        bail!(
                            "Cannot import PR. File named \"{}\" already exists in the overrides folder.",
                            change.path.display()
                        );
                    }
                    plan.to_override.push(fp);
                }
                plan.modified.push(change.path);
            }
            other => debug!(status = %other, "change ignored"),
        }
    }

    Ok(plan)
}

/// Copy added files into `root` and modified files into `override_root`.
/// Returns the written paths; fails before anything is committed when a copy
/// did not go through.
pub fn copy_planned_files(plan: &ImportPlan, mirror: &Path, root: &Path, override_root: &Path) -> Result<Vec<PathBuf>> {
    let targets = plan
        .added
        .iter()
        .map(|f| (f, root.join(f)))
        .chain(plan.modified.iter().map(|f| (f, override_root.join(f))));

    let mut written = Vec::new();
    let mut failed = Vec::new();
    for (file, dst) in targets {
        match copy_if_exists(&mirror.join(file), &dst, true) {
            CopyOutcome::Copied => written.push(dst),
            CopyOutcome::Failed(reason) => {
                warn!(file = %file.display(), %reason, "pull request file not copied");
                failed.push(file.display().to_string());
            }
            other => debug!(file = %file.display(), ?other, "pull request file skipped"),
        }
    }

    if !failed.is_empty() {
        bail!("could not copy {} from the pull request: {}", failed.len(), failed.join(", "));
    }
    Ok(written)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrImportReport {
    pub number: u64,
    pub base: String,
    pub plan: ImportPlan,
    pub title: String,
}

/// Ask for a Conventional Commit title to replace `title`.
fn conventional_title(session: &Session, title: &str) -> Result<String> {
    if is_conventional_title(title) {
        return Ok(title.to_string());
    }

    session.say(format!("The PR title \"{title}\" does not follow the Conventional Commits format."));

    let options: Vec<String> = COMMIT_TYPES
        .iter()
        .map(|(t, d)| format!("{t}: {d}"))
        .collect();
    let Some(i) = prompt::choose(session.prompter.as_ref(), "Select the type of change:", &options)? else {
        bail!("PR title \"{title}\" is not a Conventional Commit and no terminal is available to fix it");
    };

    let description = prompt::text(session.prompter.as_ref(), "Enter a short description of the change:")?
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or(ForkError::Cancelled)?;

    Ok(format!("{}: {description}", COMMIT_TYPES[i].0))
}

/// Bring pull request `number` from upstream into the project.
pub fn import_pull_request(
    session: &mut Session,
    git: &GitCli,
    gh: &GhCli,
    number: &str,
) -> Result<PrImportReport> {
    let number: u64 = number
        .trim()
        .trim_start_matches('#')
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid PR number \"{number}\""))?;

    if !gh.available() {
        bail!(GH_MISSING);
    }

    assert_clean(session)?;
    session.ensure_mirror()?;

    let root = session.env.root.clone();
    let mirror = session.mirror.dir.clone();

    gh.pr_checkout(number, &mirror)?;
    let pr_branch = git.current_branch(&mirror)?;

    let base = Some(gh.pr_view_field("baseRefName", &mirror)?)
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| "main".to_string());

    git.rebase(&base, &mirror)
        .context("Cannot import a PR if it cannot be rebased onto the upstream branch")?;

    let changes = git.diff_name_status(&base, &mirror)?;
    let state = ProjectState::scan(&session.env)?;
    let plan = plan_import(changes, &state)?;

    // Override modified functions as they are on the base branch, then return
    if !plan.to_override.is_empty() {
        session.vcs.checkout(&base, &mirror)?;
        let result = plan
            .to_override
            .iter()
            .try_for_each(|fp| apply_override(session, fp).map(|_| ()));
        session.vcs.checkout(&pr_branch, &mirror)?;
        result?;
    }

    copy_planned_files(&plan, &mirror, &root, &session.env.override_root())?;

    let title = gh.pr_view_field("title", &mirror)?;
    let title = conventional_title(session, &title)?;

    write_umbrella(&session.env, &session.analyzer)?;
    git.commit_all(&title, &root)?;
    git.push_current(&root)?;

    Ok(PrImportReport { number, base, plan, title })
}

pub fn run(command: PrCommand, ctx: &AppContext) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let (git, gh) = (GitCli::new(), GhCli);

    match command {
        PrCommand::Create(args) => {
            let breaking = args.breaking_change.then_some(true);
            let report = create_pull_request(&mut session, &git, &gh, breaking)?;
            session.say(Paint::heading(&format!(
                "Pushed {} file(s) on `{}` to `{}`",
                report.copied.len(),
                report.branch,
                report.remote
            )));
        }
        PrCommand::Import(args) => {
            let report = import_pull_request(&mut session, &git, &gh, &args.number)?;
            session.say(format!(
                "{} #{} onto {}: {} added, {} modified, {} overridden",
                Paint::added("imported"),
                report.number,
                report.base,
                report.plan.added.len(),
                report.plan.modified.len(),
                report.plan.to_override.len()
            ));
            session.say(Paint::note(&format!("Committed \"{}\"", report.title)));
        }
    }

    Ok(())
}
