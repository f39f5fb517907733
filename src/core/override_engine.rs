//! Override and reset flows.
//!
//! In each flow the steps that can fail without side effects (clean check,
//! mirror sync, query resolution, import analysis) run before the first file
//! is written.

use std::path::PathBuf;

use anyhow::Result;
use indexmap::IndexSet;
use tracing::{debug, info};

use crate::{
    cli::{AppContext, OverrideArgs, OverrideCommand},
    core::{
        error::ForkError,
        git::Author,
        matcher::{QueryMessages, resolve_query},
        project::ProjectState,
        resolver::DependencyResolver,
        rewired::shim_display,
        session::Session,
        source_index::{ArtifactKind, FunctionPath, list_function_paths},
        umbrella::write_umbrella,
    },
    infra::{
        io::{CopyOutcome, copy_if_exists},
        utils::{Paint, PathUtils},
    },
};

/// Paths committed after an override or reset, relative to the root
pub const COMMIT_PATHS: [&str; 2] = ["overrides", "mod.ts"];

/// Pathspec for the pre-override clean check; the mirror is not project state
pub const CLEAN_PATHSPEC: [&str; 2] = [".", ":(exclude).forkwire"];

const OVERRIDE_MESSAGES: QueryMessages<'static> = QueryMessages {
    choose: "Which function do you want to copy?",
    confirm: "Is \"{funcPath}\" the function you want to copy?",
};

/// What happened to each member of an artifact set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport
{
    pub copied: Vec<PathBuf>,
    /// Already present in the override tree; left as is
    pub kept: Vec<PathBuf>,
    /// Not present upstream
    pub missing: Vec<ArtifactKind>,
    /// Present upstream but could not be copied
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideReport
{
    pub function: FunctionPath,
    pub copy: CopyReport,
    /// The function had been rewired and its shim was removed
    pub unrewired: bool,
    /// Dependents rewired by this run
    pub rewired: Vec<FunctionPath>,
    pub committed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetReport
{
    pub before: Vec<FunctionPath>,
    pub after: Vec<FunctionPath>,
    pub committed: bool,
}

impl ResetReport
{
    pub fn changed(&self) -> bool
    {
        self.before != self.after
    }
}

/// Fail with `DirtyWorkingTree` unless the project has no uncommitted changes.
pub fn assert_clean(session: &Session) -> Result<()>
{
    let root = &session.env.root;
    if !session
        .vcs
        .is_clean(root, &CLEAN_PATHSPEC)?
    {
        return Err(ForkError::DirtyWorkingTree { path: root.clone() }.into());
    }
    Ok(())
}

/// Copy every existing artifact of `fp` from `from` into `to`. Existing
/// destination files are kept.
pub fn copy_artifacts(
    fp: &FunctionPath,
    from: &std::path::Path,
    to: &std::path::Path,
) -> CopyReport
{
    let mut report = CopyReport::default();

    for kind in ArtifactKind::ALL
    {
        let dst = kind.path_for(to, fp);
        match copy_if_exists(&kind.path_for(from, fp), &dst, false)
        {
            CopyOutcome::Copied => report.copied.push(dst),
            CopyOutcome::KeptExisting => report.kept.push(dst),
            CopyOutcome::MissingSource => report.missing.push(kind),
            CopyOutcome::Failed(reason) =>
            {
                debug!(dst = %dst.display(), %reason, "artifact skipped");
                report.failed.push((dst, reason));
            }
        }
    }

    report
}

/// Commit whichever of [`COMMIT_PATHS`] changed. Returns whether a commit was
/// made.
fn commit_changes(
    session: &Session,
    message: &str,
) -> Result<bool>
{
    let root = &session.env.root;

    let mut dirty = Vec::new();
    for path in COMMIT_PATHS
    {
        if !session.vcs.is_clean(root, &[path])?
        {
            dirty.push(PathBuf::from(path));
        }
    }

    if dirty.is_empty()
    {
        info!("nothing changed, skipping commit");
        return Ok(false);
    }

    session
        .vcs
        .commit(message, &Author::bot(), &dirty, root)?;
    info!(%message, "committed");
    Ok(true)
}

/// Dependents of `fp` that need a shim: neither overridden nor `fp` itself.
fn dependents_to_rewire(
    resolver: &mut DependencyResolver,
    fp: &FunctionPath,
    state: &ProjectState,
) -> Vec<FunctionPath>
{
    resolver
        .find_dependents(fp.name())
        .into_iter()
        .filter(|d| d != fp && !state.is_overridden(d))
        .collect()
}

/// What [`apply_override`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedOverride
{
    pub copy: CopyReport,
    pub unrewired: bool,
    pub rewired: Vec<FunctionPath>,
}

/// Copy `fp` from the mirror's current checkout into the override tree and
/// rewire its dependents. No clean check, sync or commit.
pub fn apply_override(
    session: &Session,
    fp: &FunctionPath,
) -> Result<AppliedOverride>
{
    let upstream_src = session.mirror.src_dir();

    let state = ProjectState::scan(&session.env)?;
    let mut resolver = DependencyResolver::build(&upstream_src, &session.analyzer)?;
    let to_rewire = dependents_to_rewire(&mut resolver, fp, &state);
    debug!(func = %fp, was = ?state.state_of(fp), dependents = to_rewire.len(), "override planned");

    // Mutations start here
    let store = session.env.rewired_store();
    let unrewired = store.remove(fp)?;

    let copy = copy_artifacts(fp, &session.mirror.dir, &session.env.override_root());
    let rewired = store.add(&to_rewire, &upstream_src, &session.analyzer)?;

    Ok(AppliedOverride { copy, unrewired, rewired })
}

/// Override the upstream function best matching `query`.
pub fn override_function(
    session: &mut Session,
    query: &str,
    exact: bool,
) -> Result<OverrideReport>
{
    assert_clean(session)?;
    session.ensure_mirror()?;

    let candidates: Vec<FunctionPath> = list_function_paths(&session.mirror.src_dir())?
        .into_iter()
        .collect();

    let fp = resolve_query(query, &candidates, exact, session.prompter.as_ref(), &OVERRIDE_MESSAGES)?;
    info!(func = %fp, "override target");

    let applied = apply_override(session, &fp)?;
    write_umbrella(&session.env, &session.analyzer)?;

    let committed = commit_changes(session, &format!("chore: override {fp}"))?;

    Ok(OverrideReport {
        function: fp,
        copy: applied.copy,
        unrewired: applied.unrewired,
        rewired: applied.rewired,
        committed,
    })
}

/// Rebuild the rewired manifest and shims from the current overrides.
pub fn reset_rewired(session: &mut Session) -> Result<ResetReport>
{
    session.ensure_mirror()?;

    let upstream_src = session.mirror.src_dir();
    let state = ProjectState::scan(&session.env)?;
    let mut resolver = DependencyResolver::build(&upstream_src, &session.analyzer)?;

    let mut wanted: IndexSet<FunctionPath> = IndexSet::new();
    for fp in &state.overridden
    {
        wanted.extend(dependents_to_rewire(&mut resolver, fp, &state));
    }

    // Survivors keep their manifest position; new entries go last
    let ordered: Vec<&FunctionPath> = state
        .manifest
        .iter()
        .filter(|fp| wanted.contains(*fp))
        .chain(wanted.iter().filter(|fp| !state.manifest.contains(*fp)))
        .collect();

    let store = session.env.rewired_store();
    store.clear()?;
    store.add(ordered, &upstream_src, &session.analyzer)?;
    write_umbrella(&session.env, &session.analyzer)?;

    let before: Vec<FunctionPath> = state.manifest.into_iter().collect();
    let after: Vec<FunctionPath> = store.load()?.into_iter().collect();

    let committed = if before != after
    {
        commit_changes(session, "chore: update overrides/rewired.json")?
    }
    else
    {
        info!("rewired functions were up to date");
        false
    };

    Ok(ResetReport { before, after, committed })
}

pub fn run(
    args: OverrideArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut session = Session::open(ctx)?;

    match args.command
    {
        Some(OverrideCommand::Reset) =>
        {
            let report = reset_rewired(&mut session)?;
            print_reset(&session, &report);
        }
        None =>
        {
            let query = args
                .query
                .ok_or_else(|| anyhow::anyhow!("missing <QUERY>; name a function or run `fw override reset`"))?;
            let report = override_function(&mut session, &query, args.exact)?;
            print_override(&session, &report);
        }
    }

    Ok(())
}

fn print_override(
    session: &Session,
    report: &OverrideReport,
)
{
    let root = &session.env.root;

    session.say(Paint::heading(&format!("Overriding {}", report.function)));
    for path in &report.copy.copied
    {
        session.say(format!("  {} {}", Paint::added("copied"), PathUtils::relative(root, path)));
    }
    for path in &report.copy.kept
    {
        session.say(format!("  {} {}", Paint::note("kept"), PathUtils::relative(root, path)));
    }
    for (path, reason) in &report.copy.failed
    {
        session.say(format!("  {} {} ({reason})", Paint::warn("skipped"), PathUtils::relative(root, path)));
    }
    if report.unrewired
    {
        session.say(format!("  {} {}", Paint::removed("unrewired"), shim_display(&report.function)));
    }
    for fp in &report.rewired
    {
        session.say(format!("  {} {fp} ({})", Paint::added("rewired"), shim_display(fp)));
    }

    if report.committed
    {
        session.say(Paint::note(&format!("Committed \"chore: override {}\"", report.function)));
    }
    else
    {
        session.say(Paint::note("Nothing changed; no commit made"));
    }
}

fn print_reset(
    session: &Session,
    report: &ResetReport,
)
{
    if !report.changed()
    {
        session.say(Paint::note("Rewired functions are up to date"));
        return;
    }

    for fp in report.after.iter().filter(|fp| !report.before.contains(fp))
    {
        session.say(format!("  {} {fp}", Paint::added("rewired")));
    }
    for fp in report.before.iter().filter(|fp| !report.after.contains(fp))
    {
        session.say(format!("  {} {fp}", Paint::removed("unrewired")));
    }
    session.say(Paint::heading(&format!("{} rewired function(s)", report.after.len())));
}
