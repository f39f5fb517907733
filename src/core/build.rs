//! `fw build`: refresh shims, regenerate `mod.ts` and bundle it.
//!
//! Bundling and declaration emit are delegated to external tools through the
//! [`Bundler`] trait; [`EsbuildCli`] runs `esbuild` and `tsc` via `npx`.

use std::path::{Component, Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::{
    cli::{AppContext, BuildArgs},
    core::{git::run_tool_inherited, session::Session, umbrella::write_umbrella},
    infra::{
        config::BundleFormat,
        io::remove_dir_if_exists,
        utils::{Paint, PathUtils},
    },
};

/// One bundler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleJob
{
    pub entry: PathBuf,
    pub outfile: PathBuf,
    pub format: BundleFormat,
    /// Package left as an import in the output
    pub external: String,
    pub watch: bool,
}

/// Type-declaration emit into `out_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationJob
{
    pub root: PathBuf,
    pub out_dir: PathBuf,
    pub watch: bool,
}

pub trait Bundler
{
    fn bundle(
        &self,
        job: &BundleJob,
    ) -> Result<()>;

    /// In watch mode this returns once the watcher is running.
    fn emit_declarations(
        &self,
        job: &DeclarationJob,
    ) -> Result<()>;
}

/// `npx esbuild` and `npx tsc` run from the project root.
#[derive(Debug, Default)]
pub struct EsbuildCli;

impl Bundler for EsbuildCli
{
    fn bundle(
        &self,
        job: &BundleJob,
    ) -> Result<()>
    {
        let mut cmd = Command::new("npx");
        cmd.arg("esbuild")
            .arg(&job.entry)
            .arg("--bundle")
            .arg(format!("--outfile={}", job.outfile.display()))
            .arg(format!("--format={}", job.format.as_str()))
            .args(["--platform=node", "--target=node16", "--log-level=info"])
            .arg(format!("--external:{}", job.external));
        if job.watch
        {
            cmd.arg("--watch");
        }
        if let Some(dir) = job.entry.parent()
        {
            cmd.current_dir(dir);
        }

        run_tool_inherited(&mut cmd)
    }

    fn emit_declarations(
        &self,
        job: &DeclarationJob,
    ) -> Result<()>
    {
        let mut cmd = Command::new("npx");
        cmd.current_dir(&job.root).arg("tsc");
        if job.watch
        {
            cmd.args(["--watch", "--preserveWatchOutput"]);
        }
        cmd.arg("--emitDeclarationOnly")
            .arg("--outDir")
            .arg(&job.out_dir)
            .args(["--project", "tsconfig.dts.json"]);

        if job.watch
        {
            let child = cmd.spawn().context("failed to spawn `npx tsc --watch`")?;
            debug!(pid = child.id(), "declaration watcher started");
            return Ok(());
        }
        run_tool_inherited(&mut cmd)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport
{
    pub refreshed_shims: usize,
    pub umbrella_changed: bool,
    pub bundles: Vec<PathBuf>,
    pub declarations: Option<PathBuf>,
}

/// `<out_dir>/<package>.js` or `.cjs`
pub fn bundle_path(
    out_dir: &Path,
    package: &str,
    format: BundleFormat,
) -> PathBuf
{
    out_dir.join(format!("{package}{}", format.extension()))
}

/// Run the whole build. In watch mode only the first configured format is
/// bundled and the call returns when the bundler exits.
pub fn build_project(
    session: &mut Session,
    bundler: &dyn Bundler,
    watch: bool,
) -> Result<BuildReport>
{
    // Wiped below; must stay inside the project
    let configured = &session.env.config.output_dir;
    let inside = configured.components().next().is_some()
        && configured
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !inside || configured.components().all(|c| c == Component::CurDir)
    {
        bail!(
            "output_dir must be a subdirectory of the project, got {}",
            configured.display()
        );
    }

    session.ensure_mirror()?;

    let env = &session.env;
    let refreshed_shims = env
        .rewired_store()
        .refresh(&session.mirror.src_dir(), &session.analyzer)?;
    let umbrella_changed = write_umbrella(env, &session.analyzer)?;

    let out_dir = env.out_dir();
    remove_dir_if_exists(&out_dir)?;

    let mut formats = env.config.formats();
    if watch
    {
        formats.truncate(1);
    }

    let mut report = BuildReport { refreshed_shims, umbrella_changed, ..BuildReport::default() };

    // The watcher for declarations must be up before the bundler blocks
    let dts_job = env
        .config
        .emit_type_declarations
        .then(|| DeclarationJob { root: env.root.clone(), out_dir: out_dir.join("dts"), watch });
    if watch && let Some(job) = &dts_job
    {
        bundler.emit_declarations(job)?;
        report.declarations = Some(job.out_dir.clone());
    }

    for format in formats
    {
        let outfile = bundle_path(&out_dir, &env.config.base_package, format);
        bundler.bundle(&BundleJob {
            entry: env.umbrella_path(),
            outfile: outfile.clone(),
            format,
            external: env.config.base_package.clone(),
            watch,
        })?;
        info!(out = %outfile.display(), format = format.as_str(), "bundled");
        report.bundles.push(outfile);
    }

    if !watch && let Some(job) = &dts_job
    {
        bundler.emit_declarations(job)?;
        report.declarations = Some(job.out_dir.clone());
    }

    Ok(report)
}

pub fn run(
    args: BuildArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut session = Session::open(ctx)?;
    let report = build_project(&mut session, &EsbuildCli, args.watch)?;

    let root = &session.env.root;
    if report.refreshed_shims > 0
    {
        session.say(Paint::note(&format!("Refreshed {} rewired shim(s)", report.refreshed_shims)));
    }
    if report.umbrella_changed
    {
        session.say(Paint::note("Regenerated mod.ts"));
    }
    for bundle in &report.bundles
    {
        session.say(format!("{} {}", Paint::added("built"), PathUtils::relative(root, bundle)));
    }
    if let Some(dts) = &report.declarations
    {
        session.say(format!("{} {}", Paint::added("types"), PathUtils::relative(root, dts)));
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn bundle_names_follow_the_package()
    {
        let out = Path::new("/p/dist");
        assert_eq!(bundle_path(out, "radashi", BundleFormat::Esm), PathBuf::from("/p/dist/radashi.js"));
        assert_eq!(bundle_path(out, "radashi", BundleFormat::Cjs), PathBuf::from("/p/dist/radashi.cjs"));
    }
}
