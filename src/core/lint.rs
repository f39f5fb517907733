//! `fw lint`: biome over the function trees and their overrides, then eslint.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    cli::{AppContext, LintArgs},
    core::{git::run_tool_inherited, project::ProjectEnv},
    infra::utils::Paint,
};

/// Trees checked by biome, each alongside its `overrides/` twin
pub const LINT_ROOTS: [&str; 3] = ["src", "tests", "benchmarks"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintTool
{
    Biome,
    Eslint,
}

impl LintTool
{
    fn label(self) -> &'static str
    {
        match self
        {
            LintTool::Biome => "Biome",
            LintTool::Eslint => "ESLint",
        }
    }
}

/// One `pnpm` invocation run from the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintStep
{
    pub tool: LintTool,
    pub args: Vec<String>,
}

impl LintStep
{
    fn command(
        &self,
        root: &Path,
    ) -> Command
    {
        let mut cmd = Command::new("pnpm");
        cmd.current_dir(root).args(&self.args);
        cmd
    }
}

/// Executables installed under `node_modules/.bin`.
pub fn installed_bins(root: &Path) -> BTreeSet<String>
{
    let Ok(entries) = fs::read_dir(root.join("node_modules/.bin"))
    else
    {
        return BTreeSet::new();
    };

    entries
        .flatten()
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .collect()
}

/// Biome runs only when installed and only over trees that exist. ESLint
/// always runs, through `pnpm dlx` when it is not installed, with the
/// project's own config.
pub fn lint_steps(
    root: &Path,
    files: &[String],
) -> Vec<LintStep>
{
    let bins = installed_bins(root);
    let mut steps = Vec::new();

    if bins.contains("biome")
    {
        let dirs: Vec<String> = LINT_ROOTS
            .iter()
            .flat_map(|tree| [tree.to_string(), format!("overrides/{tree}")])
            .filter(|rel| root.join(rel).is_dir())
            .map(|rel| format!("./{rel}"))
            .collect();

        if dirs.is_empty()
        {
            debug!("no trees for biome to check");
        }
        else
        {
            let args = ["biome", "check"]
                .into_iter()
                .map(String::from)
                .chain(dirs)
                .collect();
            steps.push(LintStep { tool: LintTool::Biome, args });
        }
    }

    let eslint: &[&str] = if bins.contains("eslint") { &["eslint"] } else { &["dlx", "eslint@^9"] };
    let args = eslint
        .iter()
        .map(|s| s.to_string())
        .chain(files.iter().cloned())
        .collect();
    steps.push(LintStep { tool: LintTool::Eslint, args });

    steps
}

/// Run every step in order, stopping at the first failure.
pub fn lint_project(
    env: &ProjectEnv,
    files: &[String],
) -> Result<Vec<LintTool>>
{
    let mut ran = Vec::new();
    for step in lint_steps(&env.root, files)
    {
        let label = step.tool.label();
        run_tool_inherited(&mut step.command(&env.root)).with_context(|| format!("{label} failed to lint."))?;
        info!(tool = label, "lint passed");
        ran.push(step.tool);
    }
    Ok(ran)
}

pub fn run(
    args: LintArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let cwd = std::env::current_dir().context("read current directory")?;
    let env = ProjectEnv::discover(&cwd)?;

    let ran = lint_project(&env, &args.files)?;

    if !ctx.quiet
    {
        let names: Vec<&str> = ran.iter().map(|t| t.label()).collect();
        println!("{} {}", Paint::added("lint passed"), Paint::note(&names.join(", ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn strings(args: &[&str]) -> Vec<String>
    {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn without_local_tools_only_eslint_runs_through_dlx()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src/array")).unwrap();

        let steps = lint_steps(tmp.path(), &strings(&["src/array/sum.ts"]));

        assert_eq!(
            steps,
            vec![LintStep { tool: LintTool::Eslint, args: strings(&["dlx", "eslint@^9", "src/array/sum.ts"]) }]
        );
    }

    #[test]
    fn biome_checks_existing_trees_and_their_overrides()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        for dir in ["node_modules/.bin", "src", "overrides/src", "tests"]
        {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        for bin in ["biome", "eslint"]
        {
            fs::write(root.join("node_modules/.bin").join(bin), "").unwrap();
        }

        let steps = lint_steps(root, &[]);

        assert_eq!(
            steps,
            vec![
                LintStep {
                    tool: LintTool::Biome,
                    args: strings(&["biome", "check", "./src", "./overrides/src", "./tests"]),
                },
                LintStep { tool: LintTool::Eslint, args: strings(&["eslint"]) },
            ]
        );
    }
}
