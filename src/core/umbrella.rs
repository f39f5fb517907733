//! Aggregated entry point (`mod.ts`).
//!
//! The file re-exports the upstream package minus every name the project
//! defines itself, followed by the project's own functions, its overrides and
//! the rewired shims.

use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::debug;

use crate::{
    core::{
        imports::{ExportSummary, ImportAnalyzer},
        project::ProjectEnv,
        source_index::{FunctionPath, SourceTree, list_function_paths, source_file},
    },
    infra::io::write_atomic,
};

const HEADER: &str = "// This file is generated by `fw`. Do not edit it by hand.\n";

/// Exports of every function in `tree_root`, in function-path order.
fn tree_exports(
    tree_root: &Path,
    analyzer: &ImportAnalyzer,
) -> Result<Vec<(FunctionPath, ExportSummary)>>
{
    let paths: Vec<FunctionPath> = list_function_paths(tree_root)?
        .into_iter()
        .collect();

    paths
        .into_par_iter()
        .map(|fp| {
            let summary = analyzer.exported_names(&source_file(tree_root, &fp))?;
            Ok((fp, summary))
        })
        .collect()
}

/// `export { a, type B } from 'specifier'`, or `None` when nothing passes.
fn export_line(
    summary: &ExportSummary,
    specifier: &str,
    keep: impl Fn(&str) -> bool,
) -> Option<String>
{
    let mut names: Vec<String> = summary
        .values
        .iter()
        .filter(|n| keep(n))
        .cloned()
        .collect();

    // A name that is both a value and a type is exported once, as a value
    names.extend(
        summary
            .types
            .iter()
            .filter(|n| !summary.values.contains(*n) && keep(n))
            .map(|n| format!("type {n}")),
    );

    if names.is_empty()
    {
        return None;
    }
    names.sort_by(|a, b| a.trim_start_matches("type ").cmp(b.trim_start_matches("type ")));

    Some(format!("export {{ {} }} from '{specifier}'", names.join(", ")))
}

/// Render `mod.ts` for the current trees.
pub fn render_umbrella(
    env: &ProjectEnv,
    analyzer: &ImportAnalyzer,
) -> Result<String>
{
    let ((own, overrides), (rewired, upstream)) = rayon::join(
        || {
            rayon::join(
                || tree_exports(&env.tree_root(SourceTree::Own), analyzer),
                || tree_exports(&env.tree_root(SourceTree::Override), analyzer),
            )
        },
        || {
            rayon::join(
                || tree_exports(&env.tree_root(SourceTree::Rewired), analyzer),
                || tree_exports(&env.tree_root(SourceTree::Upstream), analyzer),
            )
        },
    );
    let (own, overrides, rewired, upstream) = (own?, overrides?, rewired?, upstream?);

    // Names the project defines itself are not forwarded from upstream
    let blocked: BTreeSet<&str> = own
        .iter()
        .chain(&overrides)
        .chain(&rewired)
        .flat_map(|(_, s)| s.all())
        .map(String::as_str)
        .collect();

    let mut forwarded = ExportSummary::default();
    for (_, s) in &upstream
    {
        forwarded.values.extend(s.values.iter().cloned());
        forwarded.types.extend(s.types.iter().cloned());
    }

    let mut code = String::from(HEADER);
    let base = analyzer.base_package();
    if let Some(line) = export_line(&forwarded, base, |n| !blocked.contains(n))
    {
        code.push('\n');
        code.push_str(&line);
        code.push('\n');
    }

    let blocks = [
        ("// Our custom functions.", "./src", &own),
        ("// Our overrides.", "./overrides/src", &overrides),
        ("// Rewired to use our overrides.", "./overrides/rewired", &rewired),
    ];

    for (title, prefix, entries) in blocks
    {
        let lines: Vec<String> = entries
            .iter()
            .filter_map(|(fp, s)| export_line(s, &format!("{prefix}/{fp}"), |_| true))
            .collect();
        if lines.is_empty()
        {
            continue;
        }

        code.push('\n');
        code.push_str(title);
        code.push('\n');
        for line in lines
        {
            code.push_str(&line);
            code.push('\n');
        }
    }

    Ok(code)
}

/// Regenerate `mod.ts`; returns whether its content changed.
pub fn write_umbrella(
    env: &ProjectEnv,
    analyzer: &ImportAnalyzer,
) -> Result<bool>
{
    let code = render_umbrella(env, analyzer)?;
    let path = env.umbrella_path();

    let current = match fs::read_to_string(&path)
    {
        Ok(s) => Some(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };

    if current.as_deref() == Some(code.as_str())
    {
        debug!(path = %path.display(), "entry point unchanged");
        return Ok(false);
    }

    write_atomic(&path, code.as_bytes())?;
    debug!(path = %path.display(), "entry point written");
    Ok(true)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::infra::config::Config;

    fn write(
        root: &Path,
        rel: &str,
        body: &str,
    )
    {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    #[test]
    fn blocks_are_rendered_in_order_and_shadowed_names_dropped()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();

        write(root, ".forkwire/upstream/src/array/sum.ts", "export function sum() {}\n");
        write(root, ".forkwire/upstream/src/async/sleep.ts", "export function sleep() {}\nexport type Ms = number\n");
        write(root, ".forkwire/upstream/src/async/retry.ts", "export function retry() {}\n");
        write(root, "src/mine/hello.ts", "export const hello = 1\n");
        write(root, "overrides/src/array/sum.ts", "export function sum() {}\n");
        write(root, "overrides/rewired/async/retry.ts", "export function retry() {}\n");

        let env = ProjectEnv::new(root.to_path_buf(), Config::default());
        let code = render_umbrella(&env, &ImportAnalyzer::new("radashi")).unwrap();

        let expected = "\
// This file is generated by `fw`. Do not edit it by hand.

export { type Ms, sleep } from 'radashi'

// Our custom functions.
export { hello } from './src/mine/hello'

// Our overrides.
export { sum } from './overrides/src/array/sum'

// Rewired to use our overrides.
export { retry } from './overrides/rewired/async/retry'
";
        assert_eq!(code, expected);
    }

    #[test]
    fn unchanged_entry_point_is_not_rewritten()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "src/mine/hello.ts", "export const hello = 1\n");

        let env = ProjectEnv::new(root.to_path_buf(), Config::default());
        let analyzer = ImportAnalyzer::new("radashi");

        assert!(write_umbrella(&env, &analyzer).unwrap());
        assert!(!write_umbrella(&env, &analyzer).unwrap());
    }
}
