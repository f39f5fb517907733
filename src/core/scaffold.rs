//! `fw fn add`: scaffold the artifact set of a new function.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::cli::{AppContext, FnCommand};
use crate::core::{
    error::ForkError,
    prompt,
    session::Session,
    source_index::{ArtifactKind, FunctionPath, SourceTree, list_function_paths},
    umbrella::write_umbrella,
};
use crate::infra::{
    io::write_atomic,
    utils::{Paint, PathUtils},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldReport {
    pub function: FunctionPath,
    pub created: Vec<PathBuf>,
    /// Files that already existed and were left alone
    pub kept: Vec<PathBuf>,
}

/// Template for one artifact kind. Type tests are not scaffolded.
pub fn template(kind: ArtifactKind, fp: &FunctionPath, description: &str, base_package: &str) -> Option<String> {
    let (group, name) = (fp.group(), fp.name());

    let body = match kind {
        ArtifactKind::Source => format!(
            "/**
 * Does a thing.
 *
 * @see https://radashi.js.org/reference/{group}/{name}
 * @example
 * ```ts
 * {name}()
 * ```
 */
export function {name}(): void {{}}
"
        ),
        ArtifactKind::Docs => format!(
            "---
title: {name}
description: {description}
---

### Usage

Does a thing. Returns a value.

```ts
import * as _ from '{base_package}'

_.{name}()
```
"
        ),
        ArtifactKind::Tests => format!(
            "import * as _ from '{base_package}'

describe('{name}', () => {{
  test('does a thing', () => {{
    expect(_.{name}()).toBe(undefined)
  }})
}})
"
        ),
        ArtifactKind::Benchmarks => format!(
            "import * as _ from '{base_package}'
import {{ bench }} from 'vitest'

describe('{name}', () => {{
  bench('with no arguments', () => {{
    _.{name}()
  }})
}})
"
        ),
        ArtifactKind::TypeTests => return None,
    };

    Some(body)
}

/// Groups known upstream and in the project, sorted.
pub fn known_groups(session: &Session) -> Result<BTreeSet<String>> {
    let mut groups = BTreeSet::new();
    for tree in [SourceTree::Upstream, SourceTree::Own] {
        for fp in list_function_paths(&session.env.tree_root(tree))? {
            groups.insert(fp.group().to_string());
        }
    }
    Ok(groups)
}

fn pick_group(session: &Session) -> Result<String> {
    let groups: Vec<String> = known_groups(session)?.into_iter().collect();

    let options: Vec<String> = std::iter::once("Create a new group".to_string())
        .chain(groups.iter().cloned())
        .collect();

    let Some(choice) = prompt::choose(session.prompter.as_ref(), "Select a group for the function:", &options)?
    else {
        bail!("a group must be chosen interactively; rerun `fw fn add` in a terminal");
    };

    if choice > 0 {
        return Ok(groups[choice - 1].clone());
    }

    prompt::text(session.prompter.as_ref(), "Enter the name for the new group:")?
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ForkError::Cancelled.into())
}

/// Create the files of a new function `name`, asking for its group.
pub fn add_function(session: &mut Session, name: &str) -> Result<ScaffoldReport> {
    let name = name.trim();
    if name.contains('/') {
        bail!("Function name cannot include slashes.");
    }

    session.ensure_mirror()?;

    let group = pick_group(session)?;
    let fp = FunctionPath::parse(&format!("{group}/{name}"))?;
    let root = session.env.root.clone();
    let base_package = session.env.config.base_package.clone();

    let mut report = ScaffoldReport { function: fp.clone(), created: Vec::new(), kept: Vec::new() };

    for kind in ArtifactKind::ALL {
        let path = kind.path_for(&root, &fp);
        if path.exists() {
            warn!(path = %path.display(), "already exists, skipping");
            report.kept.push(path);
            continue;
        }

        let description = if kind == ArtifactKind::Docs {
            prompt::text(session.prompter.as_ref(), &format!("Enter a description for {name}:"))?
                .unwrap_or_default()
        } else {
            String::new()
        };

        let Some(body) = template(kind, &fp, description.trim(), &base_package) else {
            continue;
        };
        write_atomic(&path, body.as_bytes())?;
        debug!(path = %path.display(), "scaffolded");
        report.created.push(path);
    }

    write_umbrella(&session.env, &session.analyzer)?;
    Ok(report)
}

pub fn run(command: FnCommand, ctx: &AppContext) -> Result<()> {
    let mut session = Session::open(ctx)?;

    match command {
        FnCommand::Add(args) => {
            let report = add_function(&mut session, &args.name)?;
            let root = &session.env.root;
            for path in &report.created {
                session.say(format!("{} {}", Paint::added("created"), PathUtils::relative(root, path)));
            }
            for path in &report.kept {
                session.say(format!("{} {}", Paint::note("exists"), PathUtils::relative(root, path)));
            }
        }
    }

    Ok(())
}
