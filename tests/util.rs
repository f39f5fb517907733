//! Shared test utilities for integration tests
//!
//! A `FakeVcs` that records every call and tracks committed file contents
//! per working directory, and a `Project` fixture with an upstream mirror
//! already checked out under `.forkwire/upstream`.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Result;
use assert_fs::prelude::*;
use forkwire::core::{
    git::{Author, Vcs},
    project::ProjectEnv,
    prompt::ScriptedPrompter,
    session::Session,
};
use forkwire::infra::config::Config;

/// A small upstream library: `avg` and `stats` depend on `sum`, `retry` on
/// `sleep`, and `chain`/`compose` import each other.
pub const UPSTREAM: &[(&str, &str)] = &[
    (
        "src/array/sum.ts",
        "export function sum(xs: number[]): number {\n  return xs.reduce((a, b) => a + b, 0)\n}\n",
    ),
    (
        "src/array/avg.ts",
        "import { sum } from 'radashi'\n\nexport function avg(xs: number[]): number {\n  return sum(xs) / xs.length\n}\n",
    ),
    (
        "src/array/stats.ts",
        "import { avg, sum } from 'radashi'\n\nexport function stats(xs: number[]) {\n  return { avg: avg(xs), sum: sum(xs) }\n}\n",
    ),
    (
        "src/async/sleep.ts",
        "export type Ms = number\n\nexport function sleep(ms: Ms): Promise<void> {\n  return new Promise(resolve => setTimeout(resolve, ms))\n}\n",
    ),
    (
        "src/async/retry.ts",
        "import { sleep } from 'radashi'\n\nexport async function retry(fn: () => Promise<number>): Promise<number> {\n  await sleep(10)\n  return fn()\n}\n",
    ),
    (
        "src/curry/chain.ts",
        "import { compose } from 'radashi'\n\nexport function chain(...fns: any[]) {\n  return compose(...fns.reverse())\n}\n",
    ),
    (
        "src/curry/compose.ts",
        "import { chain } from 'radashi'\n\nexport function compose(...fns: any[]) {\n  return fns.length ? chain(...fns.reverse()) : (x: any) => x\n}\n",
    ),
    ("src/mod.ts", "export * from './array/sum'\n"),
    ("docs/array/sum.mdx", "---\ntitle: sum\n---\n"),
    ("tests/array/sum.test.ts", "import * as _ from 'radashi'\n"),
    ("benchmarks/array/sum.bench.ts", "import * as _ from 'radashi'\n"),
];

type Snapshot = BTreeMap<PathBuf, Vec<u8>>;

/// Every file under `dir` except `.git`, keyed by relative path.
fn snapshot(dir: &Path) -> Snapshot
{
    fn walk(
        base: &Path,
        dir: &Path,
        out: &mut Snapshot,
    )
    {
        let Ok(entries) = fs::read_dir(dir)
        else
        {
            return;
        };
        for entry in entries.flatten()
        {
            let path = entry.path();
            if entry.file_name() == ".git"
            {
                continue;
            }
            if path.is_dir()
            {
                walk(base, &path, out);
            }
            else if let Ok(bytes) = fs::read(&path)
            {
                out.insert(path.strip_prefix(base).unwrap().to_path_buf(), bytes);
            }
        }
    }

    let mut out = Snapshot::new();
    walk(dir, dir, &mut out);
    out
}

/// Minimal git pathspec: plain prefixes, `.` and `:(exclude)<prefix>`.
fn in_pathspec(
    rel: &Path,
    pathspec: &[&str],
) -> bool
{
    let (excluded, included): (Vec<&str>, Vec<&str>) = pathspec
        .iter()
        .copied()
        .partition(|p| p.starts_with(":(exclude)"));

    if excluded
        .iter()
        .any(|p| rel.starts_with(p.trim_start_matches(":(exclude)")))
    {
        return false;
    }
    included.is_empty() || included.iter().any(|p| *p == "." || rel.starts_with(p))
}

fn filtered(
    snap: &Snapshot,
    pathspec: &[&str],
) -> Snapshot
{
    snap.iter()
        .filter(|(rel, _)| in_pathspec(rel, pathspec))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Records calls; cleanliness is computed against the last committed
/// contents of each working directory.
#[derive(Clone, Default)]
pub struct FakeVcs
{
    log: Rc<RefCell<Vec<String>>>,
    committed: Rc<RefCell<HashMap<PathBuf, Snapshot>>>,
}

impl FakeVcs
{
    pub fn log(&self) -> Vec<String>
    {
        self.log.borrow().clone()
    }

    pub fn commits(&self) -> Vec<String>
    {
        self.log()
            .into_iter()
            .filter(|l| l.starts_with("commit "))
            .collect()
    }

    /// Treat everything currently under `cwd` as committed.
    pub fn baseline(
        &self,
        cwd: &Path,
    )
    {
        self.committed
            .borrow_mut()
            .insert(cwd.to_path_buf(), snapshot(cwd));
    }
}

impl Vcs for FakeVcs
{
    fn clone_repo(
        &self,
        url: &str,
        git_ref: &str,
        shallow: bool,
        dest: &Path,
    ) -> Result<()>
    {
        self.log
            .borrow_mut()
            .push(format!("clone {url} {git_ref} shallow={shallow}"));
        fs::create_dir_all(dest.join(".git"))?;
        for (rel, body) in UPSTREAM
        {
            let p = dest.join(rel);
            fs::create_dir_all(p.parent().unwrap())?;
            fs::write(p, body)?;
        }
        Ok(())
    }

    fn fetch(
        &self,
        _cwd: &Path,
    ) -> Result<()>
    {
        self.log.borrow_mut().push("fetch".into());
        Ok(())
    }

    fn pull(
        &self,
        git_ref: &str,
        _cwd: &Path,
    ) -> Result<()>
    {
        self.log.borrow_mut().push(format!("pull {git_ref}"));
        Ok(())
    }

    fn checkout(
        &self,
        git_ref: &str,
        _cwd: &Path,
    ) -> Result<()>
    {
        self.log.borrow_mut().push(format!("checkout {git_ref}"));
        Ok(())
    }

    fn commit(
        &self,
        message: &str,
        author: &Author,
        files: &[PathBuf],
        cwd: &Path,
    ) -> Result<()>
    {
        let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
        self.log
            .borrow_mut()
            .push(format!("commit {message} [{}] by {}", names.join(" "), author.name));

        let current = snapshot(cwd);
        let mut committed = self.committed.borrow_mut();
        let snap = committed.entry(cwd.to_path_buf()).or_default();
        for file in files
        {
            snap.retain(|rel, _| !rel.starts_with(file));
            snap.extend(
                current
                    .iter()
                    .filter(|(rel, _)| rel.starts_with(file))
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        Ok(())
    }

    fn is_clean(
        &self,
        cwd: &Path,
        pathspec: &[&str],
    ) -> Result<bool>
    {
        let committed = self
            .committed
            .borrow()
            .get(cwd)
            .cloned()
            .unwrap_or_default();
        Ok(filtered(&snapshot(cwd), pathspec) == filtered(&committed, pathspec))
    }
}

/// A fork project with `package.json` and a checked-out upstream mirror,
/// everything committed.
pub struct Project
{
    pub tmp: assert_fs::TempDir,
    pub vcs: FakeVcs,
}

impl Project
{
    pub fn new() -> Self
    {
        Self::with_upstream(UPSTREAM)
    }

    pub fn with_upstream(files: &[(&str, &str)]) -> Self
    {
        let tmp = assert_fs::TempDir::new().expect("tempdir");
        tmp.child("package.json")
            .write_str("{ \"name\": \"my-radashi\" }\n")
            .expect("write package.json");

        let mirror = tmp.child(".forkwire/upstream");
        mirror
            .child(".git")
            .create_dir_all()
            .expect("mirror .git");
        for (rel, body) in files
        {
            mirror
                .child(rel)
                .write_str(body)
                .expect("write upstream file");
        }

        let vcs = FakeVcs::default();
        vcs.baseline(tmp.path());
        Self { tmp, vcs }
    }

    pub fn root(&self) -> &Path
    {
        self.tmp.path()
    }

    pub fn env(&self) -> ProjectEnv
    {
        ProjectEnv::new(self.root().to_path_buf(), Config::default())
    }

    pub fn session(
        &self,
        prompter: ScriptedPrompter,
    ) -> Session
    {
        Session::new(self.env(), Box::new(self.vcs.clone()), Box::new(prompter), true)
    }

    pub fn session_with(
        &self,
        config: Config,
        prompter: ScriptedPrompter,
    ) -> Session
    {
        let env = ProjectEnv::new(self.root().to_path_buf(), config);
        Session::new(env, Box::new(self.vcs.clone()), Box::new(prompter), true)
    }

    pub fn write(
        &self,
        rel: &str,
        body: &str,
    )
    {
        self.tmp
            .child(rel)
            .write_str(body)
            .expect("write file");
    }

    pub fn read(
        &self,
        rel: &str,
    ) -> String
    {
        fs::read_to_string(self.root().join(rel)).unwrap_or_else(|e| panic!("read {rel}: {e}"))
    }

    pub fn exists(
        &self,
        rel: &str,
    ) -> bool
    {
        self.root().join(rel).exists()
    }

    /// Commit whatever is in the working tree.
    pub fn commit_all(&self)
    {
        self.vcs.baseline(self.root());
    }

    /// Every file of the project outside the mirror, for before/after checks.
    pub fn tree(&self) -> BTreeMap<PathBuf, Vec<u8>>
    {
        snapshot(self.root())
            .into_iter()
            .filter(|(rel, _)| !rel.starts_with(".forkwire"))
            .collect()
    }
}
