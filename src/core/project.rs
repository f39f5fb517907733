//! Project layout and the per-command state snapshot.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::{
    core::{
        rewired::{RewiredManifest, RewiredStore},
        source_index::{FunctionPath, SourceTree, list_function_paths},
    },
    infra::config::{CONFIG_FILES, Config, load_config},
};

/// Where the mirror lives, relative to the project root
pub const MIRROR_DIR: &str = ".forkwire/upstream";

/// Resolved locations of one project.
#[derive(Debug, Clone)]
pub struct ProjectEnv
{
    pub root: PathBuf,
    pub config: Config,
}

impl ProjectEnv
{
    pub fn new(
        root: PathBuf,
        config: Config,
    ) -> Self
    {
        Self { root, config }
    }

    /// Walk up from `start` to the first directory holding a `package.json`
    /// or a config file, and load its configuration.
    pub fn discover(start: &Path) -> Result<Self>
    {
        let start = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());

        let Some(root) = start.ancestors().find(|dir| is_project_root(dir))
        else
        {
            bail!("No package.json or forkwire.toml found in {} or its parents", start.display());
        };

        debug!(root = %root.display(), "project root");
        let config = load_config(root)?;
        Ok(Self::new(root.to_path_buf(), config))
    }

    pub fn tree_root(
        &self,
        tree: SourceTree,
    ) -> PathBuf
    {
        match tree
        {
            SourceTree::Own => self.root.join("src"),
            SourceTree::Override => self.override_root().join("src"),
            SourceTree::Rewired => self.override_root().join("rewired"),
            SourceTree::Upstream => self.mirror_dir().join("src"),
        }
    }

    /// `overrides/`, mirroring the four-way artifact layout
    pub fn override_root(&self) -> PathBuf
    {
        self.root.join("overrides")
    }

    pub fn manifest_path(&self) -> PathBuf
    {
        self.override_root().join("rewired.json")
    }

    /// Aggregated entry point
    pub fn umbrella_path(&self) -> PathBuf
    {
        self.root.join("mod.ts")
    }

    pub fn mirror_dir(&self) -> PathBuf
    {
        self.root.join(MIRROR_DIR)
    }

    pub fn out_dir(&self) -> PathBuf
    {
        self.root.join(&self.config.output_dir)
    }

    pub fn rewired_store(&self) -> RewiredStore
    {
        RewiredStore::new(
            self.manifest_path(),
            self.tree_root(SourceTree::Rewired),
            self.tree_root(SourceTree::Override).join("tsconfig.json"),
        )
    }
}

fn is_project_root(dir: &Path) -> bool
{
    dir.join("package.json").is_file() || CONFIG_FILES.iter().any(|f| dir.join(f).is_file())
}

/// How one function path relates to the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionState
{
    /// A local copy exists under `overrides/src`
    Overridden,
    /// Listed in the rewired manifest
    Rewired,
    /// Neither
    Plain,
}

/// Disagreements between the manifest and the trees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drift
{
    /// Listed in the manifest without a shim file
    pub missing_shims: Vec<FunctionPath>,
    /// Shim files not listed in the manifest
    pub unlisted_shims: Vec<FunctionPath>,
    /// Both overridden and rewired
    pub conflicts: Vec<FunctionPath>,
}

impl Drift
{
    pub fn is_empty(&self) -> bool
    {
        self.missing_shims.is_empty() && self.unlisted_shims.is_empty() && self.conflicts.is_empty()
    }
}

/// Snapshot of the project trees and manifest, taken once per command.
#[derive(Debug, Clone, Default)]
pub struct ProjectState
{
    pub own: BTreeSet<FunctionPath>,
    pub overridden: BTreeSet<FunctionPath>,
    pub rewired_on_disk: BTreeSet<FunctionPath>,
    pub manifest: RewiredManifest,
}

impl ProjectState
{
    /// Enumerate the own, override and rewired trees concurrently and load the
    /// manifest.
    pub fn scan(env: &ProjectEnv) -> Result<Self>
    {
        let own_root = env.tree_root(SourceTree::Own);
        let override_root = env.tree_root(SourceTree::Override);
        let store = env.rewired_store();

        let (own, (overridden, rewired_on_disk)) = rayon::join(
            || list_function_paths(&own_root),
            || rayon::join(|| list_function_paths(&override_root), || store.shims_on_disk()),
        );

        let state = Self {
            own: own?,
            overridden: overridden?,
            rewired_on_disk: rewired_on_disk?,
            manifest: store.load()?,
        };

        let drift = state.drift();
        if !drift.is_empty()
        {
            warn!(
                missing = drift.missing_shims.len(),
                unlisted = drift.unlisted_shims.len(),
                conflicts = drift.conflicts.len(),
                "rewired state has drifted; `fw override reset` repairs it"
            );
        }

        Ok(state)
    }

    pub fn is_overridden(
        &self,
        fp: &FunctionPath,
    ) -> bool
    {
        self.overridden.contains(fp)
    }

    pub fn is_rewired(
        &self,
        fp: &FunctionPath,
    ) -> bool
    {
        self.manifest.contains(fp)
    }

    pub fn state_of(
        &self,
        fp: &FunctionPath,
    ) -> FunctionState
    {
        if self.is_overridden(fp)
        {
            FunctionState::Overridden
        }
        else if self.is_rewired(fp)
        {
            FunctionState::Rewired
        }
        else
        {
            FunctionState::Plain
        }
    }

    /// Own and overridden function paths, merged.
    pub fn local_functions(&self) -> BTreeSet<FunctionPath>
    {
        self.own
            .union(&self.overridden)
            .cloned()
            .collect()
    }

    pub fn drift(&self) -> Drift
    {
        Drift {
            missing_shims: self
                .manifest
                .iter()
                .filter(|fp| !self.rewired_on_disk.contains(*fp))
                .cloned()
                .collect(),
            unlisted_shims: self
                .rewired_on_disk
                .iter()
                .filter(|fp| !self.manifest.contains(*fp))
                .cloned()
                .collect(),
            conflicts: self
                .manifest
                .iter()
                .filter(|fp| self.overridden.contains(*fp))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use super::*;

    fn touch(
        root: &Path,
        rel: &str,
    )
    {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "export {}\n").unwrap();
    }

    fn fp(s: &str) -> FunctionPath
    {
        FunctionPath::parse(s).unwrap()
    }

    #[test]
    fn discover_walks_up_to_package_json()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("package.json"), "{}").unwrap();
        let nested = tmp.path().join("src/array");
        fs::create_dir_all(&nested).unwrap();

        let env = ProjectEnv::discover(&nested).unwrap();
        assert_eq!(env.root, dunce::canonicalize(tmp.path()).unwrap());
        assert_eq!(env.manifest_path(), env.root.join("overrides/rewired.json"));
    }

    #[test]
    fn scan_classifies_and_reports_drift()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "src/mine/own.ts");
        touch(root, "overrides/src/array/sum.ts");
        touch(root, "overrides/rewired/async/sleep.ts");
        fs::write(root.join("overrides/rewired.json"), "[\"array/sum\", \"array/max\"]").unwrap();

        let env = ProjectEnv::new(root.to_path_buf(), Config::default());
        let state = ProjectState::scan(&env).unwrap();

        assert_eq!(state.state_of(&fp("array/sum")), FunctionState::Overridden);
        assert_eq!(state.state_of(&fp("array/max")), FunctionState::Rewired);
        assert_eq!(state.state_of(&fp("mine/own")), FunctionState::Plain);
        assert_eq!(state.local_functions().len(), 2);

        let drift = state.drift();
        assert_eq!(drift.missing_shims, vec![fp("array/sum"), fp("array/max")]);
        assert_eq!(drift.unlisted_shims, vec![fp("async/sleep")]);
        assert_eq!(drift.conflicts, vec![fp("array/sum")]);
    }
}
