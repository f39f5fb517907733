//! Rewired manifest and shim files.
//!
//! `overrides/rewired.json` is the ordered list of function paths that have a
//! generated shim under `overrides/rewired/<group>/<name>.ts`. Mutations write
//! shims before the manifest, so an interrupted run can leave an unlisted shim
//! but never a listed function without one; `override reset` repairs either.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexSet;
use tracing::{debug, info};

use crate::{
    core::{
        imports::ImportAnalyzer,
        source_index::{FunctionPath, SOURCE_EXT, source_file},
    },
    infra::io::{copy_if_exists, prune_empty_parents, remove_dir_if_exists, remove_file_if_exists, write_atomic},
};

/// Specifier shims import the aggregated entry point through, relative to
/// `overrides/rewired/<group>/`.
pub const ENTRY_SPECIFIER: &str = "../../../mod";

const SHIM_BANNER: &str = "// Generated by forkwire from the upstream source of this function.\n\
// Its imports of the base package point at this project's entry point so that\n\
// overridden functions are used. Do not edit; run `fw override reset` instead.\n";

/// Ordered set of rewired function paths.
pub type RewiredManifest = IndexSet<FunctionPath>;

/// Reads and writes the manifest together with the shim tree.
#[derive(Debug, Clone)]
pub struct RewiredStore
{
    manifest_path: PathBuf,
    shim_root: PathBuf,
    /// Shared build config copied into the shim tree
    tsconfig: PathBuf,
}

impl RewiredStore
{
    pub fn new(
        manifest_path: PathBuf,
        shim_root: PathBuf,
        tsconfig: PathBuf,
    ) -> Self
    {
        Self { manifest_path, shim_root, tsconfig }
    }

    pub fn manifest_path(&self) -> &Path
    {
        &self.manifest_path
    }

    pub fn shim_root(&self) -> &Path
    {
        &self.shim_root
    }

    pub fn shim_path(
        &self,
        fp: &FunctionPath,
    ) -> PathBuf
    {
        source_file(&self.shim_root, fp)
    }

    /// Current manifest; a missing file is an empty manifest.
    pub fn load(&self) -> Result<RewiredManifest>
    {
        let text = match fs::read_to_string(&self.manifest_path)
        {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexSet::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", self.manifest_path.display())),
        };

        let entries: Vec<FunctionPath> = serde_json::from_str(&text)
            .with_context(|| format!("parse {}", self.manifest_path.display()))?;

        // Duplicates written by hand collapse to their first position
        Ok(entries.into_iter().collect())
    }

    /// Whole-file rewrite with 2-space indentation.
    fn save(
        &self,
        manifest: &RewiredManifest,
    ) -> Result<()>
    {
        let mut json = serde_json::to_string_pretty(manifest).context("serialize rewired manifest")?;
        json.push('\n');
        write_atomic(&self.manifest_path, json.as_bytes())
    }

    /// Generate shims for the entries of `paths` not yet in the manifest and
    /// append them in the given order. Existing entries are left untouched.
    /// Returns the newly added paths.
    pub fn add<'a, I>(
        &self,
        paths: I,
        upstream_src: &Path,
        analyzer: &ImportAnalyzer,
    ) -> Result<Vec<FunctionPath>>
    where
        I: IntoIterator<Item = &'a FunctionPath>,
    {
        let mut manifest = self.load()?;
        let mut added = Vec::new();

        for fp in paths
        {
            if manifest.contains(fp)
            {
                debug!(func = %fp, "already rewired");
                continue;
            }
            self.write_shim(fp, upstream_src, analyzer)?;
            manifest.insert(fp.clone());
            added.push(fp.clone());
        }

        if !added.is_empty()
        {
            self.copy_tsconfig();
            self.save(&manifest)?;
            info!(count = added.len(), "rewired");
        }

        Ok(added)
    }

    /// Drop `fp` from the manifest and delete its shim. Returns whether it was
    /// listed.
    pub fn remove(
        &self,
        fp: &FunctionPath,
    ) -> Result<bool>
    {
        let shim = self.shim_path(fp);
        remove_file_if_exists(&shim)?;
        prune_empty_parents(&shim, &self.shim_root);

        let mut manifest = self.load()?;
        let listed = manifest.shift_remove(fp);
        if listed
        {
            self.save(&manifest)?;
            info!(func = %fp, "rewire undone");
        }

        Ok(listed)
    }

    /// Delete the manifest and the whole shim tree.
    pub fn clear(&self) -> Result<()>
    {
        remove_dir_if_exists(&self.shim_root)?;
        remove_file_if_exists(&self.manifest_path)?;
        Ok(())
    }

    /// Regenerate every listed shim from the current upstream sources.
    /// Returns the number of shims written.
    pub fn refresh(
        &self,
        upstream_src: &Path,
        analyzer: &ImportAnalyzer,
    ) -> Result<usize>
    {
        let manifest = self.load()?;
        for fp in &manifest
        {
            self.write_shim(fp, upstream_src, analyzer)?;
        }
        if !manifest.is_empty()
        {
            self.copy_tsconfig();
        }
        Ok(manifest.len())
    }

    fn write_shim(
        &self,
        fp: &FunctionPath,
        upstream_src: &Path,
        analyzer: &ImportAnalyzer,
    ) -> Result<()>
    {
        let src_file = source_file(upstream_src, fp);
        let source = fs::read_to_string(&src_file)
            .with_context(|| format!("read upstream source {}", src_file.display()))?;

        let body = analyzer.rewrite_base_specifiers(&source, &src_file, ENTRY_SPECIFIER)?;
        let shim = self.shim_path(fp);

        write_atomic(&shim, format!("{SHIM_BANNER}\n{body}").as_bytes())?;
        debug!(func = %fp, shim = %shim.display(), "shim written");
        Ok(())
    }

    fn copy_tsconfig(&self)
    {
        let dst = self.shim_root.join("tsconfig.json");
        let outcome = copy_if_exists(&self.tsconfig, &dst, true);
        debug!(?outcome, "tsconfig copied into shim tree");
    }

    /// Function paths that currently have a shim file.
    pub fn shims_on_disk(&self) -> Result<std::collections::BTreeSet<FunctionPath>>
    {
        crate::core::source_index::list_function_paths(&self.shim_root)
    }
}

/// File name of a shim relative to the shim root, for messages.
pub fn shim_display(fp: &FunctionPath) -> String
{
    format!("overrides/rewired/{fp}{SOURCE_EXT}")
}

#[cfg(test)]
mod tests
{
    use super::*;

    struct Fixture
    {
        _tmp: tempfile::TempDir,
        upstream: PathBuf,
        store: RewiredStore,
    }

    fn fixture() -> Fixture
    {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let upstream = root.join("upstream/src");
        fs::create_dir_all(upstream.join("group")).unwrap();
        fs::write(
            upstream.join("group/x.ts"),
            "import { y } from 'radashi'\nexport function x() { return y() }\n",
        )
        .unwrap();
        fs::write(upstream.join("group/z.ts"), "export function z() {}\n").unwrap();

        let store = RewiredStore::new(
            root.join("overrides/rewired.json"),
            root.join("overrides/rewired"),
            root.join("overrides/src/tsconfig.json"),
        );
        Fixture { _tmp: tmp, upstream, store }
    }

    fn fp(s: &str) -> FunctionPath
    {
        FunctionPath::parse(s).unwrap()
    }

    #[test]
    fn missing_manifest_is_empty()
    {
        let f = fixture();
        assert!(f.store.load().unwrap().is_empty());
    }

    #[test]
    fn add_then_remove_keeps_files_and_manifest_in_step()
    {
        let f = fixture();
        let a = ImportAnalyzer::new("radashi");
        let x = fp("group/x");

        let added = f.store.add([&x, &x], &f.upstream, &a).unwrap();
        assert_eq!(added, vec![x.clone()]);
        assert_eq!(f.store.load().unwrap().into_iter().collect::<Vec<_>>(), vec![x.clone()]);

        let shim = fs::read_to_string(f.store.shim_path(&x)).unwrap();
        assert!(shim.starts_with("// Generated by forkwire"));
        assert!(shim.contains("from '../../../mod'"));

        assert!(f.store.remove(&x).unwrap());
        assert!(f.store.load().unwrap().is_empty());
        assert!(!f.store.shim_path(&x).exists());
        assert!(!f.store.shim_root().join("group").exists());
    }

    #[test]
    fn add_preserves_prior_order_and_skips_known_entries()
    {
        let f = fixture();
        let a = ImportAnalyzer::new("radashi");

        f.store.add([&fp("group/z")], &f.upstream, &a).unwrap();
        let added = f.store.add([&fp("group/x"), &fp("group/z")], &f.upstream, &a).unwrap();

        assert_eq!(added, vec![fp("group/x")]);
        let order: Vec<String> = f.store.load().unwrap().into_iter().map(String::from).collect();
        assert_eq!(order, vec!["group/z", "group/x"]);
    }

    #[test]
    fn manifest_is_pretty_json_with_trailing_newline()
    {
        let f = fixture();
        let a = ImportAnalyzer::new("radashi");
        f.store.add([&fp("group/x")], &f.upstream, &a).unwrap();

        let text = fs::read_to_string(f.store.manifest_path()).unwrap();
        assert_eq!(text, "[\n  \"group/x\"\n]\n");
    }

    #[test]
    fn tsconfig_follows_shims()
    {
        let f = fixture();
        let a = ImportAnalyzer::new("radashi");
        let tsconfig = f.store.tsconfig.clone();
        fs::create_dir_all(tsconfig.parent().unwrap()).unwrap();
        fs::write(&tsconfig, "{}").unwrap();

        f.store.add([&fp("group/x")], &f.upstream, &a).unwrap();
        assert!(f.store.shim_root().join("tsconfig.json").is_file());
    }

    #[test]
    fn clear_removes_everything()
    {
        let f = fixture();
        let a = ImportAnalyzer::new("radashi");
        f.store.add([&fp("group/x")], &f.upstream, &a).unwrap();

        f.store.clear().unwrap();
        assert!(!f.store.manifest_path().exists());
        assert!(!f.store.shim_root().exists());
    }
}
