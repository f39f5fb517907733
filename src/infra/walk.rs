//! Filepath: src/infra/walk.rs
//! Source-tree walker built on ripgrep's `ignore` crate.
//! - Optional .gitignore handling (off for generated trees that users
//!   commonly ignore, such as `overrides/rewired`)
//! - Extra ignore globs (early prune + late filter)
//! - File-name suffix filtering (`.ts`, `.test.ts`, ...)
//! - Deterministic ordering for stable manifests and tests

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// Walker over one tree root with suffix and glob filters.
pub struct FileWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Keep only files whose name ends with this suffix
    suffix: Option<String>,

    /// Drop files whose name ends with any of these suffixes
    excluded_suffixes: Vec<String>,

    /// Respect .gitignore / .git/info/exclude; default true
    git_ignore: bool,

    /// Include hidden (dot) files; default false
    include_hidden: bool,
}

impl FileWalker
{
    /// Build a walker with additional ignore patterns (e.g. "node_modules/**").
    /// Patterns match on paths relative to the walked root.
    pub fn new(additional_ignores: &[String]) -> Result<Self>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in additional_ignores
        {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            ignore_patterns: builder.build()?,
            suffix: None,
            excluded_suffixes: Vec::new(),
            git_ignore: true,
            include_hidden: false,
        })
    }

    /// Keep only files ending with `suffix` (e.g. ".ts").
    pub fn with_suffix(
        mut self,
        suffix: &str,
    ) -> Self
    {
        self.suffix = Some(suffix.to_string());
        self
    }

    /// Drop files ending with any of `suffixes` (e.g. ".d.ts").
    pub fn excluding_suffixes(
        mut self,
        suffixes: &[&str],
    ) -> Self
    {
        self.excluded_suffixes = suffixes
            .iter()
            .map(|s| s.to_string())
            .collect();
        self
    }

    /// Respect or bypass ignore files.
    pub fn with_git_ignore(
        mut self,
        enabled: bool,
    ) -> Self
    {
        self.git_ignore = enabled;
        self
    }

    /// Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) skips dotfiles
        b.hidden(!self.include_hidden);

        b.git_ignore(self.git_ignore);
        b.git_global(self.git_ignore);
        b.git_exclude(self.git_ignore);
        b.ignore(self.git_ignore);
        b.parents(self.git_ignore);
        b.follow_links(false);

        // Early directory pruning using extra ignores
        let extra = self.ignore_patterns.clone();
        let base = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);

            if !is_dir
            {
                return true;
            }

            let rel = ent
                .path()
                .strip_prefix(&base)
                .unwrap_or(ent.path());
            !extra.is_match(rel)
        });

        b
    }

    fn keep_name(
        &self,
        name: &str,
    ) -> bool
    {
        if let Some(suffix) = &self.suffix
            && !name.ends_with(suffix.as_str())
        {
            return false;
        }

        !self
            .excluded_suffixes
            .iter()
            .any(|s| name.ends_with(s.as_str()))
    }

    /// Traverse files under `root`. A missing root yields no files.
    /// Returns a **sorted** list of absolute file paths.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        if !root_path.is_dir()
        {
            return Vec::new();
        }

        let mut out: Vec<PathBuf> = self
            .build_walk(root_path)
            .build()
            .filter_map(|res| res.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(|entry| entry.into_path())
            .filter(|abs| {
                abs.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| self.keep_name(n))
            })
            .filter(|abs| {
                let rel = abs
                    .strip_prefix(root_path)
                    .unwrap_or(abs);
                !self
                    .ignore_patterns
                    .is_match(rel)
            })
            .collect();

        out.sort();

        out
    }
}
