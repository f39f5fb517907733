//! Function paths and the trees that hold them.
//!
//! Every function is identified by a `<group>/<name>` [`FunctionPath`] that is
//! the same across the parallel source, docs, tests and benchmarks trees. This
//! module maps files to function paths and enumerates the function paths of a
//! source tree.

use std::{
    collections::BTreeSet,
    fmt,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{core::error::ForkError, infra::walk::FileWalker};

/// Extension of function source files.
pub const SOURCE_EXT: &str = ".ts";

/// `<group>/<name>` identifier of one function's artifact set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionPath(String);

impl FunctionPath
{
    /// Validate `s` as exactly one group segment and one name segment.
    pub fn parse(s: &str) -> Result<Self, ForkError>
    {
        let mut parts = s.split('/');
        let valid = match (parts.next(), parts.next(), parts.next())
        {
            (Some(g), Some(n), None) => is_segment(g) && is_segment(n),
            _ => false,
        };

        if valid { Ok(Self(s.to_string())) } else { Err(ForkError::InvalidFunctionPath(s.to_string())) }
    }

    /// Derive the function path of `file` inside `tree_root` by stripping the
    /// tree prefix and `ext`. Files outside the root, at the root level, or
    /// nested deeper than one group return `None`.
    pub fn from_file(
        tree_root: &Path,
        file: &Path,
        ext: &str,
    ) -> Option<Self>
    {
        let rel = file.strip_prefix(tree_root).ok()?;
        let mut segs = Vec::with_capacity(2);
        for c in rel.components()
        {
            match c
            {
                Component::Normal(s) => segs.push(s.to_str()?),
                _ => return None,
            }
        }

        let [group, file_name] = segs.as_slice()
        else
        {
            return None;
        };
        let name = file_name.strip_suffix(ext)?;

        Self::parse(&format!("{group}/{name}")).ok()
    }

    pub fn as_str(&self) -> &str
    {
        &self.0
    }

    /// The group segment (`array` in `array/sum`).
    pub fn group(&self) -> &str
    {
        self.0
            .split_once('/')
            .map(|(g, _)| g)
            .unwrap_or_default()
    }

    /// The name segment (`sum` in `array/sum`); also the exported symbol.
    pub fn name(&self) -> &str
    {
        self.0
            .split_once('/')
            .map(|(_, n)| n)
            .unwrap_or_default()
    }

    /// `<root>/<group>/<name><ext>`
    pub fn file_in(
        &self,
        root: &Path,
        ext: &str,
    ) -> PathBuf
    {
        root.join(self.group())
            .join(format!("{}{ext}", self.name()))
    }
}

fn is_segment(s: &str) -> bool
{
    !s.is_empty() && s != "." && s != ".." && !s.contains('\\')
}

impl fmt::Display for FunctionPath
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        f.write_str(&self.0)
    }
}

impl FromStr for FunctionPath
{
    type Err = ForkError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        Self::parse(s)
    }
}

impl TryFrom<String> for FunctionPath
{
    type Error = ForkError;

    fn try_from(s: String) -> Result<Self, Self::Error>
    {
        Self::parse(&s)
    }
}

impl From<FunctionPath> for String
{
    fn from(fp: FunctionPath) -> Self
    {
        fp.0
    }
}

/// Members of an artifact set, each living in its own parallel tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind
{
    Source,
    Docs,
    Tests,
    TypeTests,
    Benchmarks,
}

impl ArtifactKind
{
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Source,
        ArtifactKind::Docs,
        ArtifactKind::Tests,
        ArtifactKind::TypeTests,
        ArtifactKind::Benchmarks,
    ];

    /// Tree directory name relative to a project (or mirror) root.
    pub fn dir(self) -> &'static str
    {
        match self
        {
            ArtifactKind::Source => "src",
            ArtifactKind::Docs => "docs",
            ArtifactKind::Tests | ArtifactKind::TypeTests => "tests",
            ArtifactKind::Benchmarks => "benchmarks",
        }
    }

    pub fn extension(self) -> &'static str
    {
        match self
        {
            ArtifactKind::Source => SOURCE_EXT,
            ArtifactKind::Docs => ".mdx",
            ArtifactKind::Tests => ".test.ts",
            ArtifactKind::TypeTests => ".test-d.ts",
            ArtifactKind::Benchmarks => ".bench.ts",
        }
    }

    /// `<base>/<dir>/<group>/<name><ext>`
    pub fn path_for(
        self,
        base: &Path,
        fp: &FunctionPath,
    ) -> PathBuf
    {
        fp.file_in(&base.join(self.dir()), self.extension())
    }
}

/// The source trees a function can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTree
{
    /// `<root>/src`: functions authored in the fork
    Own,
    /// `<root>/overrides/src`: local copies superseding upstream
    Override,
    /// `<root>/overrides/rewired`: generated shims
    Rewired,
    /// `<mirror>/src`: the upstream library
    Upstream,
}

/// Enumerate the function paths of a source tree rooted at `tree_root`.
///
/// Root-level files (entry points, aggregators) and files nested deeper than
/// `<group>/<name>.ts` are excluded, as are declaration, test and benchmark
/// files that happen to live in the tree.
pub fn list_function_paths(tree_root: &Path) -> anyhow::Result<BTreeSet<FunctionPath>>
{
    let walker = FileWalker::new(&["node_modules".to_string()])?
        .with_suffix(SOURCE_EXT)
        .excluding_suffixes(&[".d.ts", ".test.ts", ".test-d.ts", ".bench.ts"])
        .with_git_ignore(false);

    let mut out = BTreeSet::new();
    for file in walker.walk_files(tree_root)
    {
        match FunctionPath::from_file(tree_root, &file, SOURCE_EXT)
        {
            Some(fp) =>
            {
                out.insert(fp);
            }
            None => debug!(file = %file.display(), "not a <group>/<name> source, skipped"),
        }
    }

    Ok(out)
}

/// Source file of `fp` inside a tree root.
pub fn source_file(
    tree_root: &Path,
    fp: &FunctionPath,
) -> PathBuf
{
    fp.file_in(tree_root, SOURCE_EXT)
}
