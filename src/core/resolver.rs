//! Reverse-dependency closure over the upstream source tree.
//!
//! The resolver indexes, once, which function paths import each base-package
//! symbol, then answers "who depends on `symbol`" with a worklist traversal.
//! A function is identified by its bare name when it is in turn imported, so
//! the traversal follows `<group>/<name>` → `name` → importers of `name`.

use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    path::Path,
};

use anyhow::Result;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::{
    imports::ImportAnalyzer,
    source_index::{FunctionPath, list_function_paths, source_file},
};

/// Reverse import index of one source tree.
pub struct DependencyResolver
{
    /// symbol → function paths importing it, sorted
    importers: HashMap<String, Vec<FunctionPath>>,
    /// target symbol → dependents
    memo: HashMap<String, BTreeSet<FunctionPath>>,
}

impl DependencyResolver
{
    /// Analyze every function source under `tree_root`.
    ///
    /// Files are parsed in parallel; the first parse failure aborts the build
    /// so that no dependency edge is silently lost.
    pub fn build(
        tree_root: &Path,
        analyzer: &ImportAnalyzer,
    ) -> Result<Self>
    {
        let paths: Vec<FunctionPath> = list_function_paths(tree_root)?
            .into_iter()
            .collect();

        let summaries = paths
            .par_iter()
            .map(|fp| {
                analyzer
                    .imported_symbols(&source_file(tree_root, fp))
                    .map(|symbols| (fp, symbols))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut importers: HashMap<String, Vec<FunctionPath>> = HashMap::new();
        for (fp, symbols) in summaries
        {
            for symbol in symbols.iter()
            {
                importers
                    .entry(symbol.clone())
                    .or_default()
                    .push(fp.clone());
            }
        }

        info!(root = %tree_root.display(), files = paths.len(), symbols = importers.len(), "import index built");

        Ok(Self { importers, memo: HashMap::new() })
    }

    /// Function paths importing `symbol` directly.
    pub fn direct_importers(
        &self,
        symbol: &str,
    ) -> &[FunctionPath]
    {
        self.importers
            .get(symbol)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every function path depending on `target`, directly or transitively.
    ///
    /// Each symbol is expanded at most once, so import cycles terminate. A
    /// function reached through a cycle is still reported once; this includes
    /// the target's own function when a cycle leads back to it.
    pub fn find_dependents(
        &mut self,
        target: &str,
    ) -> BTreeSet<FunctionPath>
    {
        if let Some(hit) = self.memo.get(target)
        {
            return hit.clone();
        }

        let mut dependents = BTreeSet::new();
        let mut expanded: HashSet<&str> = HashSet::from([target]);
        let mut worklist: VecDeque<&str> = VecDeque::from([target]);

        while let Some(symbol) = worklist.pop_front()
        {
            for fp in self.direct_importers(symbol)
            {
                if !dependents.insert(fp.clone())
                {
                    continue;
                }
                debug!(dependent = %fp, via = symbol, "dependent found");

                if expanded.insert(fp.name())
                {
                    worklist.push_back(fp.name());
                }
            }
        }

        self.memo
            .insert(target.to_string(), dependents.clone());
        dependents
    }
}
