//! Fuzzy function lookup.
//!
//! A query is scored against each candidate's bare name and its full
//! `<group>/<name>` path using case-insensitive Levenshtein distance; the
//! smaller of the two wins. All candidates sharing the best score are kept.
//! Only a unique exact hit is accepted silently; everything else needs the
//! user, and without a user it fails as [`ForkError::Ambiguous`].

use anyhow::Result;
use tracing::debug;

use crate::core::{
    error::ForkError,
    prompt::{self, Prompter},
    source_index::FunctionPath,
};

/// Case-insensitive edit distance; 0 means equal.
pub fn distance(
    a: &str,
    b: &str,
) -> usize
{
    let a: Vec<char> = a.chars().flat_map(char::to_lowercase).collect();
    let b: Vec<char> = b.chars().flat_map(char::to_lowercase).collect();

    if a.is_empty()
    {
        return b.len();
    }
    if b.is_empty()
    {
        return a.len();
    }

    // Two rolling rows of the DP table
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate()
    {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate()
        {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution
                .min(prev[j + 1] + 1)
                .min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Score of `query` against one candidate.
pub fn score(
    query: &str,
    candidate: &FunctionPath,
) -> usize
{
    distance(query, candidate.name()).min(distance(query, candidate.as_str()))
}

/// Candidates achieving the minimum score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking
{
    pub best_score: usize,
    /// Ties in candidate order
    pub matches: Vec<FunctionPath>,
}

/// Rank `candidates` against `query`; `None` when there are no candidates.
pub fn rank<'a, I>(
    query: &str,
    candidates: I,
) -> Option<Ranking>
where
    I: IntoIterator<Item = &'a FunctionPath>,
{
    let mut best: Option<Ranking> = None;

    for fp in candidates
    {
        let s = score(query, fp);
        match &mut best
        {
            Some(r) if s > r.best_score =>
            {}
            Some(r) if s == r.best_score => r.matches.push(fp.clone()),
            _ =>
            {
                best = Some(Ranking { best_score: s, matches: vec![fp.clone()] });
            }
        }
    }

    best
}

/// What it takes to settle a ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection
{
    /// Unique exact hit; no questions asked
    Exact(FunctionPath),
    /// One inexact hit; the user confirms it
    Confirm(FunctionPath),
    /// Several tied hits; the user picks one
    Choose(Vec<FunctionPath>),
}

impl Selection
{
    pub fn from_ranking(ranking: Ranking) -> Self
    {
        let Ranking { best_score, mut matches } = ranking;

        if matches.len() > 1
        {
            Selection::Choose(matches)
        }
        else if best_score == 0
        {
            Selection::Exact(matches.remove(0))
        }
        else
        {
            Selection::Confirm(matches.remove(0))
        }
    }
}

/// Prompt wording used while resolving a query.
#[derive(Debug, Clone)]
pub struct QueryMessages<'a>
{
    pub choose: &'a str,
    /// `{funcPath}` is replaced with the candidate
    pub confirm: &'a str,
}

impl Default for QueryMessages<'_>
{
    fn default() -> Self
    {
        Self {
            choose: "Select a function:",
            confirm: "Is \"{funcPath}\" the function you wanted?",
        }
    }
}

/// Resolve `query` to exactly one of `candidates`.
///
/// With `exact`, the query must itself be one of the candidates.
pub fn resolve_query(
    query: &str,
    candidates: &[FunctionPath],
    exact: bool,
    prompter: &dyn Prompter,
    messages: &QueryMessages<'_>,
) -> Result<FunctionPath>
{
    let not_found = || ForkError::NotFound { query: query.to_string() };

    if exact
    {
        let fp = FunctionPath::parse(query).map_err(|_| not_found())?;
        return if candidates.contains(&fp) { Ok(fp) } else { Err(not_found().into()) };
    }

    let ranking = rank(query, candidates).ok_or_else(not_found)?;
    debug!(query, best = ranking.best_score, ties = ranking.matches.len(), "ranked candidates");

    match Selection::from_ranking(ranking)
    {
        Selection::Exact(fp) => Ok(fp),

        Selection::Confirm(fp) =>
        {
            let msg = messages.confirm.replace("{funcPath}", fp.as_str());
            match prompt::confirm(prompter, &msg, true)?
            {
                Some(true) => Ok(fp),
                Some(false) => Err(ForkError::Cancelled.into()),
                None => Err(ForkError::Ambiguous {
                    query: query.to_string(),
                    candidates: vec![fp.to_string()],
                }
                .into()),
            }
        }

        Selection::Choose(fps) =>
        {
            let options: Vec<String> = fps
                .iter()
                .map(ToString::to_string)
                .collect();
            match prompt::choose(prompter, messages.choose, &options)?
            {
                Some(i) => Ok(fps[i].clone()),
                None => Err(ForkError::Ambiguous { query: query.to_string(), candidates: options }.into()),
            }
        }
    }
}
