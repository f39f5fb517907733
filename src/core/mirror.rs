//! Local clone of the upstream library.

use std::{path::PathBuf, sync::LazyLock, time::Duration};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::info;

use crate::core::git::Vcs;

/// `1.2`, `v1.2.3-rc.1`, `v12`
static VERSIONED_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?\d+\.\d+(\.\d+)?([-+].*)?$|^v\d").expect("versioned ref pattern compiles")
});

/// How a configured ref is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind
{
    /// Moves; pulled on every sync
    Branch,
    /// Fixed name; fetched then checked out
    Tag,
    /// Fixed hash; fetched then checked out
    Commit,
}

impl RefKind
{
    /// Classify `git_ref`: 7 to 40 hex digits is a commit, `v1..` or a
    /// semver-looking name is a tag, anything else is a branch.
    pub fn of(git_ref: &str) -> Self
    {
        let is_hex = (7..=40).contains(&git_ref.len()) && git_ref.chars().all(|c| c.is_ascii_hexdigit());
        if is_hex
        {
            return RefKind::Commit;
        }

        if VERSIONED_REF.is_match(git_ref) { RefKind::Tag } else { RefKind::Branch }
    }
}

/// The upstream checkout, synchronized at most once per command.
#[derive(Debug, Clone)]
pub struct UpstreamMirror
{
    pub dir: PathBuf,
    pub url: String,
    pub git_ref: String,
    synced: bool,
}

impl UpstreamMirror
{
    pub fn new(
        dir: PathBuf,
        url: String,
        git_ref: String,
    ) -> Self
    {
        Self { dir, url, git_ref, synced: false }
    }

    pub fn is_synced(&self) -> bool
    {
        self.synced
    }

    pub fn src_dir(&self) -> PathBuf
    {
        self.dir.join("src")
    }

    /// Clone or update the mirror to `git_ref`. Later calls on the same value
    /// return immediately.
    pub fn ensure_fresh(
        &mut self,
        vcs: &dyn Vcs,
        quiet: bool,
    ) -> Result<()>
    {
        if self.synced
        {
            return Ok(());
        }

        let kind = RefKind::of(&self.git_ref);
        let spinner = (!quiet).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("Syncing upstream ({})", self.git_ref));
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let result = self.sync(vcs, kind);

        if let Some(pb) = spinner
        {
            pb.finish_and_clear();
        }
        result?;

        info!(dir = %self.dir.display(), git_ref = %self.git_ref, ?kind, "upstream mirror synced");
        self.synced = true;
        Ok(())
    }

    fn sync(
        &self,
        vcs: &dyn Vcs,
        kind: RefKind,
    ) -> Result<()>
    {
        if self.dir.join(".git").exists()
        {
            return match kind
            {
                RefKind::Branch =>
                {
                    vcs.checkout(&self.git_ref, &self.dir)?;
                    vcs.pull(&self.git_ref, &self.dir)
                }
                RefKind::Tag | RefKind::Commit =>
                {
                    vcs.fetch(&self.dir)?;
                    vcs.checkout(&self.git_ref, &self.dir)
                }
            };
        }

        match kind
        {
            // A commit cannot be cloned by name; clone everything, then pin
            RefKind::Commit =>
            {
                vcs.clone_repo(&self.url, &self.git_ref, false, &self.dir)?;
                vcs.checkout(&self.git_ref, &self.dir)
            }
            RefKind::Branch | RefKind::Tag => vcs.clone_repo(&self.url, &self.git_ref, true, &self.dir),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn ref_kinds()
    {
        assert_eq!(RefKind::of("main"), RefKind::Branch);
        assert_eq!(RefKind::of("next"), RefKind::Branch);
        assert_eq!(RefKind::of("feature/v2"), RefKind::Branch);
        assert_eq!(RefKind::of("v12"), RefKind::Tag);
        assert_eq!(RefKind::of("v12.2.0"), RefKind::Tag);
        assert_eq!(RefKind::of("1.4.0-beta.1"), RefKind::Tag);
        assert_eq!(RefKind::of("a1b2c3d"), RefKind::Commit);
        assert_eq!(RefKind::of("0123456789abcdef0123456789abcdef01234567"), RefKind::Commit);
        assert_eq!(RefKind::of("abc"), RefKind::Branch);
    }
}
