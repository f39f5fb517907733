//! Everything one command invocation needs, created once in `main`.

use anyhow::{Context, Result};

use crate::cli::AppContext;
use crate::core::{
    git::{GitCli, Vcs},
    imports::ImportAnalyzer,
    mirror::UpstreamMirror,
    project::ProjectEnv,
    prompt::{Prompter, TerminalPrompter},
};

pub struct Session
{
    pub env: ProjectEnv,
    pub vcs: Box<dyn Vcs>,
    pub prompter: Box<dyn Prompter>,
    pub mirror: UpstreamMirror,
    /// Shared so import summaries are parsed once per invocation
    pub analyzer: ImportAnalyzer,
    pub quiet: bool,
}

impl Session
{
    pub fn new(
        env: ProjectEnv,
        vcs: Box<dyn Vcs>,
        prompter: Box<dyn Prompter>,
        quiet: bool,
    ) -> Self
    {
        let mirror = UpstreamMirror::new(
            env.mirror_dir(),
            env.config.upstream_url.clone(),
            env.config.upstream_ref.clone(),
        );
        let analyzer = ImportAnalyzer::new(&env.config.base_package);

        Self { env, vcs, prompter, mirror, analyzer, quiet }
    }

    /// Session for the project enclosing the current directory, talking to
    /// `git` and the terminal.
    pub fn open(ctx: &AppContext) -> Result<Self>
    {
        let cwd = std::env::current_dir().context("read current directory")?;
        let env = ProjectEnv::discover(&cwd)?;

        Ok(Self::new(env, Box::new(GitCli::new()), Box::new(TerminalPrompter::new()), ctx.quiet))
    }

    /// Synchronize the upstream mirror unless this session already did.
    pub fn ensure_mirror(&mut self) -> Result<()>
    {
        self.mirror
            .ensure_fresh(self.vcs.as_ref(), self.quiet)
    }

    /// Print a progress line unless quiet.
    pub fn say(
        &self,
        line: impl AsRef<str>,
    )
    {
        if !self.quiet
        {
            println!("{}", line.as_ref());
        }
    }
}
