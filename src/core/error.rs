//! Error taxonomy shared by every command.
//!
//! Library code returns `anyhow::Result` and attaches one of these variants at
//! the point where the condition is detected; `main` downcasts the chain to
//! pick the process exit code.

use std::path::PathBuf;

/// Fatal conditions surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum ForkError
{
    /// No candidate matched a query
    #[error("no function matching \"{query}\" was found upstream")]
    NotFound
    {
        query: String,
    },

    /// Several candidates tied and nobody can pick one
    #[error(
        "\"{query}\" is ambiguous; candidates: {}. Rerun in a terminal or pass an exact <group>/<name>",
        .candidates.join(", ")
    )]
    Ambiguous
    {
        query: String,
        candidates: Vec<String>,
    },

    /// Uncommitted changes would be clobbered by a mutation
    #[error(
        "the repository at {} has uncommitted changes; commit or stash them first",
        .path.display()
    )]
    DirtyWorkingTree
    {
        path: PathBuf,
    },

    /// A source file's imports cannot be analyzed
    #[error("failed to parse {}: syntax error near line {line}", .path.display())]
    ParseFailure
    {
        path: PathBuf,
        line: usize,
    },

    /// An external tool exited unsuccessfully
    #[error("`{command}` failed ({status})\n{stderr}")]
    ExternalTool
    {
        command: String,
        status: String,
        stderr: String,
    },

    /// The user dismissed a prompt
    #[error("cancelled")]
    Cancelled,

    /// A string is not a `<group>/<name>` identifier
    #[error("invalid function path \"{0}\": expected <group>/<name>")]
    InvalidFunctionPath(String),
}

impl ForkError
{
    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8
    {
        match self
        {
            ForkError::NotFound { .. } => 2,
            ForkError::Ambiguous { .. } => 3,
            ForkError::DirtyWorkingTree { .. } => 4,
            ForkError::ParseFailure { .. } => 5,
            ForkError::ExternalTool { .. } => 6,
            ForkError::Cancelled => 130,
            ForkError::InvalidFunctionPath(_) => 1,
        }
    }
}

/// Map any error chain to an exit code, defaulting to 1.
pub fn exit_code_for(err: &anyhow::Error) -> u8
{
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ForkError>())
        .map(ForkError::exit_code)
        .unwrap_or(1)
}
