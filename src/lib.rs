//! **forkwire** - maintain a personal fork of a function library
//!
//! Upstream functions are copied into `overrides/` on demand; every upstream
//! function that transitively imports an overridden one is "rewired" through a
//! generated shim so the fork's entry point stays consistent.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Override/rewire engine and the commands built on it
pub mod core {
    /// Error taxonomy and exit codes
    pub mod error;
    pub use error::ForkError;

    /// Function paths, artifact kinds and source-tree enumeration
    pub mod source_index;
    pub use source_index::{ArtifactKind, FunctionPath, SourceTree};

    /// Edit-distance query resolution
    pub mod matcher;

    /// Interactive prompts behind a trait
    pub mod prompt;

    /// Tree-sitter import/export analysis with moka caching
    pub mod imports;

    /// Reverse dependency index over the upstream mirror
    pub mod resolver;

    /// Rewired manifest and shim files
    pub mod rewired;

    /// Version control collaborator
    pub mod git;

    /// Upstream mirror synchronization
    pub mod mirror;

    /// Project layout and state snapshot
    pub mod project;
    pub use project::{ProjectEnv, ProjectState};

    /// Per-invocation context
    pub mod session;
    pub use session::Session;

    /// Aggregated `mod.ts` entry point
    pub mod umbrella;

    /// `override` and `override reset`
    pub mod override_engine;

    /// `build`
    pub mod build;

    /// `open`
    pub mod open;

    /// `lint`
    pub mod lint;

    /// `pr create` and `pr import`
    pub mod pr;

    /// `fn add`
    pub mod scaffold;
}

/// Infrastructure - Configuration, I/O, and utilities
pub mod infra {
    /// Layered configuration (file + FORKWIRE_ env)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Atomic writes and sparse copies
    pub mod io;

    /// Gitignore-aware directory walking
    pub mod walk;
    pub use walk::FileWalker;

    /// Path display and colored output helpers
    pub mod utils;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, FileWalker, load_config};
