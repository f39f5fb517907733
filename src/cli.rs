use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub verbose: u8,    // global -v, repeatable
}

#[derive(Parser)]
#[command(name = "fw")]
#[command(
    about = "Maintain a personal fork of a function library: override upstream functions, rewire their dependents, bundle, and trade pull requests"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress spinners and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy an upstream function into overrides/ and rewire its dependents
    Override(OverrideArgs),

    /// Regenerate mod.ts and bundle the fork
    Build(BuildArgs),

    /// Open the files of one of your functions in an editor
    Open(OpenArgs),

    /// Exchange pull requests with the upstream repository
    #[command(subcommand)]
    Pr(PrCommand),

    /// Run biome and eslint over your functions and overrides
    Lint(LintArgs),

    /// Manage your own functions
    #[command(subcommand, name = "fn")]
    Function(FnCommand),

    /// Initialize a forkwire.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct OverrideArgs {
    #[command(subcommand)]
    pub command: Option<OverrideCommand>,

    /// Function name or <group>/<name>; fuzzy unless --exact
    pub query: Option<String>,

    /// Treat the query as an exact <group>/<name>
    #[arg(long)]
    pub exact: bool,
}

#[derive(Subcommand, Debug)]
pub enum OverrideCommand {
    /// Rebuild overrides/rewired from the current overrides
    Reset,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Rebuild on change (first configured format only)
    #[arg(long)]
    pub watch: bool,
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Function name or <group>/<name>; omit to choose from all of them
    #[arg(default_value = "")]
    pub query: String,

    /// Open the source file (default)
    #[arg(short, long)]
    pub source: bool,

    /// Open the test file
    #[arg(short, long)]
    pub test: bool,

    /// Open the type test file
    #[arg(short = 'T', long)]
    pub type_test: bool,

    /// Open the benchmark file
    #[arg(short, long)]
    pub benchmark: bool,

    /// Open the documentation file
    #[arg(short, long)]
    pub docs: bool,

    /// Open every file of the function
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Subcommand, Debug)]
pub enum PrCommand {
    /// Open an upstream pull request from your current branch
    Create(PrCreateArgs),

    /// Copy the files of an upstream pull request into your fork
    Import(PrImportArgs),
}

#[derive(Args, Debug)]
pub struct PrCreateArgs {
    /// Target the next major version without asking
    #[arg(long)]
    pub breaking_change: bool,
}

#[derive(Args, Debug)]
pub struct PrImportArgs {
    /// Pull request number
    pub number: String,
}

#[derive(Args, Debug)]
pub struct LintArgs {
    /// Files passed to eslint
    pub files: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum FnCommand {
    /// Scaffold the files for a custom function
    Add(FnAddArgs),
}

#[derive(Args, Debug)]
pub struct FnAddArgs {
    /// Function name, without a group
    pub name: String,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn override_reset_is_a_subcommand_not_a_query() {
        let cli = Cli::try_parse_from(["fw", "override", "reset"]).unwrap();
        match cli.command {
            Commands::Override(args) => {
                assert!(matches!(args.command, Some(OverrideCommand::Reset)));
                assert!(args.query.is_none());
            }
            _ => panic!("expected override"),
        }

        let cli = Cli::try_parse_from(["fw", "-vv", "override", "--exact", "array/sum"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Override(args) => {
                assert_eq!(args.query.as_deref(), Some("array/sum"));
                assert!(args.exact);
            }
            _ => panic!("expected override"),
        }
    }

    #[test]
    fn lint_takes_any_number_of_files() {
        let cli = Cli::try_parse_from(["fw", "lint"]).unwrap();
        assert!(matches!(cli.command, Commands::Lint(args) if args.files.is_empty()));

        let cli = Cli::try_parse_from(["fw", "lint", "src/array/sum.ts", "overrides/src/array/avg.ts"]).unwrap();
        match cli.command {
            Commands::Lint(args) => assert_eq!(args.files, ["src/array/sum.ts", "overrides/src/array/avg.ts"]),
            _ => panic!("expected lint"),
        }
    }
}
