use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use forkwire::cli::{AppContext, Cli, Commands};
use forkwire::core::error::exit_code_for;
use forkwire::infra::utils::Paint;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("FORKWIRE_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn dispatch(cli: Cli, ctx: &AppContext) -> Result<()> {
    match cli.command {
        Commands::Override(args) => forkwire::core::override_engine::run(args, ctx),
        Commands::Build(args) => forkwire::core::build::run(args, ctx),
        Commands::Open(args) => forkwire::core::open::run(args, ctx),
        Commands::Pr(command) => forkwire::core::pr::run(command, ctx),
        Commands::Lint(args) => forkwire::core::lint::run(args, ctx),
        Commands::Function(command) => forkwire::core::scaffold::run(command, ctx),
        Commands::Init(args) => forkwire::infra::config::init(args, ctx),
        Commands::Completions(args) => forkwire::completion::run(args, ctx),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        verbose: cli.verbose,
    };

    init_tracing(ctx.verbose);
    Paint::init(ctx.no_color);

    match dispatch(cli, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}
