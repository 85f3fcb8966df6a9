//! Motus CLI - Command-line interface for the motus modulation router.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "motus")]
#[command(author, version, about = "Motus modulation router CLI", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List node templates and their parameters
    Templates(commands::templates::TemplatesArgs),

    /// Sanitize a patch file and report every repair
    Check(commands::check::CheckArgs),

    /// List or export factory patches
    Patches(commands::patches::PatchesArgs),

    /// Evaluate a patch against fixed sensor readings
    Run(commands::run::RunArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Templates(args) => commands::templates::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Patches(args) => commands::patches::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
