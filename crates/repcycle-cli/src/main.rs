use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod audio;
mod commands;

#[derive(Parser)]
#[command(name = "repcycle", version, about = "Repcycle workout timer")]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Where cues go. Events always go to stdout as JSON lines.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Do not play cues
    #[arg(long, global = true)]
    pub quiet: bool,
    /// Render cues into a WAV file instead of playing them
    #[arg(long, global = true, value_name = "PATH")]
    pub wav: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count down from a fixed duration
    Countdown {
        /// Duration in seconds (default from config)
        #[arg(long)]
        secs: Option<u32>,
    },
    /// Count up, optionally to a limit
    Stopwatch {
        /// Stop counting at this many seconds
        #[arg(long)]
        limit_secs: Option<u32>,
        /// Stop the stopwatch after this many seconds
        #[arg(long)]
        run_secs: Option<u32>,
    },
    /// Alternate work and rest steps
    Interval(commands::interval::IntervalArgs),
    /// Work for as long as you like, then rest in proportion
    WorkRest(commands::work_rest::WorkRestArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repcycle=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Countdown { secs } => commands::countdown::run(secs, &cli.output),
        Commands::Stopwatch {
            limit_secs,
            run_secs,
        } => commands::stopwatch::run(limit_secs, run_secs, &cli.output),
        Commands::Interval(args) => commands::interval::run(args, &cli.output),
        Commands::WorkRest(args) => commands::work_rest::run(args, &cli.output),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
