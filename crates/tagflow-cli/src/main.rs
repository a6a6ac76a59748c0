mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, fleet::FleetSubcommand, history::HistorySubcommand, PayloadArgs,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tagflow",
    about = "Start and stop compute instances selected by tag filters",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .tagflow/)
    #[arg(long, global = true, env = "TAGFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize tagflow in the current project with a sample fleet
    Init,

    /// Run the workflow for a trigger payload and record the result
    Run {
        #[command(flatten)]
        input: PayloadArgs,
    },

    /// Parse a trigger payload and print its normalized form
    Validate {
        #[command(flatten)]
        input: PayloadArgs,
    },

    /// Show which instances a payload's tag filter selects, without acting
    Resolve {
        #[command(flatten)]
        input: PayloadArgs,
    },

    /// Inspect the fleet
    Fleet {
        #[command(subcommand)]
        subcommand: FleetSubcommand,
    },

    /// Inspect recorded runs
    History {
        #[command(subcommand)]
        subcommand: HistorySubcommand,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Serve the HTTP trigger
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run { input } => cmd::run::run(&root, &input, cli.json),
        Commands::Validate { input } => cmd::validate::run(&input, cli.json),
        Commands::Resolve { input } => cmd::resolve::run(&root, &input, cli.json),
        Commands::Fleet { subcommand } => cmd::fleet::run(&root, subcommand, cli.json),
        Commands::History { subcommand } => cmd::history::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
