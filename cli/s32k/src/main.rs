//! s32k: command-line host for the S32K3X8EVB board model.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};

use commands::compose::ComposeArgs;

#[derive(Parser)]
#[command(name = "s32k", version, about = "Compose and inspect the S32K3X8EVB board model")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the fixed board layout
    Describe {
        /// Output format (default: human-readable, "json" for JSON)
        #[arg(long)]
        format: Option<String>,
    },
    /// Compose the board and report the committed machine
    Compose {
        /// Machine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Firmware image (overrides the config file)
        #[arg(long)]
        firmware: Option<PathBuf>,
        /// Number of UART instances to wire
        #[arg(long)]
        uarts: Option<u32>,
        /// CPU type (e.g., cortex-m7)
        #[arg(long)]
        cpu: Option<String>,
        /// Serial binding per UART, in order (null, stdio, file:<path>)
        #[arg(long)]
        serial: Vec<String>,
        /// Print the board summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage machine configuration files
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a starter configuration
    Template,
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Describe { format } => commands::describe::run(format.as_deref()),
        Commands::Compose {
            config,
            firmware,
            uarts,
            cpu,
            serial,
            json,
        } => commands::compose::run(&ComposeArgs {
            config,
            firmware,
            uarts,
            cpu,
            serial,
            json,
        }),
        Commands::Config { action } => match action {
            ConfigAction::Template => commands::config::template(),
            ConfigAction::Validate { path } => commands::config::validate(&path),
        },
    }
}
