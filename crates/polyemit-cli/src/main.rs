#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "polyemit")]
#[command(author, version, about = "Multi-target output rewriting for compiled module trees", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Rewrite emitted output directories for every configured target
    Build {
        /// Path to the configuration file (default: polyemit.json in cwd)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Project output directories to process (overrides the config file)
        projects: Vec<PathBuf>,
    },

    /// Rewrite a single emitted file and print the result
    Transpile {
        /// The emitted file to rewrite
        file: PathBuf,

        /// Script extension to rewrite specifiers to (e.g. ".mjs")
        #[arg(long, value_name = "EXT")]
        extname: String,

        /// Leave .json specifiers alone, as for hosts with JSON modules enabled
        #[arg(long)]
        resolve_json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        // Version handles its own output, without logging setup.
        Commands::Version => commands::version::run(),
        Commands::Build { config, projects } => {
            logging::init(cli.verbose, cli.json);
            commands::build::run(&cwd, config.as_deref(), &projects, cli.json)
        }
        Commands::Transpile {
            file,
            extname,
            resolve_json,
        } => {
            logging::init(cli.verbose, cli.json);
            commands::transpile::run(&cwd, &file, &extname, resolve_json)
        }
    }
}
