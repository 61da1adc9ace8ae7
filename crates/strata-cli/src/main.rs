//! Strata Command-Line Tool
//!
//! Inspects schema declaration files and migrates stores between them.

mod commands;
mod error;
mod formatter;
mod schema_file;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;
use std::path::PathBuf;

/// Strata Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version, about = "Schema evolution for Strata stores")]
pub struct Args {
    /// Output format
    #[arg(long, global = true, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the structural fingerprint of each schema file
    Fingerprint {
        /// Schema declaration files (JSON)
        #[arg(required = true)]
        schemas: Vec<PathBuf>,
    },

    /// Show the differences between two schema versions
    Diff {
        /// Older schema file
        from: PathBuf,
        /// Newer schema file
        to: PathBuf,
    },

    /// Plan the migration of a store to the last schema in the list
    Plan {
        /// Store directory
        #[arg(short, long)]
        store: PathBuf,
        /// Schema files, oldest first; the last one is the target
        #[arg(required = true)]
        schemas: Vec<PathBuf>,
    },

    /// Migrate a store to the last schema in the list
    Migrate {
        /// Store directory
        #[arg(short, long)]
        store: PathBuf,
        /// Schema files, oldest first; the last one is the target
        #[arg(required = true)]
        schemas: Vec<PathBuf>,
    },

    /// Show the model and record count of a store
    Inspect {
        /// Store directory
        #[arg(short, long)]
        store: PathBuf,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strata_cli=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), error::CliError> {
    let formatter = formatter::create_formatter(args.format);

    let output = match args.command {
        Command::Fingerprint { schemas } => commands::fingerprint(&schemas, &*formatter)?,
        Command::Diff { from, to } => commands::diff(&from, &to, &*formatter)?,
        Command::Plan { store, schemas } => commands::plan(&store, &schemas, &*formatter)?,
        Command::Migrate { store, schemas } => commands::migrate(&store, &schemas, &*formatter)?,
        Command::Inspect { store } => commands::inspect(&store, &*formatter)?,
    };

    println!("{}", output);
    Ok(())
}
