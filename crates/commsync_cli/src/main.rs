//! CommSync CLI
//!
//! Command-line tools for inspecting and exercising the ping sync protocol.
//!
//! # Commands
//!
//! - `validate` - Check a raw ping request against the request schema
//! - `prune-plan` - Show which cached threads a client would prune
//! - `simulate` - Run a client driver against a seeded in-process server

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commsync_protocol::{ThreadId, WireFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CommSync command-line tools.
#[derive(Parser)]
#[command(name = "commsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Wire format of input files and simulated traffic.
#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Cbor,
}

impl From<Format> for WireFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => WireFormat::Json,
            Format::Cbor => WireFormat::Cbor,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a raw ping request and print it with secrets masked
    Validate {
        /// Request file
        file: PathBuf,

        /// Encoding of the file
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
    },

    /// Show prunable threads and the next sweep for a thread list
    PrunePlan {
        /// JSON file mapping thread ids to lastNavigatedTo/lastPruned
        file: PathBuf,

        /// Evaluate at this epoch-ms time instead of now
        #[arg(short, long)]
        now: Option<u64>,

        /// Thread currently open on screen
        #[arg(short, long)]
        active: Option<String>,
    },

    /// Run a client driver against a seeded in-process server
    Simulate {
        /// Number of ping cycles to run
        #[arg(short, long, default_value = "5")]
        cycles: u32,

        /// Ping frequency in milliseconds
        #[arg(long, default_value = "500")]
        frequency_ms: u64,

        /// Wire format between client and server
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Validate { file, format } => {
            commands::validate::run(&file, format.into())?;
        }
        Commands::PrunePlan { file, now, active } => {
            let active = active.map(ThreadId::new);
            commands::prune_plan::run(&file, now, active.as_ref())?;
        }
        Commands::Simulate {
            cycles,
            frequency_ms,
            format,
        } => {
            commands::simulate::run(cycles, frequency_ms, format.into())?;
        }
        Commands::Version => {
            println!("CommSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
