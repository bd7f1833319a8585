mod audit;
mod commands;
mod config;
mod crawler;
mod diagnostics;
mod error;
mod grammar;
mod index;
mod reference;
mod repair;
mod reports;
mod resolver;
mod scanner;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::Format;

#[derive(Parser)]
#[command(name = "ditaref", about = "Check and repair cross-document references in DITA maps")]
struct Cli {
    /// Which report to run
    #[command(subcommand)]
    command: Commands,
    /// Log crawl, resolution and repair steps to stderr
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report broken references and the repairs that would fix them
    Check {
        /// A map file, or a directory whose .ditamap files are the seeds
        path: PathBuf,
        /// Report format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Repair broken references in place, one rewrite per document
    Fix {
        /// A map file, or a directory whose .ditamap files are the seeds
        path: PathBuf,
    },
    /// List topic ids declared by more than one section
    Ids {
        /// A map file, or a directory whose .ditamap files are the seeds
        path: PathBuf,
    },
    /// List defined keys and undefined key references
    Keys {
        /// A map file, or a directory whose .ditamap files are the seeds
        path: PathBuf,
    },
    /// Index keywords to the documents that declare them
    Keywords {
        /// A map file, or a directory whose .ditamap files are the seeds
        path: PathBuf,
    },
    /// List documents and images no map reaches
    Unused {
        /// A map file, or a directory whose .ditamap files are the seeds
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = match cli.command {
        Commands::Check { path, format } => commands::check(&path, format),
        Commands::Fix { path } => commands::fix(&path),
        Commands::Ids { path } => commands::ids(&path),
        Commands::Keys { path } => commands::keys(&path),
        Commands::Keywords { path } => commands::keywords(&path),
        Commands::Unused { path } => commands::unused(&path),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(commands::EXIT_RUNTIME)
        },
    };
}

/// Route `tracing` output to stderr. `RUST_LOG` wins over `--debug`.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| return EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| return EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
    return;
}
