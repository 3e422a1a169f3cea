//! hypotab - hypothesis tables for melodic occurrences
//!
//! Subcommands:
//! - `hypotab build` - Compute features and write one row per occurrence
//! - `hypotab export-mcsv` - Write the corpus as MCSV files for FANTASTIC
//! - `hypotab config` - Show the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hypoconf::HypoConfig;
use melodic_features::TableFormat;

mod commands;

#[derive(Parser)]
#[command(name = "hypotab")]
#[command(about = "Expectancy and repetition features for melodic occurrences")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./hypotheses.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute features and write the hypothesis table
    Build {
        /// Melody corpus (JSON)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Occurrence table (delimited text or .json)
        #[arg(long)]
        occurrences: Option<PathBuf>,

        /// Note-level information content file
        #[arg(long)]
        information_content: Option<PathBuf>,

        /// Phrase-level entropy file
        #[arg(long)]
        entropy: Option<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: csv or json
        #[arg(short, long)]
        format: Option<TableFormat>,
    },

    /// Export the corpus as MCSV files
    ExportMcsv {
        /// Melody corpus (JSON)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Directory to write <filename>.csv files into
        #[arg(long)]
        out_dir: PathBuf,

        /// Ticks per beat
        #[arg(long)]
        ticks: Option<u32>,
    },

    /// Print the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = HypoConfig::load_with_sources_from(cli.config.as_deref())
        .context("loading configuration")?;

    // Tables may go to stdout, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.telemetry.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            corpus,
            occurrences,
            information_content,
            entropy,
            output,
            format,
        } => {
            commands::build(
                &config,
                commands::BuildArgs {
                    corpus,
                    occurrences,
                    information_content,
                    entropy,
                    output,
                    format,
                },
            )?;
        }
        Commands::ExportMcsv {
            corpus,
            out_dir,
            ticks,
        } => {
            commands::export_mcsv(&config, corpus, &out_dir, ticks)?;
        }
        Commands::Config => {
            commands::show_config(&config, &sources)?;
        }
    }

    Ok(())
}
