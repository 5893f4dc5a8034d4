//! Fieldgen CLI - synthetic field dataset generator
//!
//! # Commands
//!
//! - `fieldgen generate` - Run the frame pipeline described by fieldgen.toml
//! - `fieldgen check` - Validate a manifest and sample one scene
//! - `fieldgen index` - List the assets a resource tree provides
//!
//! # Usage
//!
//! In a directory with fieldgen.toml and a resource tree:
//! ```bash
//! # Validate the manifest and look at one sampled scene
//! fieldgen check
//!
//! # Generate the dataset
//! fieldgen generate
//!
//! # Short run with a fixed seed, into a scratch directory
//! fieldgen generate --frames 10 --seed 42 --output /tmp/run
//! ```
//!
//! # Manifest (fieldgen.toml)
//!
//! ```toml
//! [output]
//! dir = "dataset"
//! frames = 1000
//! stereo = false
//!
//! [render]
//! width = 1280
//! height = 1024
//!
//! [scene]
//! seed = 42
//! robots = 2
//!
//! [assets]
//! resources = "resources"
//! ```

mod check;
mod generate;
mod index;
mod manifest;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Fieldgen CLI - synthetic field dataset generator
#[derive(Parser)]
#[command(name = "fieldgen")]
#[command(about = "Synthetic field dataset generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the frame pipeline described by the manifest
    Generate(generate::GenerateArgs),

    /// Validate a manifest and sample one scene
    Check(check::CheckArgs),

    /// List the assets a resource tree provides
    Index(index::IndexArgs),
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate::execute(args),
        Commands::Check(args) => check::execute(args),
        Commands::Index(args) => index::execute(args),
    }
}
