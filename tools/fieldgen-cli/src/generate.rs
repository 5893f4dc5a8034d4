//! Generate command - run the frame pipeline over a manifest
//!
//! Indexes the manifest's resource tree and runs the generator for the
//! configured number of frames. Rendering goes through the dry-run host,
//! which records every render request while labels and metadata are
//! written; a real renderer plugs in through the `RenderHost` trait.

use anyhow::{Context, Result};
use clap::Args;
use fieldgen_core::{AssetIndex, FrameGenerator, Limits, NullHost, OutputDirs, SceneSampler};
use std::path::PathBuf;

use crate::manifest::FieldgenManifest;

/// Arguments for the generate command
#[derive(Args)]
pub struct GenerateArgs {
    /// Path to fieldgen.toml manifest
    #[arg(default_value = "fieldgen.toml")]
    pub manifest: PathBuf,

    /// Output directory (overrides manifest)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of frames (overrides manifest)
    #[arg(short, long)]
    pub frames: Option<u64>,

    /// Seed for the scene random stream (overrides manifest)
    #[arg(short, long)]
    pub seed: Option<u64>,
}

/// Execute the generate command
pub fn execute(args: GenerateArgs) -> Result<()> {
    let manifest = FieldgenManifest::load(&args.manifest)?;
    manifest.validate()?;

    let output = args.output.unwrap_or_else(|| manifest.output.dir.clone());
    let frames = args.frames.unwrap_or(manifest.output.frames);
    let seed = args.seed.or(manifest.scene.seed);

    let assets = AssetIndex::load(&manifest.assets.resources).with_context(|| {
        format!(
            "Failed to index resources in {}",
            manifest.assets.resources.display()
        )
    })?;
    println!(
        "Indexed {} environments, {} balls, {} grass sets",
        assets.hdris.len(),
        assets.balls.len(),
        assets.grasses.len()
    );

    let sampler = SceneSampler::new(seed, Limits::default(), manifest.counts());
    let options = manifest.options();
    let dirs = OutputDirs::create(&output, options.depth)?;
    let mut generator = FrameGenerator::new(
        NullHost::new(),
        sampler,
        assets,
        options,
        dirs,
        &manifest.assets.resources,
    );
    generator.run(frames)?;

    let host = generator.into_host();
    println!("Generated {} frames into {}", frames, output.display());
    println!(
        "  Labels and metadata written, {} render requests recorded",
        host.renders.len()
    );
    Ok(())
}
