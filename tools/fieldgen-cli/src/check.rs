//! Check command - validate a manifest and sample one scene
//!
//! Confirms the manifest parses and passes validation, then draws a scene
//! from the configured sampler and runs it through the scene invariants.

use anyhow::{Context, Result};
use clap::Args;
use fieldgen_core::{Limits, SceneSampler};
use std::path::PathBuf;

use crate::manifest::FieldgenManifest;

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Path to fieldgen.toml manifest
    #[arg(default_value = "fieldgen.toml")]
    pub manifest: PathBuf,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let manifest = FieldgenManifest::load(&args.manifest)?;
    manifest.validate()?;
    println!("Manifest {} is valid", args.manifest.display());

    let mut sampler = SceneSampler::new(manifest.scene.seed, Limits::default(), manifest.counts());
    let config = sampler.configure_scene();
    config
        .validate()
        .context("Sampled scene failed validation")?;

    println!("Sample scene:");
    println!(
        "  Field: {:.2} x {:.2} m, grass {:.0} mm",
        config.field.length,
        config.field.width,
        config.field.grass_height * 1000.0
    );
    println!(
        "  Camera: {:?} lens at z = {:.2} m, pitch {:.1} deg",
        config.camera.kind,
        config.camera.position.z,
        config.camera.rotation.pitch.to_degrees()
    );
    println!(
        "  Robots: {}, misc robots: {}, shapes: {}",
        config.robot.len(),
        config.misc_robot.len(),
        config.shape.len()
    );
    Ok(())
}
