//! Index command - list the assets a resource tree provides
//!
//! Runs the same discovery pass the generator uses and prints what it
//! found, marking captured environments that place objects via a mask.

use anyhow::Result;
use clap::Args;
use fieldgen_core::{AssetIndex, EnvironmentInfo};
use std::path::{Path, PathBuf};

/// Arguments for the index command
#[derive(Args)]
pub struct IndexArgs {
    /// Root of the resource tree (hdr/, balls/, grass/)
    pub resources: PathBuf,
}

/// Execute the index command
pub fn execute(args: IndexArgs) -> Result<()> {
    let assets = AssetIndex::load(&args.resources)?;

    println!("Environments ({}):", assets.hdris.len());
    for hdri in &assets.hdris {
        let info = match &hdri.info {
            Some(path) => EnvironmentInfo::load(path)?,
            None => EnvironmentInfo::synthetic(),
        };
        let kind = if info.is_semi_synthetic() {
            "captured"
        } else {
            "synthetic"
        };
        let mask = if hdri.mask.is_some() { ", mask" } else { "" };
        println!("  {} ({}{})", label(&hdri.raw), kind, mask);
    }

    println!("Balls ({}):", assets.balls.len());
    for ball in &assets.balls {
        let mesh = if ball.mesh.is_some() { " (mesh)" } else { "" };
        println!("  {}{}", label(&ball.colour), mesh);
    }

    println!("Grass sets ({}):", assets.grasses.len());
    for grass in &assets.grasses {
        println!("  {}", label(&grass.diffuse));
    }
    Ok(())
}

/// Assets are identified by the directory that groups their files.
fn label(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
