//! Fieldgen.toml manifest parsing
//!
//! Shared manifest structures used by the generate and check commands.

use anyhow::{Context, Result};
use fieldgen_core::{FrameOptions, ImageSize, SceneCounts};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Fieldgen.toml manifest structure
#[derive(Debug, Deserialize)]
pub struct FieldgenManifest {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub scene: SceneSection,
    pub assets: AssetsSection,
}

/// Output location and per-frame file options
#[derive(Debug, Deserialize)]
pub struct OutputSection {
    /// Directory the run writes into.
    /// Default: "dataset"
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Number of frames to generate.
    /// Default: 1
    #[serde(default = "default_frames")]
    pub frames: u64,

    /// Zero-padded width of output file names.
    /// Default: 6
    #[serde(default = "default_filename_len")]
    pub filename_len: usize,

    /// Render a second eye offset by the stereo baseline.
    /// Default: false
    #[serde(default)]
    pub stereo: bool,

    /// Also write a depth pass per frame.
    /// Default: false
    #[serde(default)]
    pub depth: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dataset")
}

fn default_frames() -> u64 {
    1
}

fn default_filename_len() -> usize {
    6
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            frames: default_frames(),
            filename_len: default_filename_len(),
            stereo: false,
            depth: false,
        }
    }
}

/// Render target section
#[derive(Debug, Deserialize)]
pub struct RenderSection {
    /// Image width in pixels.
    /// Default: 1280
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels.
    /// Default: 1024
    #[serde(default = "default_height")]
    pub height: u32,

    /// Bounding boxes smaller than this on either side are dropped.
    /// Default: 2.0
    #[serde(default = "default_min_box_px")]
    pub min_box_px: f64,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    1024
}

fn default_min_box_px() -> f64 {
    2.0
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            min_box_px: default_min_box_px(),
        }
    }
}

/// Scene population section
#[derive(Debug, Deserialize)]
pub struct SceneSection {
    /// Seed for the scene random stream. Omit for a fresh stream per run.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Player robots beside the one carrying the camera.
    /// Default: 2
    #[serde(default = "default_robots")]
    pub robots: usize,

    /// Non-player robots with a simplified body.
    /// Default: 1
    #[serde(default = "default_misc_robots")]
    pub misc_robots: usize,

    /// Clutter boxes scattered as distractors.
    /// Default: 6
    #[serde(default = "default_shapes")]
    pub shapes: usize,
}

fn default_robots() -> usize {
    2
}

fn default_misc_robots() -> usize {
    1
}

fn default_shapes() -> usize {
    6
}

impl Default for SceneSection {
    fn default() -> Self {
        Self {
            seed: None,
            robots: default_robots(),
            misc_robots: default_misc_robots(),
            shapes: default_shapes(),
        }
    }
}

/// Asset resource tree section
#[derive(Debug, Deserialize)]
pub struct AssetsSection {
    /// Root of the resource tree (hdr/, balls/, grass/).
    pub resources: PathBuf,
}

impl FieldgenManifest {
    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse fieldgen.toml")
    }

    /// Validate manifest fields
    pub fn validate(&self) -> Result<()> {
        if self.output.frames == 0 {
            anyhow::bail!("Invalid frames 0 in fieldgen.toml (must be at least 1)");
        }
        if self.output.filename_len == 0 || self.output.filename_len > 16 {
            anyhow::bail!(
                "Invalid filename_len {} in fieldgen.toml (must be 1-16)",
                self.output.filename_len
            );
        }
        if self.render.width == 0 || self.render.height == 0 {
            anyhow::bail!(
                "Invalid render size {}x{} in fieldgen.toml (must be non-zero)",
                self.render.width,
                self.render.height
            );
        }
        if self.render.min_box_px < 0.0 {
            anyhow::bail!(
                "Invalid min_box_px {} in fieldgen.toml (must not be negative)",
                self.render.min_box_px
            );
        }
        if self.assets.resources.as_os_str().is_empty() {
            anyhow::bail!("Empty assets.resources path in fieldgen.toml");
        }
        Ok(())
    }

    /// Scene population, counting the camera carrier as a robot.
    pub fn counts(&self) -> SceneCounts {
        SceneCounts {
            robots: self.scene.robots + 1,
            misc_robots: self.scene.misc_robots,
            shapes: self.scene.shapes,
        }
    }

    /// Per-frame options for the generator.
    pub fn options(&self) -> FrameOptions {
        FrameOptions {
            image: ImageSize::new(self.render.width, self.render.height),
            stereo: self.output.stereo,
            depth: self.output.depth,
            filename_len: self.output.filename_len,
            min_box_px: self.render.min_box_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_minimal() {
        let manifest = FieldgenManifest::parse(
            r#"
[assets]
resources = "resources"
"#,
        )
        .unwrap();

        assert_eq!(manifest.output.dir, PathBuf::from("dataset"));
        assert_eq!(manifest.output.frames, 1);
        assert_eq!(manifest.output.filename_len, 6);
        assert!(!manifest.output.stereo);
        assert_eq!(manifest.render.width, 1280);
        assert_eq!(manifest.render.height, 1024);
        assert!(manifest.scene.seed.is_none());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_manifest_full() {
        let manifest = FieldgenManifest::parse(
            r#"
[output]
dir = "out/run1"
frames = 250
filename_len = 4
stereo = true
depth = true

[render]
width = 640
height = 480
min_box_px = 4.0

[scene]
seed = 7
robots = 4
misc_robots = 2
shapes = 10

[assets]
resources = "/data/field-assets"
"#,
        )
        .unwrap();

        assert_eq!(manifest.output.frames, 250);
        assert!(manifest.output.stereo);
        assert!(manifest.output.depth);
        assert_eq!(manifest.render.min_box_px, 4.0);
        assert_eq!(manifest.scene.seed, Some(7));
        assert!(manifest.validate().is_ok());

        let options = manifest.options();
        assert_eq!(options.image.width, 640);
        assert_eq!(options.filename_len, 4);
        assert!(options.stereo);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldgen.toml");
        std::fs::write(&path, "[assets]\nresources = \"resources\"\n").unwrap();

        let manifest = FieldgenManifest::load(&path).unwrap();
        assert_eq!(manifest.output.frames, 1);

        let err = FieldgenManifest::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read manifest"));
    }

    #[test]
    fn test_missing_assets_section_fails() {
        assert!(FieldgenManifest::parse("[output]\nframes = 5\n").is_err());
    }

    #[test]
    fn test_counts_include_the_camera_carrier() {
        let manifest = FieldgenManifest::parse(
            r#"
[scene]
robots = 2

[assets]
resources = "resources"
"#,
        )
        .unwrap();

        let counts = manifest.counts();
        assert_eq!(counts.robots, 3);
        assert_eq!(counts.misc_robots, 1);
        assert_eq!(counts.shapes, 6);
    }

    #[test]
    fn test_frames_zero_invalid() {
        let manifest = FieldgenManifest::parse(
            r#"
[output]
frames = 0

[assets]
resources = "resources"
"#,
        )
        .unwrap();

        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_filename_len_out_of_range() {
        let manifest = FieldgenManifest::parse(
            r#"
[output]
filename_len = 32

[assets]
resources = "resources"
"#,
        )
        .unwrap();

        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_zero_render_size_invalid() {
        let manifest = FieldgenManifest::parse(
            r#"
[render]
width = 0

[assets]
resources = "resources"
"#,
        )
        .unwrap();

        assert!(manifest.validate().is_err());
    }
}
