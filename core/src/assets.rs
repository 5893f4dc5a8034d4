//! Resource discovery
//!
//! Assets live in per-asset directories under three class roots:
//! `hdr/` for environment panoramas, `balls/` for ball texture sets and
//! `grass/` for turf materials. Files are recognised by case-insensitive
//! name patterns; a directory missing the mandatory file of its class is
//! skipped, extra files are ignored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::geometry::Euler;

const HDRI_SPECS: &[(&str, &str)] = &[
    ("raw", r"(?i)^raw.*\.hdr$"),
    ("mask", r"(?i)^mask.*\.(png|hdr|mask)$"),
    ("info", r"(?i)\.json$"),
];

const BALL_SPECS: &[(&str, &str)] = &[
    ("colour", r"(?i)^colou?r.*\.(png|jpe?g)$"),
    ("normal", r"(?i)^norm(al)?.*\.(png|jpe?g)$"),
    ("mesh", r"(?i)\.(fbx|obj)$"),
];

const GRASS_SPECS: &[(&str, &str)] = &[
    ("diffuse", r"(?i)diffuse.*\.(png|jpe?g)$"),
    ("normal", r"(?i)normal.*\.(png|jpe?g)$"),
    ("bump", r"(?i)bump.*\.(png|jpe?g)$"),
];

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset root {path} is not a directory")]
    MissingRoot { path: PathBuf },
    #[error("no usable assets under {path} (expected a file matching {pattern})")]
    NoAssets { path: PathBuf, pattern: &'static str },
    #[error("invalid asset pattern {pattern}: {source}")]
    Pattern {
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("cannot read environment info {path}: {source}")]
    InfoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse environment info {path}: {source}")]
    InfoParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// An environment panorama: the raw render backdrop plus, for captured
/// real-world panoramas, a segmentation mask and a ground-truth info file.
#[derive(Clone, Debug)]
pub struct HdriAsset {
    pub raw: PathBuf,
    pub mask: Option<PathBuf>,
    pub info: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct BallAsset {
    pub colour: PathBuf,
    pub normal: Option<PathBuf>,
    pub mesh: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct GrassAsset {
    pub diffuse: PathBuf,
    pub normal: Option<PathBuf>,
    pub bump: Option<PathBuf>,
}

/// Everything discovered under a resource root.
pub struct AssetIndex {
    pub hdris: Vec<HdriAsset>,
    pub balls: Vec<BallAsset>,
    pub grasses: Vec<GrassAsset>,
}

impl AssetIndex {
    /// Scan `hdr/`, `balls/` and `grass/` under the resource root. Each
    /// class must yield at least one asset; a generator with nothing to
    /// composite cannot produce frames.
    pub fn load(resource_root: &Path) -> Result<Self, AssetError> {
        Ok(Self {
            hdris: index_hdris(&resource_root.join("hdr"))?,
            balls: index_balls(&resource_root.join("balls"))?,
            grasses: index_grasses(&resource_root.join("grass"))?,
        })
    }
}

/// Scan per-asset directories under `root`, matching file names against the
/// field patterns. Later files in lexical order overwrite earlier matches of
/// the same field; only directories containing the first (mandatory) field
/// produce a record. Records come back in directory order.
fn scan_asset_dirs(
    root: &Path,
    specs: &[(&'static str, &'static str)],
) -> Result<Vec<BTreeMap<&'static str, PathBuf>>, AssetError> {
    if !root.is_dir() {
        return Err(AssetError::MissingRoot {
            path: root.to_path_buf(),
        });
    }
    let mut fields = Vec::with_capacity(specs.len());
    for &(name, pattern) in specs {
        let regex = Regex::new(pattern).map_err(|source| AssetError::Pattern {
            pattern,
            source,
        })?;
        fields.push((name, regex));
    }

    let mut dirs: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            dirs.entry(parent.to_path_buf())
                .or_default()
                .push(entry.path().to_path_buf());
        }
    }

    let mandatory = specs[0].0;
    let mut records = Vec::new();
    for (_, mut files) in dirs {
        files.sort();
        let mut record: BTreeMap<&'static str, PathBuf> = BTreeMap::new();
        for file in &files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            for (field, regex) in &fields {
                if regex.is_match(name) {
                    record.insert(field, file.clone());
                }
            }
        }
        if record.contains_key(mandatory) {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn index_hdris(dir: &Path) -> Result<Vec<HdriAsset>, AssetError> {
    let hdris: Vec<_> = scan_asset_dirs(dir, HDRI_SPECS)?
        .into_iter()
        .filter_map(|mut record| {
            record.remove("raw").map(|raw| HdriAsset {
                raw,
                mask: record.remove("mask"),
                info: record.remove("info"),
            })
        })
        .collect();
    if hdris.is_empty() {
        return Err(AssetError::NoAssets {
            path: dir.to_path_buf(),
            pattern: HDRI_SPECS[0].1,
        });
    }
    Ok(hdris)
}

pub fn index_balls(dir: &Path) -> Result<Vec<BallAsset>, AssetError> {
    let balls: Vec<_> = scan_asset_dirs(dir, BALL_SPECS)?
        .into_iter()
        .filter_map(|mut record| {
            record.remove("colour").map(|colour| BallAsset {
                colour,
                normal: record.remove("normal"),
                mesh: record.remove("mesh"),
            })
        })
        .collect();
    if balls.is_empty() {
        return Err(AssetError::NoAssets {
            path: dir.to_path_buf(),
            pattern: BALL_SPECS[0].1,
        });
    }
    Ok(balls)
}

pub fn index_grasses(dir: &Path) -> Result<Vec<GrassAsset>, AssetError> {
    let grasses: Vec<_> = scan_asset_dirs(dir, GRASS_SPECS)?
        .into_iter()
        .filter_map(|mut record| {
            record.remove("diffuse").map(|diffuse| GrassAsset {
                diffuse,
                normal: record.remove("normal"),
                bump: record.remove("bump"),
            })
        })
        .collect();
    if grasses.is_empty() {
        return Err(AssetError::NoAssets {
            path: dir.to_path_buf(),
            pattern: GRASS_SPECS[0].1,
        });
    }
    Ok(grasses)
}

fn default_true() -> bool {
    true
}

/// Which synthetic objects an environment wants drawn. Captured panoramas
/// already containing a real goal or field switch those objects off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToDraw {
    #[serde(default = "default_true")]
    pub ball: bool,
    #[serde(default = "default_true")]
    pub goal: bool,
    #[serde(default = "default_true")]
    pub field: bool,
}

impl Default for ToDraw {
    fn default() -> Self {
        Self {
            ball: true,
            goal: true,
            field: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentPosition {
    /// Height of the capture camera above the ground, metres.
    pub z: f64,
}

impl Default for EnvironmentPosition {
    fn default() -> Self {
        Self { z: 0.9 }
    }
}

/// Ground truth recorded alongside a captured panorama.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentInfo {
    pub rotation: Euler,
    pub position: EnvironmentPosition,
    pub to_draw: ToDraw,
}

impl EnvironmentInfo {
    /// Info used for fully synthetic panoramas: draw everything, no
    /// environment rotation.
    pub fn synthetic() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let text = fs::read_to_string(path).map_err(|source| AssetError::InfoRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| AssetError::InfoParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A scene is semi-synthetic when the panorama supplies its own field or
    /// goal, pinning the camera to the capture height.
    pub fn is_semi_synthetic(&self) -> bool {
        !(self.to_draw.goal && self.to_draw.field)
    }
}
