//! Segmentation colours and mask-driven placement
//!
//! Mask renders encode object classes as exact colours. Environment masks for
//! real captured backgrounds use the same palette, which lets the placement
//! pass back-project "field" pixels of a panorama onto the ground plane and
//! drop objects where the real image actually shows turf.

use glam::{DVec2, DVec3};
use image::RgbaImage;
use rand::Rng;
use rand_pcg::Pcg64;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geometry::{equirect_ray, intersect_ground, Euler};
use crate::placement::MAX_ATTEMPTS_PER_POINT;

/// Object classes of the segmentation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskClass {
    Unclassified,
    Ball,
    Field,
    FieldLines,
    Goal,
    Robot,
}

impl MaskClass {
    pub const ALL: [MaskClass; 6] = [
        MaskClass::Unclassified,
        MaskClass::Ball,
        MaskClass::Field,
        MaskClass::FieldLines,
        MaskClass::Goal,
        MaskClass::Robot,
    ];

    /// Emission colour of the class in the mask pass, RGBA in [0, 1].
    pub const fn colour(self) -> [f64; 4] {
        match self {
            MaskClass::Unclassified => [0.0, 0.0, 0.0, 1.0],
            MaskClass::Ball => [1.0, 0.0, 0.0, 1.0],
            MaskClass::Field => [0.0, 1.0, 0.0, 1.0],
            MaskClass::FieldLines => [1.0, 1.0, 1.0, 1.0],
            MaskClass::Goal => [1.0, 1.0, 0.0, 1.0],
            MaskClass::Robot => [0.0, 0.0, 1.0, 1.0],
        }
    }

    /// 8-bit form of the class colour as it appears in a decoded mask image.
    pub fn rgba(self) -> [u8; 4] {
        self.colour().map(|channel| (channel * 255.0).round() as u8)
    }
}

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("cannot read field mask {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Pixels of an environment mask that show playable turf.
///
/// Matching is byte-exact against the [`MaskClass::Field`] and
/// [`MaskClass::FieldLines`] colours; anti-aliased or compressed masks
/// simply yield fewer usable pixels.
pub struct FieldMask {
    width: u32,
    height: u32,
    field_pixels: Vec<(u32, u32)>,
}

impl FieldMask {
    pub fn from_image(image: &RgbaImage) -> Self {
        let field = MaskClass::Field.rgba();
        let lines = MaskClass::FieldLines.rgba();
        let field_pixels = image
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel.0 == field || pixel.0 == lines)
            .map(|(x, y, _)| (x, y))
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            field_pixels,
        }
    }

    pub fn load(path: &Path) -> Result<Self, MaskError> {
        let image = image::open(path).map_err(|source| MaskError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(&image.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of matching field pixels.
    pub fn len(&self) -> usize {
        self.field_pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_pixels.is_empty()
    }
}

/// Sample up to `count` ground points that a camera at `camera` sees as turf
/// in the given equirectangular mask.
///
/// Each candidate picks a random field pixel, back-projects it through the
/// environment rotation and intersects the ray with the ground plane.
/// Horizon rays and candidates closer than `separation` to an accepted point
/// are rejected. The attempt budget is bounded; a crowded or sparse mask
/// returns fewer points than requested and the caller places fewer objects.
pub fn point_on_field(
    camera: DVec3,
    mask: &FieldMask,
    env_rotation: Euler,
    count: usize,
    separation: f64,
    rng: &mut Pcg64,
) -> Vec<DVec3> {
    let mut points: Vec<DVec3> = Vec::with_capacity(count);
    if mask.is_empty() {
        return points;
    }
    let sep_sq = separation * separation;
    let budget = count.saturating_mul(MAX_ATTEMPTS_PER_POINT);
    let mut attempts = 0;
    while points.len() < count && attempts < budget {
        attempts += 1;
        let (x, y) = mask.field_pixels[rng.random_range(0..mask.field_pixels.len())];
        let pixel = DVec2::new(x as f64, y as f64);
        let ray = env_rotation.rotate(equirect_ray(pixel, mask.width, mask.height));
        let Some(hit) = intersect_ground(camera, ray) else {
            continue;
        };
        let clear = points
            .iter()
            .all(|p| (*p - hit).truncate().length_squared() >= sep_sq);
        if clear {
            points.push(hit);
        }
    }
    points
}
