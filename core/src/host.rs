//! Render host interface
//!
//! Scene assembly and rendering run in an external engine; the generator
//! talks to it through [`RenderHost`]. Each frame pushes the full object
//! state, binds the camera, then requests one render per output pass.
//! [`NullHost`] is the bundled dry-run backend: it records what it was asked
//! to do and produces no images, which is enough for planning runs and tests.

use glam::DVec3;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::assets::{BallAsset, GrassAsset};
use crate::camera::CameraRig;
use crate::config::MaterialConfig;
use crate::geometry::Euler;

/// Texture set attached to an object for the host to bind.
#[derive(Clone, Debug)]
pub enum AssetRef {
    Ball(BallAsset),
    Grass(GrassAsset),
}

/// Pose and appearance of one scene object for the current frame.
#[derive(Clone, Debug)]
pub struct ObjectState {
    pub name: String,
    pub position: DVec3,
    pub rotation: Euler,
    pub dimensions: Option<DVec3>,
    pub material: Option<MaterialConfig>,
    pub asset: Option<AssetRef>,
    /// Joint angles for articulated bodies, radians.
    pub joints: BTreeMap<String, f64>,
    pub visible: bool,
}

impl ObjectState {
    pub fn new(name: impl Into<String>, position: DVec3, rotation: Euler) -> Self {
        Self {
            name: name.into(),
            position,
            rotation,
            dimensions: None,
            material: None,
            asset: None,
            joints: BTreeMap::new(),
            visible: true,
        }
    }

    pub fn with_dimensions(mut self, dimensions: DVec3) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_material(mut self, material: MaterialConfig) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_asset(mut self, asset: AssetRef) -> Self {
        self.asset = Some(asset);
        self
    }

    pub fn with_joints(mut self, joints: BTreeMap<String, f64>) -> Self {
        self.joints = joints;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// One render of the current scene state.
#[derive(Clone, Debug)]
pub enum RenderPass<'a> {
    /// Photoreal pass lit by the environment panorama.
    Raw { hdri: &'a Path, strength: f64 },
    /// Flat-colour segmentation pass. Semi-synthetic scenes light it with
    /// the panorama's mask so real turf keeps its class colour; fully
    /// synthetic scenes render over black.
    Mask { hdri: Option<&'a Path> },
    /// Scene depth, typically written as EXR.
    Depth,
}

impl RenderPass<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            RenderPass::Raw { .. } => "raw",
            RenderPass::Mask { .. } => "mask",
            RenderPass::Depth => "depth",
        }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("render backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait RenderHost {
    /// Replace the scene's object states for the coming renders.
    fn apply(&mut self, objects: &[ObjectState]) -> Result<(), HostError>;

    /// Pose the render camera(s).
    fn bind_camera(&mut self, rig: &CameraRig) -> Result<(), HostError>;

    /// Render one pass of the current state to `output`.
    fn render(&mut self, pass: RenderPass<'_>, output: &Path) -> Result<(), HostError>;
}

/// Dry-run backend: records every call, writes nothing.
#[derive(Default)]
pub struct NullHost {
    pub objects: Vec<ObjectState>,
    pub camera: Option<CameraRig>,
    pub renders: Vec<(String, PathBuf)>,
}

impl NullHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderHost for NullHost {
    fn apply(&mut self, objects: &[ObjectState]) -> Result<(), HostError> {
        self.objects = objects.to_vec();
        Ok(())
    }

    fn bind_camera(&mut self, rig: &CameraRig) -> Result<(), HostError> {
        self.camera = Some(*rig);
        Ok(())
    }

    fn render(&mut self, pass: RenderPass<'_>, output: &Path) -> Result<(), HostError> {
        self.renders.push((pass.name().to_string(), output.to_path_buf()));
        Ok(())
    }
}
