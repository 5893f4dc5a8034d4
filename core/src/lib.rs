//! Synthetic RoboCup soccer dataset generation
//!
//! This crate builds randomised field scenes and drives an external render
//! host to produce training images with pixel-accurate segmentation masks,
//! detection labels and full per-frame metadata. It is consumed by:
//! - `fieldgen-cli` (run orchestration, asset inspection)
//! - render host integrations embedding [`FrameGenerator`]
//!
//! # Modules
//!
//! - [`geometry`] - Euler rotations, equirectangular rays, ground intersection
//! - [`camera`] - Lens models (equisolid fisheye, rectilinear) and the camera rig
//! - [`config`] - Scene description types and validation
//! - [`sampler`] - Per-frame scene randomisation
//! - [`placement`] - Separated position sampling over the field
//! - [`mask`] - Segmentation colours and mask-driven placement
//! - [`assets`] - Resource discovery under a resource root
//! - [`annotate`] - Detection label generation
//! - [`host`] - Render host interface and the dry-run backend
//! - [`frame`] - The per-frame pipeline and output bookkeeping

pub mod annotate;
pub mod assets;
pub mod camera;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod host;
pub mod mask;
pub mod placement;
pub mod sampler;

// Re-export the frame pipeline entry points
pub use frame::{FrameError, FrameGenerator, FrameOptions, FrameRecord, OutputDirs};

// Re-export commonly used scene and camera types
pub use camera::{CameraRig, ImageSize, Lens, LensKind, SensorSpec};
pub use config::{ConfigError, GoalShape, SceneConfig};
pub use geometry::Euler;
pub use sampler::{Limits, SceneCounts, SceneSampler, Span};

// Re-export the annotation and asset surfaces
pub use annotate::{Annotation, Annotator, Entity, EntityKind, ObjectClass};
pub use assets::{AssetError, AssetIndex, EnvironmentInfo, ToDraw};
pub use host::{HostError, NullHost, ObjectState, RenderHost, RenderPass};
pub use mask::{point_on_field, FieldMask, MaskClass, MaskError};
pub use placement::{generate_moves, PlacementError};
