//! Scene description shared between the sampler, the render host and the
//! metadata writer
//!
//! A [`SceneConfig`] is plain data: every field is serde-friendly so a frame's
//! full configuration can be dumped next to its renders. Nominal dimensions
//! follow the RoboCup kid-size field.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use thiserror::Error;

use crate::camera::{DEFAULT_FISHEYE_FOCAL_MM, LensKind};
use crate::geometry::Euler;

/// Nominal ball radius, from a size-1 ball circumference of 0.5969 m.
pub const BALL_RADIUS: f64 = 0.5969 / TAU;

pub const FIELD_LENGTH: f64 = 9.0;
pub const FIELD_WIDTH: f64 = 6.0;
pub const GOAL_AREA_LENGTH: f64 = 1.0;
pub const GOAL_AREA_WIDTH: f64 = 5.0;
pub const PENALTY_MARK_DIST: f64 = 2.1;
pub const CENTRE_CIRCLE_RADIUS: f64 = 0.75;
pub const BORDER_WIDTH: f64 = 0.7;
pub const FIELD_LINE_WIDTH: f64 = 0.05;
pub const GRASS_HEIGHT: f64 = 0.033;

pub const GOAL_DEPTH: f64 = 0.6;
pub const GOAL_WIDTH: f64 = 2.6;
pub const GOAL_HEIGHT: f64 = 1.8;
pub const GOAL_POST_WIDTH: f64 = 0.12;
pub const GOAL_NET_HEIGHT: f64 = 1.2;

/// Baseline between the stereo pair, metres.
pub const STEREO_DISTANCE: f64 = 0.1;

/// Clearance radius a standing robot needs; doubles as the minimum
/// separation between placed objects.
pub const ROBOT_RADIUS: f64 = 0.6;

/// Height of the camera eye above the torso origin of the robot carrying it.
pub const CAMERA_MOUNT_HEIGHT: f64 = 0.33;

/// Complete description of one frame's scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub environment: EnvironmentConfig,
    pub field: FieldConfig,
    pub ball: BallConfig,
    pub goal: GoalConfig,
    pub camera: CameraConfig,
    pub anchor: AnchorConfig,
    pub shape: Vec<ShapeConfig>,
    pub robot: Vec<RobotConfig>,
    pub misc_robot: Vec<RobotConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Emission strength of the environment map.
    pub strength: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub length: f64,
    pub width: f64,
    pub goal_area: GoalAreaConfig,
    pub penalty_mark_dist: f64,
    pub centre_circle_radius: f64,
    pub border_width: f64,
    pub field_line_width: f64,
    pub grass_height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalAreaConfig {
    pub length: f64,
    pub width: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BallConfig {
    pub radius: f64,
    /// Spread of the per-frame radius jitter around the nominal radius.
    pub standard_deviation: f64,
    pub position: DVec3,
    pub rotation: Euler,
    /// When set, the placement pass may move the ball onto a mask-derived
    /// field point.
    pub auto_position: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalConfig {
    pub depth: f64,
    pub width: f64,
    pub height: f64,
    pub post_width: f64,
    pub shape: GoalShape,
    pub net_height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalShape {
    Circular,
    Square,
}

impl GoalConfig {
    /// World z of the goal object origin. The mesh hangs from the crossbar,
    /// whose resting height needs a post-profile-dependent correction.
    pub fn origin_z(&self) -> f64 {
        let factor = match self.shape {
            GoalShape::Square => 3.0,
            GoalShape::Circular => 1.0,
        };
        self.height - factor * self.post_width
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(rename = "type")]
    pub kind: LensKind,
    /// Focal length in millimetres; meaningful for the equisolid model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    /// Field of view in radians.
    pub fov: f64,
    pub stereo_camera_distance: f64,
    pub position: DVec3,
    pub rotation: Euler,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Ground point the camera falls back to tracking when nothing else is
    /// drawn.
    pub position: DVec3,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeConfig {
    pub dimensions: DVec3,
    pub position: DVec3,
    pub rotation: Euler,
    pub material: MaterialConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    pub base_colour: [f64; 3],
    pub metallic: f64,
    pub roughness: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub position: DVec3,
    pub rotation: Euler,
    pub auto_position: bool,
    /// Joint angles by name, radians.
    #[serde(default)]
    pub joints: BTreeMap<String, f64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("goal depth {depth:.3} exceeds the field border {border:.3}; the goal would overhang the turf")]
    GoalDepth { depth: f64, border: f64 },
    #[error("net height {net:.3} exceeds the goal height {goal:.3}")]
    NetHeight { net: f64, goal: f64 },
    #[error("penalty mark distance {dist:.3} must fall inside the half length {half_length:.3}")]
    PenaltyMark { dist: f64, half_length: f64 },
    #[error("centre circle radius {radius:.3} must fall inside the half width {half_width:.3}")]
    CentreCircle { radius: f64, half_width: f64 },
    #[error("camera height {camera:.3} is at or below the grass top {grass:.3}")]
    CameraHeight { camera: f64, grass: f64 },
    #[error("stereo baseline must not be negative, got {value}")]
    StereoBaseline { value: f64 },
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

impl SceneConfig {
    /// Reject dimension combinations that cannot produce a sane scene.
    /// Run before anything is handed to the render host; failures are fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("field length", self.field.length)?;
        require_positive("field width", self.field.width)?;
        require_positive("goal area length", self.field.goal_area.length)?;
        require_positive("goal area width", self.field.goal_area.width)?;
        require_positive("border width", self.field.border_width)?;
        require_positive("field line width", self.field.field_line_width)?;
        require_positive("ball radius", self.ball.radius)?;
        require_positive("goal width", self.goal.width)?;
        require_positive("goal height", self.goal.height)?;
        require_positive("goal post width", self.goal.post_width)?;
        require_positive("camera fov", self.camera.fov)?;
        if self.goal.depth > self.field.border_width {
            return Err(ConfigError::GoalDepth {
                depth: self.goal.depth,
                border: self.field.border_width,
            });
        }
        if self.goal.net_height > self.goal.height {
            return Err(ConfigError::NetHeight {
                net: self.goal.net_height,
                goal: self.goal.height,
            });
        }
        let half_length = self.field.length * 0.5;
        if self.field.penalty_mark_dist <= 0.0 || self.field.penalty_mark_dist >= half_length {
            return Err(ConfigError::PenaltyMark {
                dist: self.field.penalty_mark_dist,
                half_length,
            });
        }
        let half_width = self.field.width * 0.5;
        if self.field.centre_circle_radius <= 0.0 || self.field.centre_circle_radius >= half_width
        {
            return Err(ConfigError::CentreCircle {
                radius: self.field.centre_circle_radius,
                half_width,
            });
        }
        if self.camera.position.z <= self.field.grass_height {
            return Err(ConfigError::CameraHeight {
                camera: self.camera.position.z,
                grass: self.field.grass_height,
            });
        }
        if self.camera.stereo_camera_distance < 0.0 {
            return Err(ConfigError::StereoBaseline {
                value: self.camera.stereo_camera_distance,
            });
        }
        Ok(())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            environment: EnvironmentConfig::default(),
            field: FieldConfig::default(),
            ball: BallConfig::default(),
            goal: GoalConfig::default(),
            camera: CameraConfig::default(),
            anchor: AnchorConfig::default(),
            shape: Vec::new(),
            robot: Vec::new(),
            misc_robot: Vec::new(),
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self { strength: 1.0 }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            length: FIELD_LENGTH,
            width: FIELD_WIDTH,
            goal_area: GoalAreaConfig {
                length: GOAL_AREA_LENGTH,
                width: GOAL_AREA_WIDTH,
            },
            penalty_mark_dist: PENALTY_MARK_DIST,
            centre_circle_radius: CENTRE_CIRCLE_RADIUS,
            border_width: BORDER_WIDTH,
            field_line_width: FIELD_LINE_WIDTH,
            grass_height: GRASS_HEIGHT,
        }
    }
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            radius: BALL_RADIUS,
            standard_deviation: 0.005,
            position: DVec3::new(0.0, 0.0, BALL_RADIUS),
            rotation: Euler::ZERO,
            auto_position: true,
        }
    }
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            depth: GOAL_DEPTH,
            width: GOAL_WIDTH,
            height: GOAL_HEIGHT,
            post_width: GOAL_POST_WIDTH,
            shape: GoalShape::Square,
            net_height: GOAL_NET_HEIGHT,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            kind: LensKind::Equisolid,
            focal_length: Some(DEFAULT_FISHEYE_FOCAL_MM),
            fov: PI,
            stereo_camera_distance: STEREO_DISTANCE,
            position: DVec3::new(0.0, 0.0, 0.9),
            rotation: Euler::new(0.0, -FRAC_PI_2, 0.0),
        }
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
        }
    }
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            base_colour: [0.8, 0.8, 0.8],
            metallic: 0.0,
            roughness: 0.5,
        }
    }
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            dimensions: DVec3::new(0.1, 0.1, 0.1),
            position: DVec3::new(0.0, 0.0, 0.05),
            rotation: Euler::ZERO,
            material: MaterialConfig::default(),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: Euler::ZERO,
            auto_position: true,
            joints: BTreeMap::new(),
        }
    }
}
