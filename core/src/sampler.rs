//! Per-frame scene randomisation
//!
//! [`SceneSampler`] owns the run's random stream (a seedable PCG-64) and
//! draws a fresh [`SceneConfig`] for every frame. All tunable ranges live in
//! the [`Limits`] table; everything outside a limit range is a fixed field
//! constant from the config module.

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::camera::{DEFAULT_FISHEYE_FOCAL_MM, LensKind};
use crate::config::{
    AnchorConfig, BALL_RADIUS, BallConfig, CameraConfig, EnvironmentConfig, FieldConfig,
    GoalAreaConfig, GoalConfig, GoalShape, MaterialConfig, RobotConfig, STEREO_DISTANCE,
    SceneConfig, ShapeConfig, CENTRE_CIRCLE_RADIUS, FIELD_LINE_WIDTH, GOAL_AREA_LENGTH,
    GOAL_AREA_WIDTH, PENALTY_MARK_DIST, BORDER_WIDTH,
};
use crate::geometry::Euler;

/// Robot joint ranges as `(name, min, neutral, max)`, radians. The jitter
/// pass keeps each joint near its neutral pose, scaled by the kinematics
/// variance.
pub const ROBOT_JOINT_LIMITS: &[(&str, f64, f64, f64)] = &[
    ("head_pitch", -0.6, 0.0, 0.6),
    ("head_yaw", -1.5, 0.0, 1.5),
    ("left_shoulder_pitch", -1.0, 0.2, 2.0),
    ("right_shoulder_pitch", -1.0, 0.2, 2.0),
    ("left_elbow", -1.8, -0.5, 0.0),
    ("right_elbow", -1.8, -0.5, 0.0),
    ("left_hip_pitch", -1.2, -0.3, 0.6),
    ("right_hip_pitch", -1.2, -0.3, 0.6),
    ("left_knee", 0.0, 0.6, 2.0),
    ("right_knee", 0.0, 0.6, 2.0),
];

/// An inclusive sampling range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn sample(&self, rng: &mut Pcg64) -> f64 {
        if self.max <= self.min {
            self.min
        } else {
            rng.random_range(self.min..=self.max)
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Sampling ranges for everything randomised per frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub environment_strength: Span,
    pub field_length: Span,
    pub field_width: Span,
    pub grass_height: Span,
    /// Half-width of the triangular jitter around the nominal ball radius.
    pub ball_radius_dev: f64,
    pub camera_height: Span,
    /// Camera elevation range, radians; negative values look down.
    pub camera_pitch: Span,
    pub camera_roll: Span,
    /// Field of view drawn when the rectilinear model is picked; the
    /// equisolid model always renders its full half-sphere.
    pub rectilinear_fov: Span,
    pub shape_size: Span,
    pub shape_height: Span,
    pub robot_torso_height: Span,
    pub misc_robot_height: Span,
    /// Probability that a ball or robot opts into mask-driven placement.
    pub auto_position_probability: f64,
    /// Fraction of each joint's range used by the pose jitter.
    pub kinematics_variance: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            environment_strength: Span::new(0.5, 1.2),
            field_length: Span::new(8.0, 10.0),
            field_width: Span::new(5.5, 7.0),
            grass_height: Span::new(0.02, 0.045),
            ball_radius_dev: 0.005,
            camera_height: Span::new(0.8, 1.0),
            camera_pitch: Span::new((-70f64).to_radians(), (-30f64).to_radians()),
            camera_roll: Span::new(-0.15, 0.15),
            rectilinear_fov: Span::new(60f64.to_radians(), 100f64.to_radians()),
            shape_size: Span::new(0.05, 0.5),
            shape_height: Span::new(0.05, 0.5),
            robot_torso_height: Span::new(0.47, 0.67),
            misc_robot_height: Span::new(0.2, 0.3),
            auto_position_probability: 0.5,
            kinematics_variance: 0.15,
        }
    }
}

/// How many of each mobile object to put in the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneCounts {
    /// Player robots, including the one carrying the camera.
    pub robots: usize,
    /// Non-player robots with a simplified body.
    pub misc_robots: usize,
    /// Clutter boxes scattered as distractors.
    pub shapes: usize,
}

impl Default for SceneCounts {
    fn default() -> Self {
        Self {
            robots: 3,
            misc_robots: 1,
            shapes: 6,
        }
    }
}

/// Draw from a triangular distribution over `[min, max]` peaking at `mode`,
/// by inverting its CDF.
fn triangular(rng: &mut Pcg64, min: f64, max: f64, mode: f64) -> f64 {
    if max <= min {
        return min;
    }
    let u: f64 = rng.random();
    let cut = ((mode - min) / (max - min)).clamp(0.0, 1.0);
    if u <= cut {
        min + ((max - min) * (mode - min) * u).sqrt()
    } else {
        max - ((max - min) * (max - mode) * (1.0 - u)).sqrt()
    }
}

pub struct SceneSampler {
    rng: Pcg64,
    limits: Limits,
    counts: SceneCounts,
}

impl SceneSampler {
    pub fn new(seed: Option<u64>, limits: Limits, counts: SceneCounts) -> Self {
        let rng = match seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_rng(&mut rand::rng()),
        };
        Self {
            rng,
            limits,
            counts,
        }
    }

    /// Default limits and counts with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed), Limits::default(), SceneCounts::default())
    }

    /// The run's random stream; downstream passes (placement, asset choice)
    /// draw from the same stream so a seed reproduces the whole run.
    pub fn rng(&mut self) -> &mut Pcg64 {
        &mut self.rng
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn counts(&self) -> SceneCounts {
        self.counts
    }

    /// Draw a complete scene configuration.
    ///
    /// The field is finalised first; every other position is drawn relative
    /// to the field dimensions of the same configuration.
    pub fn configure_scene(&mut self) -> SceneConfig {
        let field = self.sample_field();
        let environment = EnvironmentConfig {
            strength: self.limits.environment_strength.sample(&mut self.rng),
        };
        let ball = self.sample_ball(&field);
        let goal = self.sample_goal();
        let camera = self.sample_camera(&field);
        let (ax, ay) = self.field_xy(&field);
        let anchor = AnchorConfig {
            position: DVec3::new(ax, ay, 0.0),
        };
        let shape = (0..self.counts.shapes)
            .map(|_| self.sample_shape(&field))
            .collect();
        let robot = (0..self.counts.robots)
            .map(|_| self.sample_robot(&field))
            .collect();
        let misc_robot = (0..self.counts.misc_robots)
            .map(|_| self.sample_misc_robot(&field))
            .collect();
        SceneConfig {
            environment,
            field,
            ball,
            goal,
            camera,
            anchor,
            shape,
            robot,
            misc_robot,
        }
    }

    /// Uniform position on the field, in field-centred coordinates.
    fn field_xy(&mut self, field: &FieldConfig) -> (f64, f64) {
        let half_l = field.length * 0.5;
        let half_w = field.width * 0.5;
        (
            self.rng.random_range(-half_l..=half_l),
            self.rng.random_range(-half_w..=half_w),
        )
    }

    fn angle(&mut self) -> f64 {
        self.rng.random_range(-PI..=PI)
    }

    fn sample_field(&mut self) -> FieldConfig {
        FieldConfig {
            length: self.limits.field_length.sample(&mut self.rng),
            width: self.limits.field_width.sample(&mut self.rng),
            goal_area: GoalAreaConfig {
                length: GOAL_AREA_LENGTH,
                width: GOAL_AREA_WIDTH,
            },
            penalty_mark_dist: PENALTY_MARK_DIST,
            centre_circle_radius: CENTRE_CIRCLE_RADIUS,
            border_width: BORDER_WIDTH,
            field_line_width: FIELD_LINE_WIDTH,
            grass_height: self.limits.grass_height.sample(&mut self.rng),
        }
    }

    fn sample_ball(&mut self, field: &FieldConfig) -> BallConfig {
        let dev = self.limits.ball_radius_dev;
        let radius = triangular(
            &mut self.rng,
            BALL_RADIUS - dev,
            BALL_RADIUS + dev,
            BALL_RADIUS,
        );
        let (x, y) = self.field_xy(field);
        BallConfig {
            radius,
            standard_deviation: dev,
            position: DVec3::new(x, y, radius),
            rotation: Euler::new(self.angle(), self.angle(), self.angle()),
            auto_position: self
                .rng
                .random_bool(self.limits.auto_position_probability),
        }
    }

    fn sample_goal(&mut self) -> GoalConfig {
        GoalConfig {
            shape: if self.rng.random_bool(0.5) {
                GoalShape::Square
            } else {
                GoalShape::Circular
            },
            ..GoalConfig::default()
        }
    }

    fn sample_camera(&mut self, field: &FieldConfig) -> CameraConfig {
        let (kind, focal_length, fov) = if self.rng.random_bool(0.5) {
            (LensKind::Equisolid, Some(DEFAULT_FISHEYE_FOCAL_MM), PI)
        } else {
            (
                LensKind::Rectilinear,
                None,
                self.limits.rectilinear_fov.sample(&mut self.rng),
            )
        };
        let (x, y) = self.field_xy(field);
        CameraConfig {
            kind,
            focal_length,
            fov,
            stereo_camera_distance: STEREO_DISTANCE,
            position: DVec3::new(x, y, self.limits.camera_height.sample(&mut self.rng)),
            rotation: Euler::new(
                self.limits.camera_roll.sample(&mut self.rng),
                self.limits.camera_pitch.sample(&mut self.rng),
                self.angle(),
            ),
        }
    }

    fn sample_shape(&mut self, field: &FieldConfig) -> ShapeConfig {
        let (x, y) = self.field_xy(field);
        ShapeConfig {
            dimensions: DVec3::new(
                self.limits.shape_size.sample(&mut self.rng),
                self.limits.shape_size.sample(&mut self.rng),
                self.limits.shape_size.sample(&mut self.rng),
            ),
            position: DVec3::new(x, y, self.limits.shape_height.sample(&mut self.rng)),
            rotation: Euler::new(self.angle(), self.angle(), self.angle()),
            material: MaterialConfig {
                base_colour: [
                    self.rng.random_range(0.0..=1.0),
                    self.rng.random_range(0.0..=1.0),
                    self.rng.random_range(0.0..=1.0),
                ],
                metallic: self.rng.random_range(0.0..=1.0),
                roughness: self.rng.random_range(0.0..=1.0),
            },
        }
    }

    fn sample_robot(&mut self, field: &FieldConfig) -> RobotConfig {
        let (x, y) = self.field_xy(field);
        RobotConfig {
            position: DVec3::new(x, y, self.limits.robot_torso_height.sample(&mut self.rng)),
            rotation: Euler::new(0.0, 0.0, self.angle()),
            auto_position: self
                .rng
                .random_bool(self.limits.auto_position_probability),
            joints: self.sample_joints(),
        }
    }

    /// Misc robots keep a fixed kneeling-height body; their z doubles as the
    /// body height when the annotation box is built.
    fn sample_misc_robot(&mut self, field: &FieldConfig) -> RobotConfig {
        let (x, y) = self.field_xy(field);
        RobotConfig {
            position: DVec3::new(x, y, self.limits.misc_robot_height.sample(&mut self.rng)),
            rotation: Euler::new(0.0, 0.0, self.angle()),
            auto_position: true,
            joints: BTreeMap::new(),
        }
    }

    fn sample_joints(&mut self) -> BTreeMap<String, f64> {
        let variance = self.limits.kinematics_variance;
        ROBOT_JOINT_LIMITS
            .iter()
            .map(|&(name, lo, neutral, hi)| {
                let min = neutral - variance * (neutral - lo);
                let max = neutral + variance * (hi - neutral);
                (
                    name.to_string(),
                    triangular(&mut self.rng, min, max, neutral),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_scene() {
        let a = SceneSampler::seeded(99).configure_scene();
        let b = SceneSampler::seeded(99).configure_scene();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = SceneSampler::seeded(1).configure_scene();
        let b = SceneSampler::seeded(2).configure_scene();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sampled_scenes_validate_and_stay_in_limits() {
        let limits = Limits::default();
        let mut sampler = SceneSampler::seeded(7);
        for _ in 0..1000 {
            let config = sampler.configure_scene();
            config.validate().unwrap();

            assert!(limits.field_length.contains(config.field.length));
            assert!(limits.field_width.contains(config.field.width));
            assert!(limits.grass_height.contains(config.field.grass_height));
            assert!((config.ball.radius - BALL_RADIUS).abs() <= limits.ball_radius_dev);
            assert!(limits.camera_height.contains(config.camera.position.z));
            assert!(limits.camera_pitch.contains(config.camera.rotation.pitch));

            let half_l = config.field.length * 0.5;
            let half_w = config.field.width * 0.5;
            let on_field = |p: DVec3| {
                p.x >= -half_l && p.x <= half_l && p.y >= -half_w && p.y <= half_w
            };
            assert!(on_field(config.ball.position));
            assert!(on_field(config.anchor.position));
            assert!(on_field(config.camera.position));
            for robot in config.robot.iter().chain(&config.misc_robot) {
                assert!(on_field(robot.position));
                assert!(robot.rotation.yaw >= -PI && robot.rotation.yaw <= PI);
            }
            for shape in &config.shape {
                assert!(on_field(shape.position));
                assert!(limits.shape_size.contains(shape.dimensions.x));
            }
        }
    }

    #[test]
    fn test_counts_respected() {
        let counts = SceneCounts {
            robots: 5,
            misc_robots: 2,
            shapes: 9,
        };
        let mut sampler = SceneSampler::new(Some(3), Limits::default(), counts);
        let config = sampler.configure_scene();
        assert_eq!(config.robot.len(), 5);
        assert_eq!(config.misc_robot.len(), 2);
        assert_eq!(config.shape.len(), 9);
    }

    #[test]
    fn test_both_lens_kinds_appear() {
        let mut sampler = SceneSampler::seeded(11);
        let mut equisolid = 0;
        let mut rectilinear = 0;
        for _ in 0..100 {
            match sampler.configure_scene().camera.kind {
                LensKind::Equisolid => equisolid += 1,
                LensKind::Rectilinear => rectilinear += 1,
            }
        }
        assert!(equisolid > 20, "equisolid drawn {equisolid} times");
        assert!(rectilinear > 20, "rectilinear drawn {rectilinear} times");
    }

    #[test]
    fn test_joint_jitter_stays_near_neutral() {
        let limits = Limits::default();
        let mut sampler = SceneSampler::seeded(5);
        for _ in 0..50 {
            let config = sampler.configure_scene();
            for robot in &config.robot {
                assert_eq!(robot.joints.len(), ROBOT_JOINT_LIMITS.len());
                for &(name, lo, neutral, hi) in ROBOT_JOINT_LIMITS {
                    let v = robot.joints[name];
                    let min = neutral - limits.kinematics_variance * (neutral - lo);
                    let max = neutral + limits.kinematics_variance * (hi - neutral);
                    assert!(v >= min && v <= max, "{name} = {v} outside [{min}, {max}]");
                }
            }
        }
    }

    #[test]
    fn test_triangular_peaks_at_mode() {
        let mut rng = Pcg64::seed_from_u64(21);
        let (min, max, mode) = (0.0, 1.0, 0.25);
        let n = 20_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let v = triangular(&mut rng, min, max, mode);
            assert!(v >= min && v <= max);
            sum += v;
        }
        // The mean of a triangular distribution is (min + mode + max) / 3.
        let mean = sum / n as f64;
        assert!((mean - (min + max + mode) / 3.0).abs() < 0.01, "mean {mean}");
    }

    #[test]
    fn test_degenerate_span_returns_min() {
        let mut rng = Pcg64::seed_from_u64(1);
        assert_eq!(Span::new(0.4, 0.4).sample(&mut rng), 0.4);
        assert_eq!(triangular(&mut rng, 0.7, 0.7, 0.7), 0.7);
    }
}
