//! Per-frame generation pipeline
//!
//! A frame is: sample a scene, resolve the environment, place the mobile
//! objects, aim the camera at a tracking target, hand everything to the
//! render host, then write labels and metadata next to the renders.
//!
//! Output layout under the run root:
//! `raw/` photoreal renders, `seg/` segmentation masks, `meta/` full frame
//! metadata as JSON, `labels/` detection boxes, and optionally `depth/`.

use glam::{DMat4, DVec3};
use rand::Rng;
use serde_json::{json, Value};
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::annotate::{scene_entities, Annotation, Annotator};
use crate::assets::{AssetError, AssetIndex, BallAsset, EnvironmentInfo, GrassAsset, HdriAsset, ToDraw};
use crate::camera::{CameraRig, ImageSize, Lens};
use crate::config::{ConfigError, SceneConfig, CAMERA_MOUNT_HEIGHT, ROBOT_RADIUS};
use crate::geometry::Euler;
use crate::host::{AssetRef, HostError, ObjectState, RenderHost, RenderPass};
use crate::mask::{point_on_field, FieldMask, MaskError};
use crate::placement::{generate_moves, PlacementError};
use crate::sampler::SceneSampler;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Mask(#[from] MaskError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Output directory set of a run. `depth/` exists only when the depth pass
/// is enabled.
#[derive(Clone, Debug)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub seg: PathBuf,
    pub meta: PathBuf,
    pub labels: PathBuf,
    pub depth: Option<PathBuf>,
}

impl OutputDirs {
    pub fn create(root: &Path, with_depth: bool) -> Result<Self, FrameError> {
        let dirs = Self {
            root: root.to_path_buf(),
            raw: root.join("raw"),
            seg: root.join("seg"),
            meta: root.join("meta"),
            labels: root.join("labels"),
            depth: with_depth.then(|| root.join("depth")),
        };
        for dir in [&dirs.raw, &dirs.seg, &dirs.meta, &dirs.labels] {
            fs::create_dir_all(dir).map_err(|source| FrameError::Write {
                path: dir.clone(),
                source,
            })?;
        }
        if let Some(dir) = &dirs.depth {
            fs::create_dir_all(dir).map_err(|source| FrameError::Write {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(dirs)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FrameOptions {
    pub image: ImageSize,
    pub stereo: bool,
    pub depth: bool,
    /// Zero-padded width of output file names.
    pub filename_len: usize,
    pub min_box_px: f64,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            image: ImageSize::default(),
            stereo: false,
            depth: false,
            filename_len: 6,
            min_box_px: 2.0,
        }
    }
}

/// What one frame produced.
pub struct FrameRecord {
    pub frame: u64,
    pub config: SceneConfig,
    pub semi_synthetic: bool,
    pub annotations: Vec<Annotation>,
    pub skipped_annotations: usize,
    pub raw_path: PathBuf,
    pub seg_path: PathBuf,
    pub meta_path: PathBuf,
    pub label_path: PathBuf,
}

pub struct FrameGenerator<H> {
    host: H,
    sampler: SceneSampler,
    assets: AssetIndex,
    options: FrameOptions,
    dirs: OutputDirs,
    resource_root: PathBuf,
}

impl<H: RenderHost> FrameGenerator<H> {
    pub fn new(
        host: H,
        sampler: SceneSampler,
        assets: AssetIndex,
        options: FrameOptions,
        dirs: OutputDirs,
        resource_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            sampler,
            assets,
            options,
            dirs,
            resource_root: resource_root.into(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Generate `frames` consecutive frames starting at index 0.
    pub fn run(&mut self, frames: u64) -> Result<(), FrameError> {
        info!(
            frames,
            hdris = self.assets.hdris.len(),
            balls = self.assets.balls.len(),
            grasses = self.assets.grasses.len(),
            "starting dataset generation"
        );
        for frame in 0..frames {
            self.generate_frame(frame)?;
        }
        Ok(())
    }

    pub fn generate_frame(&mut self, frame: u64) -> Result<FrameRecord, FrameError> {
        let mut config = self.sampler.configure_scene();
        config.validate()?;

        // The asset lists are non-empty by construction of AssetIndex::load.
        let index = self.pick(self.assets.hdris.len());
        let hdri = self.assets.hdris[index].clone();
        let index = self.pick(self.assets.balls.len());
        let ball_asset = self.assets.balls[index].clone();
        let index = self.pick(self.assets.grasses.len());
        let grass_asset = self.assets.grasses[index].clone();

        let env = match &hdri.info {
            Some(path) => EnvironmentInfo::load(path)?,
            None => EnvironmentInfo::synthetic(),
        };
        let to_draw = env.to_draw;
        let semi_synthetic = env.is_semi_synthetic();

        // A captured panorama fixes the camera at its recorded height; the
        // robot carrying the camera always stands directly beneath it.
        if semi_synthetic {
            config.camera.position = DVec3::new(0.0, 0.0, env.position.z);
        }
        if let Some(carrier) = config.robot.first_mut() {
            carrier.position = config.camera.position - DVec3::new(0.0, 0.0, CAMERA_MOUNT_HEIGHT);
        }

        self.place_objects(&mut config, &hdri, env, semi_synthetic)?;

        // Aim the camera at a tracking target instead of keeping the blind
        // sampled orientation. Only rendered objects are candidates.
        let goal_pick = self.pick(2);
        let targets = focus_candidates(&config, to_draw, goal_pick);
        let (focus, target) = targets[self.pick(targets.len())];
        config.camera.rotation =
            CameraRig::aim_at(config.camera.position, target, config.camera.rotation.roll);

        let rig = CameraRig {
            position: config.camera.position,
            rotation: config.camera.rotation,
            lens: Lens::from_parts(config.camera.kind, config.camera.focal_length, config.camera.fov),
            image: self.options.image,
            stereo: self
                .options
                .stereo
                .then_some(config.camera.stereo_camera_distance),
        };

        let states = object_states(&config, to_draw, &ball_asset, &grass_asset);
        self.host.apply(&states)?;
        self.host.bind_camera(&rig)?;

        let name = self.frame_name(frame);
        let raw_path = self.dirs.raw.join(format!("{name}.png"));
        self.host.render(
            RenderPass::Raw {
                hdri: &hdri.raw,
                strength: config.environment.strength,
            },
            &raw_path,
        )?;
        let seg_path = self.dirs.seg.join(format!("{name}.png"));
        self.host
            .render(RenderPass::Mask { hdri: hdri.mask.as_deref() }, &seg_path)?;
        if let Some(depth_dir) = &self.dirs.depth {
            self.host
                .render(RenderPass::Depth, &depth_dir.join(format!("{name}.exr")))?;
        }

        let annotator = Annotator {
            min_box_px: self.options.min_box_px,
        };
        let entities = scene_entities(&config, to_draw);
        let (annotations, skipped_annotations) = annotator.annotate_scene(&rig, &entities);
        if skipped_annotations > 0 {
            warn!(
                frame,
                skipped = skipped_annotations,
                "objects yielded no usable bounding box"
            );
        }
        let label_path = self.dirs.labels.join(format!("{name}.txt"));
        let mut lines = annotations
            .iter()
            .map(Annotation::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        if !lines.is_empty() {
            lines.push('\n');
        }
        fs::write(&label_path, lines).map_err(|source| FrameError::Write {
            path: label_path.clone(),
            source,
        })?;

        let meta_path = self.dirs.meta.join(format!("{name}.json"));
        self.write_metadata(&meta_path, &config, to_draw, &hdri, focus, &rig)?;

        info!(
            frame = %name,
            environment = %asset_label(&hdri.raw),
            ball = %asset_label(&ball_asset.colour),
            target = focus,
            semi_synthetic,
            annotations = annotations.len(),
            "frame generated"
        );

        Ok(FrameRecord {
            frame,
            config,
            semi_synthetic,
            annotations,
            skipped_annotations,
            raw_path,
            seg_path,
            meta_path,
            label_path,
        })
    }

    fn frame_name(&self, frame: u64) -> String {
        format!("{frame:0width$}", width = self.options.filename_len)
    }

    /// Uniform index into an asset list, drawn from the run's random stream.
    fn pick(&mut self, len: usize) -> usize {
        self.sampler.rng().random_range(0..len)
    }

    /// Resolve final object positions from two point pools. A captured
    /// panorama contributes turf points read off its mask: the ball takes
    /// the first one, and player robots only auto-place while some exist.
    /// Separated field points cover the robots themselves: opted-in player
    /// robots take the head of that pool, misc robots always take the tail.
    fn place_objects(
        &mut self,
        config: &mut SceneConfig,
        hdri: &HdriAsset,
        env: EnvironmentInfo,
        semi_synthetic: bool,
    ) -> Result<(), FrameError> {
        let turf_points = match (&hdri.mask, semi_synthetic) {
            (Some(mask_path), true) => {
                let mask = FieldMask::load(mask_path)?;
                let requested = config.robot.len() + 1;
                let points = point_on_field(
                    config.camera.position,
                    &mask,
                    env.rotation,
                    requested,
                    ROBOT_RADIUS,
                    self.sampler.rng(),
                );
                if points.len() < requested {
                    debug!(
                        found = points.len(),
                        requested, "panorama mask yielded fewer turf points"
                    );
                }
                points
            }
            _ => Vec::new(),
        };

        let extra_robots = config.robot.len().saturating_sub(1);
        let moves = generate_moves(
            glam::DVec2::new(config.field.length, config.field.width),
            extra_robots + config.misc_robot.len(),
            0.0,
            ROBOT_RADIUS,
            self.sampler.rng(),
        )?;

        if config.ball.auto_position && semi_synthetic {
            if let Some(p) = turf_points.first() {
                config.ball.position.x = p.x;
                config.ball.position.y = p.y;
            }
        }
        for (i, robot) in config.robot.iter_mut().enumerate().skip(1) {
            if robot.auto_position && semi_synthetic && !turf_points.is_empty() {
                robot.position.x = moves[i - 1].x;
                robot.position.y = moves[i - 1].y;
            }
        }
        for (i, misc) in config.misc_robot.iter_mut().enumerate() {
            misc.position.x = moves[extra_robots + i].x;
            misc.position.y = moves[extra_robots + i].y;
        }
        Ok(())
    }

    fn write_metadata(
        &self,
        path: &Path,
        config: &SceneConfig,
        to_draw: ToDraw,
        hdri: &HdriAsset,
        focus: &str,
        rig: &CameraRig,
    ) -> Result<(), FrameError> {
        let mut meta = serde_json::to_value(config)?;
        meta["rendered"] = serde_json::to_value(to_draw)?;
        let env_file = hdri
            .raw
            .strip_prefix(&self.resource_root)
            .unwrap_or(&hdri.raw);
        meta["environment"]["file"] = Value::String(env_file.to_string_lossy().into_owned());
        meta["camera"]["focus"] = Value::String(focus.to_string());
        meta["camera"]["lens"] = json!({
            "sensor_width": rig.lens.sensor.width_mm,
            "sensor_height": rig.lens.sensor.height_mm,
        });
        match rig.stereo_matrices() {
            Some((left, right)) => {
                let template = meta["camera"].clone();
                let mut l = template.clone();
                l["matrix"] = matrix_rows(left);
                let mut r = template;
                r["matrix"] = matrix_rows(right);
                meta["camera"] = json!({ "left": l, "right": r });
            }
            None => {
                meta["camera"]["matrix"] = matrix_rows(rig.camera_to_world());
            }
        }
        let text = serde_json::to_string_pretty(&meta)?;
        fs::write(path, text).map_err(|source| FrameError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Full object state pushed to the host each frame. Names are stable across
/// frames so hosts can update rather than rebuild.
fn object_states(
    config: &SceneConfig,
    to_draw: ToDraw,
    ball_asset: &BallAsset,
    grass_asset: &GrassAsset,
) -> Vec<ObjectState> {
    let mut states = Vec::new();
    let field = &config.field;
    states.push(
        ObjectState::new("field", DVec3::ZERO, Euler::ZERO)
            .with_dimensions(DVec3::new(
                field.length + 2.0 * field.border_width,
                field.width + 2.0 * field.border_width,
                field.grass_height,
            ))
            .with_asset(AssetRef::Grass(grass_asset.clone()))
            .visible(to_draw.field),
    );
    states.push(
        ObjectState::new("ball", config.ball.position, config.ball.rotation)
            .with_dimensions(DVec3::splat(2.0 * config.ball.radius))
            .with_asset(AssetRef::Ball(ball_asset.clone()))
            .visible(to_draw.ball),
    );
    let goal_z = config.goal.origin_z();
    let half_length = field.length * 0.5;
    states.push(
        ObjectState::new("goal_0", DVec3::new(half_length, 0.0, goal_z), Euler::ZERO)
            .visible(to_draw.goal),
    );
    // The far goal faces back towards the centre.
    states.push(
        ObjectState::new(
            "goal_1",
            DVec3::new(-half_length, 0.0, goal_z),
            Euler::new(0.0, 0.0, PI),
        )
        .visible(to_draw.goal),
    );
    for (i, robot) in config.robot.iter().enumerate() {
        states.push(
            ObjectState::new(format!("r{i}"), robot.position, robot.rotation)
                .with_joints(robot.joints.clone()),
        );
    }
    for (i, misc) in config.misc_robot.iter().enumerate() {
        states.push(ObjectState::new(format!("m{i}"), misc.position, misc.rotation));
    }
    for (i, shape) in config.shape.iter().enumerate() {
        states.push(
            ObjectState::new(format!("s{i}"), shape.position, shape.rotation)
                .with_dimensions(shape.dimensions)
                .with_material(shape.material),
        );
    }
    states
}

/// Tracking-target candidates in a stable order: the ball, one of the two
/// goals, and the anchor point, each present only while its object is
/// rendered. An environment that renders none of them still yields the
/// anchor so the camera has something to aim at.
fn focus_candidates(
    config: &SceneConfig,
    to_draw: ToDraw,
    goal_pick: usize,
) -> Vec<(&'static str, DVec3)> {
    let mut targets: Vec<(&'static str, DVec3)> = Vec::new();
    if to_draw.ball {
        targets.push(("ball", config.ball.position));
    }
    if to_draw.goal {
        let goal_z = config.goal.origin_z();
        let half_length = config.field.length * 0.5;
        if goal_pick == 0 {
            targets.push(("goal_0", DVec3::new(half_length, 0.0, goal_z)));
        } else {
            targets.push(("goal_1", DVec3::new(-half_length, 0.0, goal_z)));
        }
    }
    if to_draw.field {
        targets.push(("anchor", config.anchor.position));
    }
    if targets.is_empty() {
        targets.push(("anchor", config.anchor.position));
    }
    targets
}

fn asset_label(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn matrix_rows(m: DMat4) -> Value {
    Value::Array(
        (0..4)
            .map(|r| {
                let row = m.row(r);
                Value::Array(vec![json!(row.x), json!(row.y), json!(row.z), json!(row.w)])
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_dirs_layout() {
        let root = TempDir::new().unwrap();
        let dirs = OutputDirs::create(root.path(), false).unwrap();
        assert!(dirs.raw.is_dir());
        assert!(dirs.seg.is_dir());
        assert!(dirs.meta.is_dir());
        assert!(dirs.labels.is_dir());
        assert!(dirs.depth.is_none());

        let dirs = OutputDirs::create(root.path(), true).unwrap();
        assert!(dirs.depth.unwrap().is_dir());
    }

    #[test]
    fn test_object_states_cover_the_scene() {
        let mut config = SceneConfig::default();
        config.robot = vec![Default::default(), Default::default()];
        config.misc_robot = vec![Default::default()];
        config.shape = vec![Default::default(); 3];
        let ball = crate::assets::BallAsset {
            colour: PathBuf::from("balls/b/colour.png"),
            normal: None,
            mesh: None,
        };
        let grass = crate::assets::GrassAsset {
            diffuse: PathBuf::from("grass/g/grass_diffuse.png"),
            normal: None,
            bump: None,
        };
        let states = object_states(&config, ToDraw::default(), &ball, &grass);
        // field + ball + 2 goals + 2 robots + 1 misc + 3 shapes
        assert_eq!(states.len(), 1 + 1 + 2 + 2 + 1 + 3);
        let names: Vec<_> = states.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"goal_1"));
        assert!(names.contains(&"r0"));
        assert!(names.contains(&"s2"));
        // Undrawn objects are hidden, not omitted.
        let no_goal = ToDraw {
            goal: false,
            ..ToDraw::default()
        };
        let states = object_states(&config, no_goal, &ball, &grass);
        let goal = states.iter().find(|s| s.name == "goal_0").unwrap();
        assert!(!goal.visible);
    }

    #[test]
    fn test_focus_candidates_follow_draw_flags() {
        let config = SceneConfig::default();
        let all = ToDraw::default();
        let names: Vec<_> = focus_candidates(&config, all, 0).iter().map(|t| t.0).collect();
        assert_eq!(names, ["ball", "goal_0", "anchor"]);
        let names: Vec<_> = focus_candidates(&config, all, 1).iter().map(|t| t.0).collect();
        assert_eq!(names, ["ball", "goal_1", "anchor"]);

        // A hidden field takes the anchor out of the draw.
        let no_field = ToDraw {
            field: false,
            ..ToDraw::default()
        };
        let names: Vec<_> = focus_candidates(&config, no_field, 0)
            .iter()
            .map(|t| t.0)
            .collect();
        assert_eq!(names, ["ball", "goal_0"]);

        // Nothing rendered still leaves a point to aim at.
        let none = ToDraw {
            ball: false,
            goal: false,
            field: false,
        };
        let candidates = focus_candidates(&config, none, 0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].0, "anchor");
        assert_eq!(candidates[0].1, config.anchor.position);
    }

    #[test]
    fn test_matrix_rows_are_row_major() {
        let m = DMat4::from_cols(
            glam::DVec4::new(1.0, 2.0, 3.0, 0.0),
            glam::DVec4::new(4.0, 5.0, 6.0, 0.0),
            glam::DVec4::new(7.0, 8.0, 9.0, 0.0),
            glam::DVec4::new(10.0, 11.0, 12.0, 1.0),
        );
        let rows = matrix_rows(m);
        // First row picks the first component of each column.
        assert_eq!(rows[0], json!([1.0, 4.0, 7.0, 10.0]));
        assert_eq!(rows[3], json!([0.0, 0.0, 0.0, 1.0]));
    }
}
