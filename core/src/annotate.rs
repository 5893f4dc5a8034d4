//! Detection label generation
//!
//! Annotations are normalised boxes in the training-set convention: one line
//! per object, `class x_centre y_centre width height`, all but the class in
//! [0, 1] of the image size. Objects project through the frame's own camera
//! model; whatever cannot produce a usable box (behind the camera, outside
//! the frame, degenerate after clamping) is skipped rather than reported.

use glam::{DVec2, DVec3};
use std::fmt;

use crate::assets::ToDraw;
use crate::camera::{CameraRig, ImageSize};
use crate::config::{FieldConfig, SceneConfig};

/// Class ids in the label files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Ball,
    GoalPost,
    Robot,
    LIntersection,
    TIntersection,
    XIntersection,
}

impl ObjectClass {
    pub const fn id(self) -> u32 {
        match self {
            ObjectClass::Ball => 0,
            ObjectClass::GoalPost => 1,
            ObjectClass::Robot => 2,
            ObjectClass::LIntersection => 3,
            ObjectClass::TIntersection => 4,
            ObjectClass::XIntersection => 5,
        }
    }
}

/// Axis-aligned box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn from_centre_dims(centre: DVec3, dims: DVec3) -> Self {
        let half = dims * 0.5;
        Self {
            min: centre - half,
            max: centre + half,
        }
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            DVec3::new(lo.x, lo.y, lo.z),
            DVec3::new(hi.x, lo.y, lo.z),
            DVec3::new(lo.x, hi.y, lo.z),
            DVec3::new(hi.x, hi.y, lo.z),
            DVec3::new(lo.x, lo.y, hi.z),
            DVec3::new(hi.x, lo.y, hi.z),
            DVec3::new(lo.x, hi.y, hi.z),
            DVec3::new(hi.x, hi.y, hi.z),
        ]
    }
}

/// Projection strategy for an annotated object.
#[derive(Clone, Debug)]
pub enum EntityKind {
    /// Project the centre, size the box from the apparent diameter.
    Sphere { radius: f64 },
    /// Union of the projected corners of several world-space part boxes.
    MultiPartRigidBody { parts: Vec<Aabb> },
    /// Upright box such as a goal post: apparent width from the diameter,
    /// height from the projected base and top.
    Box { diameter: f64, height: f64 },
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub class: ObjectClass,
    /// World anchor: sphere centre, body origin, or box base on the ground.
    pub position: DVec3,
    pub kind: EntityKind,
}

/// One bounding box in normalised image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Annotation {
    pub class: u32,
    pub x_centre: f64,
    pub y_centre: f64,
    pub width: f64,
    pub height: f64,
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class, self.x_centre, self.y_centre, self.width, self.height
        )
    }
}

/// Landmark spheres are sized as a multiple of the field line width.
pub const LANDMARK_RADIUS_FACTOR: f64 = 2.0;

/// Footprint half-width of the simplified misc-robot body, metres.
const MISC_ROBOT_HALF_WIDTH: f64 = 0.125;

/// Body part boxes of a player robot as `(offset, dims)` relative to the
/// torso origin, metres. Coarse on purpose: labels need the silhouette
/// extent, not the mesh.
const ROBOT_PARTS: &[([f64; 3], [f64; 3])] = &[
    // torso
    ([0.0, 0.0, 0.10], [0.12, 0.18, 0.28]),
    // head
    ([0.0, 0.0, 0.35], [0.12, 0.14, 0.16]),
    // arms
    ([0.0, 0.14, 0.05], [0.06, 0.06, 0.38]),
    ([0.0, -0.14, 0.05], [0.06, 0.06, 0.38]),
    // legs
    ([0.0, 0.07, -0.30], [0.09, 0.09, 0.45]),
    ([0.0, -0.07, -0.30], [0.09, 0.09, 0.45]),
];

/// World-space part boxes of a player robot at `position` facing `yaw`.
/// Parts rotate about the torso origin; each returned box is the axis-
/// aligned hull of its rotated part.
pub fn robot_body_parts(position: DVec3, yaw: f64) -> Vec<Aabb> {
    let (sin, cos) = yaw.sin_cos();
    ROBOT_PARTS
        .iter()
        .map(|&(offset, dims)| {
            let local = DVec3::from_array(offset);
            let centre = position
                + DVec3::new(
                    cos * local.x - sin * local.y,
                    sin * local.x + cos * local.y,
                    local.z,
                );
            let half = DVec3::from_array(dims) * 0.5;
            let half_world = DVec3::new(
                cos.abs() * half.x + sin.abs() * half.y,
                sin.abs() * half.x + cos.abs() * half.y,
                half.z,
            );
            Aabb {
                min: centre - half_world,
                max: centre + half_world,
            }
        })
        .collect()
}

/// Single-box body of a misc robot. The configured z doubles as half the
/// body height, so the box always rests on the ground.
pub fn misc_robot_part(position: DVec3) -> Aabb {
    Aabb {
        min: DVec3::new(
            position.x - MISC_ROBOT_HALF_WIDTH,
            position.y - MISC_ROBOT_HALF_WIDTH,
            0.0,
        ),
        max: DVec3::new(
            position.x + MISC_ROBOT_HALF_WIDTH,
            position.y + MISC_ROBOT_HALF_WIDTH,
            2.0 * position.z,
        ),
    }
}

/// Ground-truth field line intersections of a field: 8 L corners, 6 T
/// junctions and 4 X crossings, derived from the same dimensions the field
/// mesh is built from.
pub fn field_landmarks(field: &FieldConfig) -> Vec<Entity> {
    let half_l = field.length * 0.5;
    let half_w = field.width * 0.5;
    let inner_x = half_l - field.goal_area.length;
    let area_y = field.goal_area.width * 0.5;
    let radius = field.field_line_width * LANDMARK_RADIUS_FACTOR;
    let mut landmarks = Vec::with_capacity(18);
    let mut push = |class, x: f64, y: f64| {
        landmarks.push(Entity {
            class,
            position: DVec3::new(x, y, 0.0),
            kind: EntityKind::Sphere { radius },
        });
    };
    // L: field corners and the inner corners of both goal areas.
    for sx in [1.0, -1.0] {
        for sy in [1.0, -1.0] {
            push(ObjectClass::LIntersection, sx * half_l, sy * half_w);
            push(ObjectClass::LIntersection, sx * inner_x, sy * area_y);
        }
    }
    // T: halfway line meeting the sidelines; goal-area lines meeting the
    // goal lines.
    for sy in [1.0, -1.0] {
        push(ObjectClass::TIntersection, 0.0, sy * half_w);
    }
    for sx in [1.0, -1.0] {
        for sy in [1.0, -1.0] {
            push(ObjectClass::TIntersection, sx * half_l, sy * area_y);
        }
    }
    // X: centre circle crossing the halfway line; penalty marks.
    for sy in [1.0, -1.0] {
        push(ObjectClass::XIntersection, 0.0, sy * field.centre_circle_radius);
    }
    for sx in [1.0, -1.0] {
        push(
            ObjectClass::XIntersection,
            sx * (half_l - field.penalty_mark_dist),
            0.0,
        );
    }
    landmarks
}

/// Everything a frame annotates, honouring the environment's draw flags.
///
/// The first robot carries the camera; its own body is not annotated. Goal
/// posts are annotated individually, the crossbar and net are not.
pub fn scene_entities(config: &SceneConfig, to_draw: ToDraw) -> Vec<Entity> {
    let mut entities = Vec::new();
    if to_draw.ball {
        entities.push(Entity {
            class: ObjectClass::Ball,
            position: config.ball.position,
            kind: EntityKind::Sphere {
                radius: config.ball.radius,
            },
        });
    }
    if to_draw.goal {
        let goal_x = config.field.length * 0.5;
        let post_y = config.goal.width * 0.5;
        for sx in [1.0, -1.0] {
            for sy in [1.0, -1.0] {
                entities.push(Entity {
                    class: ObjectClass::GoalPost,
                    position: DVec3::new(sx * goal_x, sy * post_y, 0.0),
                    kind: EntityKind::Box {
                        diameter: config.goal.post_width,
                        height: config.goal.height,
                    },
                });
            }
        }
    }
    for robot in config.robot.iter().skip(1) {
        entities.push(Entity {
            class: ObjectClass::Robot,
            position: robot.position,
            kind: EntityKind::MultiPartRigidBody {
                parts: robot_body_parts(robot.position, robot.rotation.yaw),
            },
        });
    }
    for misc in &config.misc_robot {
        entities.push(Entity {
            class: ObjectClass::Robot,
            position: misc.position,
            kind: EntityKind::MultiPartRigidBody {
                parts: vec![misc_robot_part(misc.position)],
            },
        });
    }
    if to_draw.field {
        entities.extend(field_landmarks(&config.field));
    }
    entities
}

/// Projects entities into label boxes.
#[derive(Clone, Copy, Debug)]
pub struct Annotator {
    /// Boxes narrower or shorter than this many pixels are dropped.
    pub min_box_px: f64,
}

impl Default for Annotator {
    fn default() -> Self {
        Self { min_box_px: 2.0 }
    }
}

impl Annotator {
    pub fn annotate(&self, rig: &CameraRig, entity: &Entity) -> Option<Annotation> {
        match &entity.kind {
            EntityKind::Sphere { radius } => {
                self.sphere(rig, entity.class, entity.position, *radius)
            }
            EntityKind::MultiPartRigidBody { parts } => {
                self.rigid_body(rig, entity.class, parts)
            }
            EntityKind::Box { diameter, height } => {
                self.upright_box(rig, entity.class, entity.position, *diameter, *height)
            }
        }
    }

    /// Annotate a whole entity list, counting the entities that produced no
    /// box so the caller can log them.
    pub fn annotate_scene(
        &self,
        rig: &CameraRig,
        entities: &[Entity],
    ) -> (Vec<Annotation>, usize) {
        let mut annotations = Vec::new();
        let mut skipped = 0;
        for entity in entities {
            match self.annotate(rig, entity) {
                Some(annotation) => annotations.push(annotation),
                None => skipped += 1,
            }
        }
        (annotations, skipped)
    }

    fn sphere(
        &self,
        rig: &CameraRig,
        class: ObjectClass,
        centre: DVec3,
        radius: f64,
    ) -> Option<Annotation> {
        let cam = rig.world_to_camera(centre);
        if cam.x <= 0.0 {
            return None;
        }
        let pixel = rig.lens.project_unbounded(cam, rig.image)?;
        let diameter = rig.lens.apparent_diameter_px(radius, cam.length(), rig.image);
        let half = DVec2::splat(diameter * 0.5);
        self.finish(rig.image, class, pixel - half, pixel + half)
    }

    fn rigid_body(
        &self,
        rig: &CameraRig,
        class: ObjectClass,
        parts: &[Aabb],
    ) -> Option<Annotation> {
        let mut min = DVec2::splat(f64::INFINITY);
        let mut max = DVec2::splat(f64::NEG_INFINITY);
        let mut seen = false;
        for part in parts {
            for corner in part.corners() {
                let cam = rig.world_to_camera(corner);
                if cam.x <= 0.0 {
                    continue;
                }
                if let Some(pixel) = rig.lens.project_unbounded(cam, rig.image) {
                    min = min.min(pixel);
                    max = max.max(pixel);
                    seen = true;
                }
            }
        }
        if !seen {
            return None;
        }
        self.finish(rig.image, class, min, max)
    }

    fn upright_box(
        &self,
        rig: &CameraRig,
        class: ObjectClass,
        base: DVec3,
        diameter: f64,
        height: f64,
    ) -> Option<Annotation> {
        let centre = base + DVec3::new(0.0, 0.0, height * 0.5);
        let cam = rig.world_to_camera(centre);
        if cam.x <= 0.0 {
            return None;
        }
        let pixel = rig.lens.project_unbounded(cam, rig.image)?;
        let width = rig
            .lens
            .apparent_diameter_px(diameter * 0.5, cam.length(), rig.image);
        let top = rig.world_to_camera(base + DVec3::new(0.0, 0.0, height));
        let bottom = rig.world_to_camera(base);
        // Projected extent when both ends are in front of the camera, else
        // fall back to scaling the width by the box aspect.
        let height_px = if top.x > 0.0 && bottom.x > 0.0 {
            match (
                rig.lens.project_unbounded(top, rig.image),
                rig.lens.project_unbounded(bottom, rig.image),
            ) {
                (Some(pt), Some(pb)) => (pb.y - pt.y).abs(),
                _ => width * (height / diameter),
            }
        } else {
            width * (height / diameter)
        };
        let half = DVec2::new(width * 0.5, height_px * 0.5);
        self.finish(rig.image, class, pixel - half, pixel + half)
    }

    /// Turn a raw pixel box into a label: clamp to the frame, reject empty
    /// clamps, reject boxes whose unclamped centre already left the frame,
    /// reject slivers below the pixel floor.
    fn finish(
        &self,
        image: ImageSize,
        class: ObjectClass,
        min: DVec2,
        max: DVec2,
    ) -> Option<Annotation> {
        let w = image.width as f64;
        let h = image.height as f64;
        let x0 = min.x.clamp(0.0, w);
        let x1 = max.x.clamp(0.0, w);
        let y0 = min.y.clamp(0.0, h);
        let y1 = max.y.clamp(0.0, h);
        if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
            return None;
        }
        let centre = (min + max) * 0.5;
        if !(0.0..=1.0).contains(&(centre.x / w)) || !(0.0..=1.0).contains(&(centre.y / h)) {
            return None;
        }
        let width = x1 - x0;
        let height = y1 - y0;
        if width < self.min_box_px || height < self.min_box_px {
            return None;
        }
        Some(Annotation {
            class: class.id(),
            x_centre: (x0 + x1) * 0.5 / w,
            y_centre: (y0 + y1) * 0.5 / h,
            width: width / w,
            height: height / h,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Lens;
    use crate::config::RobotConfig;
    use crate::geometry::Euler;
    use std::f64::consts::{FRAC_PI_2, PI};

    const IMG: ImageSize = ImageSize::new(1280, 1024);

    fn downward_rig() -> CameraRig {
        CameraRig {
            position: DVec3::new(0.0, 0.0, 0.9),
            rotation: Euler::new(0.0, -FRAC_PI_2, 0.0),
            lens: Lens::equisolid(10.5, PI),
            image: IMG,
            stereo: None,
        }
    }

    fn forward_rig() -> CameraRig {
        CameraRig {
            position: DVec3::new(0.0, 0.0, 0.9),
            rotation: Euler::ZERO,
            lens: Lens::rectilinear(FRAC_PI_2),
            image: IMG,
            stereo: None,
        }
    }

    #[test]
    fn test_ball_straight_below_camera() {
        let annotator = Annotator::default();
        let entity = Entity {
            class: ObjectClass::Ball,
            position: DVec3::new(0.0, 0.0, 0.045),
            kind: EntityKind::Sphere { radius: 0.045 },
        };
        let a = annotator.annotate(&downward_rig(), &entity).unwrap();
        assert_eq!(a.class, 0);
        assert!((a.x_centre - 0.5).abs() < 1e-9);
        assert!((a.y_centre - 0.5).abs() < 1e-9);
        // 2 * 0.045 / 0.855 * 10.5 mm * (1280 px / 36 mm)
        assert!((a.width * 1280.0 - 39.2982456140).abs() < 1e-6);
        assert!((a.height * 1024.0 - 39.2982456140).abs() < 1e-6);
    }

    #[test]
    fn test_entity_behind_camera_is_skipped() {
        let annotator = Annotator::default();
        let entity = Entity {
            class: ObjectClass::Ball,
            position: DVec3::new(-2.0, 0.0, 0.045),
            kind: EntityKind::Sphere { radius: 0.045 },
        };
        assert!(annotator.annotate(&forward_rig(), &entity).is_none());
    }

    #[test]
    fn test_box_below_pixel_floor_is_skipped() {
        let annotator = Annotator::default();
        // A 1 mm marble several metres out projects under two pixels.
        let entity = Entity {
            class: ObjectClass::Ball,
            position: DVec3::new(4.0, 0.0, 0.9),
            kind: EntityKind::Sphere { radius: 0.001 },
        };
        assert!(annotator.annotate(&forward_rig(), &entity).is_none());
    }

    #[test]
    fn test_boxes_stay_inside_the_frame() {
        let annotator = Annotator::default();
        let rig = downward_rig();
        for x in [-2.0, -0.5, 0.0, 0.7, 1.9] {
            for y in [-1.5, 0.0, 0.4, 1.2] {
                let entity = Entity {
                    class: ObjectClass::Ball,
                    position: DVec3::new(x, y, 0.045),
                    kind: EntityKind::Sphere { radius: 0.045 },
                };
                if let Some(a) = annotator.annotate(&rig, &entity) {
                    assert!(a.x_centre - a.width * 0.5 >= -1e-9);
                    assert!(a.x_centre + a.width * 0.5 <= 1.0 + 1e-9);
                    assert!(a.y_centre - a.height * 0.5 >= -1e-9);
                    assert!(a.y_centre + a.height * 0.5 <= 1.0 + 1e-9);
                    assert!(a.width * 1280.0 >= annotator.min_box_px);
                    assert!(a.height * 1024.0 >= annotator.min_box_px);
                }
            }
        }
    }

    #[test]
    fn test_goal_post_box_dimensions() {
        let annotator = Annotator::default();
        let entity = Entity {
            class: ObjectClass::GoalPost,
            position: DVec3::new(3.0, 0.0, 0.0),
            kind: EntityKind::Box {
                diameter: 0.12,
                height: 1.8,
            },
        };
        let a = annotator.annotate(&forward_rig(), &entity).unwrap();
        assert_eq!(a.class, 1);
        assert!((a.x_centre - 0.5).abs() < 1e-9);
        assert!((a.y_centre - 0.5).abs() < 1e-9);
        // Width from the pinhole model: 0.12 / 3 m * 18 mm * (1280 / 36).
        assert!((a.width * 1280.0 - 25.6).abs() < 1e-6, "{}", a.width * 1280.0);
        // Height from the projected base and top: 2 * 640 * (0.9 / 3).
        assert!((a.height * 1024.0 - 384.0).abs() < 1e-6);
    }

    #[test]
    fn test_rigid_body_ignores_parts_behind_camera() {
        let annotator = Annotator::default();
        let rig = forward_rig();
        let front = Aabb::from_centre_dims(DVec3::new(2.0, 0.0, 0.5), DVec3::splat(0.4));
        let behind = Aabb::from_centre_dims(DVec3::new(-2.0, 0.0, 0.5), DVec3::splat(0.4));
        let both = annotator
            .rigid_body(&rig, ObjectClass::Robot, &[front, behind])
            .unwrap();
        let front_only = annotator
            .rigid_body(&rig, ObjectClass::Robot, &[front])
            .unwrap();
        assert_eq!(both, front_only);
        assert!(
            annotator
                .rigid_body(&rig, ObjectClass::Robot, &[behind])
                .is_none()
        );
    }

    #[test]
    fn test_robot_parts_rotate_with_yaw() {
        let position = DVec3::new(1.0, 2.0, 0.5);
        let parts = robot_body_parts(position, FRAC_PI_2);
        assert_eq!(parts.len(), ROBOT_PARTS.len());
        // Yaw 90 degrees: the left arm offset (0, 0.14) moves to (-0.14, 0).
        let arm = &parts[2];
        let centre = (arm.min + arm.max) * 0.5;
        assert!((centre.x - (1.0 - 0.14)).abs() < 1e-9);
        assert!((centre.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_misc_robot_box_spans_ground_to_double_height() {
        let part = misc_robot_part(DVec3::new(0.5, -0.5, 0.25));
        assert_eq!(part.min.z, 0.0);
        assert!((part.max.z - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_landmark_counts_and_positions() {
        let field = FieldConfig::default();
        let landmarks = field_landmarks(&field);
        assert_eq!(landmarks.len(), 18);
        let count = |class: ObjectClass| {
            landmarks.iter().filter(|e| e.class == class).count()
        };
        assert_eq!(count(ObjectClass::LIntersection), 8);
        assert_eq!(count(ObjectClass::TIntersection), 6);
        assert_eq!(count(ObjectClass::XIntersection), 4);
        // Penalty marks sit penalty_mark_dist in from the goal lines.
        assert!(landmarks.iter().any(|e| {
            e.class == ObjectClass::XIntersection
                && (e.position - DVec3::new(4.5 - 2.1, 0.0, 0.0)).length() < 1e-9
        }));
        // Field corner.
        assert!(landmarks.iter().any(|e| {
            e.class == ObjectClass::LIntersection
                && (e.position - DVec3::new(4.5, 3.0, 0.0)).length() < 1e-9
        }));
    }

    #[test]
    fn test_scene_entities_respect_draw_flags() {
        let mut config = SceneConfig::default();
        config.robot = vec![RobotConfig::default(), RobotConfig::default()];
        config.misc_robot = vec![RobotConfig {
            position: DVec3::new(1.0, 1.0, 0.25),
            ..RobotConfig::default()
        }];
        let all = ToDraw::default();
        let entities = scene_entities(&config, all);
        // Ball, 4 posts, 1 robot (camera robot skipped), 1 misc, 18 landmarks.
        assert_eq!(entities.len(), 1 + 4 + 1 + 1 + 18);

        let no_field = ToDraw {
            field: false,
            ..ToDraw::default()
        };
        assert_eq!(scene_entities(&config, no_field).len(), 1 + 4 + 1 + 1);

        let no_goal_no_ball = ToDraw {
            ball: false,
            goal: false,
            ..ToDraw::default()
        };
        assert_eq!(scene_entities(&config, no_goal_no_ball).len(), 1 + 1 + 18);
    }

    #[test]
    fn test_annotation_line_format() {
        let a = Annotation {
            class: 2,
            x_centre: 0.5,
            y_centre: 0.25,
            width: 0.125,
            height: 0.0625,
        };
        assert_eq!(a.to_string(), "2 0.500000 0.250000 0.125000 0.062500");
    }

    #[test]
    fn test_annotate_scene_counts_skips() {
        let annotator = Annotator::default();
        let rig = forward_rig();
        let entities = vec![
            Entity {
                class: ObjectClass::Ball,
                position: DVec3::new(3.0, 0.0, 0.1),
                kind: EntityKind::Sphere { radius: 0.1 },
            },
            Entity {
                class: ObjectClass::Ball,
                position: DVec3::new(-3.0, 0.0, 0.1),
                kind: EntityKind::Sphere { radius: 0.1 },
            },
        ];
        let (annotations, skipped) = annotator.annotate_scene(&rig, &entities);
        assert_eq!(annotations.len(), 1);
        assert_eq!(skipped, 1);
    }
}
