//! Camera models and world-to-pixel projection
//!
//! Two lens models are supported: an equisolid fisheye (`r = 2f sin(theta/2)`,
//! the model Blender uses for its fisheye cameras) and a plain rectilinear
//! pinhole. Camera space is x forward, y left, z up; the pitch angle is an
//! elevation, so -pi/2 looks straight down.

use glam::{DMat3, DMat4, DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Euler, GROUND_EPS};

/// Focal length applied to fisheye cameras when a config leaves it unset (mm).
pub const DEFAULT_FISHEYE_FOCAL_MM: f64 = 10.5;

/// Render target size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn centre(&self) -> DVec2 {
        DVec2::new(self.width as f64 * 0.5, self.height as f64 * 0.5)
    }

    pub fn contains(&self, pixel: DVec2) -> bool {
        pixel.x >= 0.0
            && pixel.x < self.width as f64
            && pixel.y >= 0.0
            && pixel.y < self.height as f64
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::new(1280, 1024)
    }
}

/// Physical sensor dimensions in millimetres.
///
/// Pixel scaling assumes the image width spans the sensor width, which is how
/// Blender fits a horizontal sensor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl SensorSpec {
    /// Blender's default full-frame sensor.
    pub const FULL_FRAME: Self = Self {
        width_mm: 36.0,
        height_mm: 24.0,
    };
}

impl Default for SensorSpec {
    fn default() -> Self {
        Self::FULL_FRAME
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LensKind {
    Equisolid,
    Rectilinear,
}

/// A concrete optical model: lens kind plus the parameters projection needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lens {
    pub kind: LensKind,
    /// Focal length in millimetres. For rectilinear lenses this is derived
    /// from the field of view and only feeds the apparent-size estimate.
    pub focal_mm: f64,
    /// Field of view in radians. For the equisolid model this crops the
    /// image circle rather than rescaling it.
    pub fov: f64,
    pub sensor: SensorSpec,
}

impl Lens {
    pub fn equisolid(focal_mm: f64, fov: f64) -> Self {
        Self {
            kind: LensKind::Equisolid,
            focal_mm,
            fov,
            sensor: SensorSpec::FULL_FRAME,
        }
    }

    pub fn rectilinear(fov: f64) -> Self {
        let sensor = SensorSpec::FULL_FRAME;
        Self {
            kind: LensKind::Rectilinear,
            focal_mm: sensor.width_mm * 0.5 / (fov * 0.5).tan(),
            fov,
            sensor,
        }
    }

    /// Build a lens from config fields, falling back to the stock fisheye
    /// focal length when an equisolid config leaves it unset.
    pub fn from_parts(kind: LensKind, focal_length: Option<f64>, fov: f64) -> Self {
        match kind {
            LensKind::Equisolid => {
                Self::equisolid(focal_length.unwrap_or(DEFAULT_FISHEYE_FOCAL_MM), fov)
            }
            LensKind::Rectilinear => Self::rectilinear(fov),
        }
    }

    /// Millimetre-to-pixel scale along the image width.
    fn px_per_mm(&self, image: ImageSize) -> f64 {
        image.width as f64 / self.sensor.width_mm
    }

    /// Pixel focal length of the rectilinear model.
    fn focal_px(&self, image: ImageSize) -> f64 {
        image.width as f64 * 0.5 / (self.fov * 0.5).tan()
    }

    /// Project a camera-space point to pixel coordinates, ignoring the frame
    /// bounds and the field-of-view crop.
    ///
    /// Out-of-frame pixels are deliberately kept so that bounding boxes whose
    /// corners fall outside the image still contribute to union extents.
    /// Returns `None` only where the model itself is undefined: zero-length
    /// input, the equisolid antipode, or a rectilinear point at or behind
    /// the image plane.
    pub fn project_unbounded(&self, cam: DVec3, image: ImageSize) -> Option<DVec2> {
        match self.kind {
            LensKind::Equisolid => {
                let rho = cam.y.hypot(cam.z);
                if rho < GROUND_EPS {
                    if cam.x > GROUND_EPS {
                        // On the optical axis: image centre.
                        return Some(image.centre());
                    }
                    // Antipode or zero vector; no defined image direction.
                    return None;
                }
                let theta = rho.atan2(cam.x);
                let r_px = 2.0 * self.focal_mm * (theta * 0.5).sin() * self.px_per_mm(image);
                // Camera +y is image left and +z is image up.
                let u = -cam.y / rho;
                let v = -cam.z / rho;
                Some(image.centre() + DVec2::new(r_px * u, r_px * v))
            }
            LensKind::Rectilinear => {
                if cam.x <= GROUND_EPS {
                    return None;
                }
                let f = self.focal_px(image);
                let centre = image.centre();
                Some(DVec2::new(
                    centre.x + f * (-cam.y / cam.x),
                    centre.y - f * (cam.z / cam.x),
                ))
            }
        }
    }

    /// Project a camera-space point, returning `None` when it lands outside
    /// the frame or beyond the field-of-view crop.
    pub fn project(&self, cam: DVec3, image: ImageSize) -> Option<DVec2> {
        if let LensKind::Equisolid = self.kind {
            let theta = cam.y.hypot(cam.z).atan2(cam.x);
            if theta > self.fov * 0.5 {
                return None;
            }
        }
        let pixel = self.project_unbounded(cam, image)?;
        image.contains(pixel).then_some(pixel)
    }

    /// Apparent diameter in pixels of a sphere of the given radius at the
    /// given distance, under a thin-lens approximation. Applied uniformly to
    /// both lens models; the distortion error near the fisheye rim is
    /// accepted as annotation noise.
    pub fn apparent_diameter_px(&self, radius: f64, distance: f64, image: ImageSize) -> f64 {
        (2.0 * radius / distance) * self.focal_mm * self.px_per_mm(image)
    }
}

/// A posed camera: extrinsics plus lens and render size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraRig {
    /// World position of the (primary) camera in metres.
    pub position: DVec3,
    /// Roll, pitch (elevation, negative looks down) and yaw.
    pub rotation: Euler,
    pub lens: Lens,
    pub image: ImageSize,
    /// Baseline to a second camera along image-right, if rendering stereo.
    pub stereo: Option<f64>,
}

impl CameraRig {
    /// Camera-to-world rotation. Columns are the camera axes expressed in
    /// world coordinates: x forward, y left, z up.
    pub fn basis(&self) -> DMat3 {
        // Pitch is an elevation, hence the sign flip against the y rotation.
        DMat3::from_rotation_z(self.rotation.yaw)
            * DMat3::from_rotation_y(-self.rotation.pitch)
            * DMat3::from_rotation_x(self.rotation.roll)
    }

    pub fn world_to_camera(&self, point: DVec3) -> DVec3 {
        self.basis().transpose() * (point - self.position)
    }

    /// Project a world point to pixels, honouring frame bounds and fov crop.
    pub fn project(&self, point: DVec3) -> Option<DVec2> {
        self.lens.project(self.world_to_camera(point), self.image)
    }

    /// Project a world point to pixels with no frame or fov limits. Points
    /// with non-positive forward depth are rejected.
    pub fn project_unbounded(&self, point: DVec3) -> Option<DVec2> {
        let cam = self.world_to_camera(point);
        if cam.x <= 0.0 {
            return None;
        }
        self.lens.project_unbounded(cam, self.image)
    }

    /// Forward depth of a world point in camera space.
    pub fn depth(&self, point: DVec3) -> f64 {
        self.world_to_camera(point).x
    }

    fn pose_matrix(&self, position: DVec3) -> DMat4 {
        let b = self.basis();
        DMat4::from_cols(
            b.x_axis.extend(0.0),
            b.y_axis.extend(0.0),
            b.z_axis.extend(0.0),
            position.extend(1.0),
        )
    }

    /// Camera-to-world transform of the primary camera.
    pub fn camera_to_world(&self) -> DMat4 {
        self.pose_matrix(self.position)
    }

    /// Left and right camera-to-world transforms when a stereo baseline is
    /// set. The primary camera is the left eye; the right eye sits along
    /// image-right at the baseline distance.
    pub fn stereo_matrices(&self) -> Option<(DMat4, DMat4)> {
        let baseline = self.stereo?;
        let image_right = -self.basis().y_axis;
        Some((
            self.pose_matrix(self.position),
            self.pose_matrix(self.position + image_right * baseline),
        ))
    }

    /// Euler angles that point a camera at `position` towards `target`,
    /// keeping the given roll.
    pub fn aim_at(position: DVec3, target: DVec3, roll: f64) -> Euler {
        let d = target - position;
        Euler::new(roll, d.z.atan2(d.x.hypot(d.y)), d.y.atan2(d.x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const IMG: ImageSize = ImageSize::new(1280, 1024);

    #[test]
    fn test_equisolid_optical_axis_hits_centre() {
        let lens = Lens::equisolid(10.5, PI);
        let px = lens.project(DVec3::new(2.0, 0.0, 0.0), IMG).unwrap();
        assert!((px.x - 640.0).abs() < 1e-9);
        assert!((px.y - 512.0).abs() < 1e-9);
    }

    #[test]
    fn test_equisolid_radial_distance() {
        let lens = Lens::equisolid(10.5, PI);
        // 90 degrees off axis towards image right (camera -y).
        let px = lens.project(DVec3::new(0.0, -1.0, 0.0), IMG).unwrap();
        let expected_r = 2.0 * 10.5 * (FRAC_PI_2 * 0.5).sin() * (1280.0 / 36.0);
        assert!((px.x - (640.0 + expected_r)).abs() < 1e-9);
        assert!((px.y - 512.0).abs() < 1e-9);
    }

    #[test]
    fn test_equisolid_image_orientation() {
        let lens = Lens::equisolid(10.5, PI);
        // Camera +z (up) must land above the centre, i.e. smaller pixel y.
        let up = lens.project(DVec3::new(1.0, 0.0, 0.5), IMG).unwrap();
        assert!(up.y < 512.0);
        // Camera +y (left) must land left of centre.
        let left = lens.project(DVec3::new(1.0, 0.5, 0.0), IMG).unwrap();
        assert!(left.x < 640.0);
    }

    #[test]
    fn test_equisolid_fov_crop() {
        let lens = Lens::equisolid(10.5, FRAC_PI_2);
        // 60 degrees off axis: outside a 90 degree fov, but still projectable.
        let cam = DVec3::new(0.5, -(60f64.to_radians().tan()) * 0.5, 0.0);
        assert!(lens.project(cam, IMG).is_none());
        assert!(lens.project_unbounded(cam, IMG).is_some());
    }

    #[test]
    fn test_equisolid_antipode_is_undefined() {
        let lens = Lens::equisolid(10.5, PI);
        assert!(lens.project_unbounded(DVec3::new(-1.0, 0.0, 0.0), IMG).is_none());
        assert!(lens.project_unbounded(DVec3::ZERO, IMG).is_none());
    }

    #[test]
    fn test_rectilinear_projection() {
        let lens = Lens::rectilinear(FRAC_PI_2);
        // f_px = (1280/2) / tan(45 deg) = 640.
        let px = lens.project(DVec3::new(1.0, -0.5, 0.25), IMG).unwrap();
        assert!((px.x - 960.0).abs() < 1e-9);
        assert!((px.y - 352.0).abs() < 1e-9);
    }

    #[test]
    fn test_rectilinear_rejects_behind_camera() {
        let lens = Lens::rectilinear(FRAC_PI_2);
        assert!(lens.project_unbounded(DVec3::new(-1.0, 0.1, 0.0), IMG).is_none());
        assert!(lens.project_unbounded(DVec3::new(0.0, 0.1, 0.0), IMG).is_none());
    }

    #[test]
    fn test_apparent_diameter_matches_pinhole() {
        let lens = Lens::equisolid(10.5, PI);
        // Ball of radius 45 mm seen from 0.855 m.
        let d = lens.apparent_diameter_px(0.045, 0.855, IMG);
        assert!((d - 39.2982456140).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_rig_straight_down() {
        let rig = CameraRig {
            position: DVec3::new(0.0, 0.0, 0.9),
            rotation: Euler::new(0.0, -FRAC_PI_2, 0.0),
            lens: Lens::equisolid(10.5, PI),
            image: IMG,
            stereo: None,
        };
        let cam = rig.world_to_camera(DVec3::new(0.0, 0.0, 0.045));
        assert!((cam - DVec3::new(0.855, 0.0, 0.0)).length() < 1e-9);
        let px = rig.project(DVec3::new(0.0, 0.0, 0.045)).unwrap();
        assert!((px - IMG.centre()).length() < 1e-9);
    }

    #[test]
    fn test_rig_yaw_turns_towards_target() {
        let rig = CameraRig {
            position: DVec3::ZERO,
            rotation: Euler::new(0.0, 0.0, FRAC_PI_2),
            lens: Lens::rectilinear(FRAC_PI_2),
            image: IMG,
            stereo: None,
        };
        // Yaw 90 degrees: world +y is now straight ahead.
        let cam = rig.world_to_camera(DVec3::new(0.0, 3.0, 0.0));
        assert!((cam - DVec3::new(3.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_aim_at() {
        let rot = CameraRig::aim_at(DVec3::new(0.0, 0.0, 0.9), DVec3::ZERO, 0.1);
        assert!((rot.pitch + FRAC_PI_2).abs() < 1e-9);
        assert!((rot.roll - 0.1).abs() < 1e-9);

        let rot = CameraRig::aim_at(DVec3::new(1.0, 1.0, 1.0), DVec3::new(1.0, 3.0, 1.0), 0.0);
        assert!((rot.yaw - FRAC_PI_2).abs() < 1e-9);
        assert!(rot.pitch.abs() < 1e-9);
    }

    #[test]
    fn test_aimed_rig_centres_target() {
        let position = DVec3::new(-1.2, 0.8, 0.95);
        let target = DVec3::new(2.0, -1.5, 0.0);
        let rig = CameraRig {
            position,
            rotation: CameraRig::aim_at(position, target, 0.0),
            lens: Lens::equisolid(10.5, PI),
            image: IMG,
            stereo: None,
        };
        let px = rig.project(target).unwrap();
        assert!((px - IMG.centre()).length() < 1e-6);
    }

    #[test]
    fn test_camera_to_world_translation() {
        let rig = CameraRig {
            position: DVec3::new(1.0, -2.0, 0.5),
            rotation: Euler::new(0.0, -0.4, 1.3),
            lens: Lens::equisolid(10.5, PI),
            image: IMG,
            stereo: None,
        };
        let m = rig.camera_to_world();
        let t = m.col(3);
        assert!((t.truncate() - rig.position).length() < 1e-12);
        // The matrix maps the camera origin to the rig position.
        let origin = m * glam::DVec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.truncate() - rig.position).length() < 1e-12);
    }

    #[test]
    fn test_stereo_baseline_along_image_right() {
        let rig = CameraRig {
            position: DVec3::new(0.0, 0.0, 0.9),
            rotation: Euler::ZERO,
            lens: Lens::equisolid(10.5, PI),
            image: IMG,
            stereo: Some(0.1),
        };
        let (left, right) = rig.stereo_matrices().unwrap();
        assert!((left.col(3).truncate() - rig.position).length() < 1e-12);
        // Identity pose: image right is world -y.
        let expected = DVec3::new(0.0, -0.1, 0.9);
        assert!((right.col(3).truncate() - expected).length() < 1e-12);
    }

    #[test]
    fn test_stereo_none_without_baseline() {
        let rig = CameraRig {
            position: DVec3::ZERO,
            rotation: Euler::ZERO,
            lens: Lens::rectilinear(FRAC_PI_2),
            image: IMG,
            stereo: None,
        };
        assert!(rig.stereo_matrices().is_none());
    }
}
