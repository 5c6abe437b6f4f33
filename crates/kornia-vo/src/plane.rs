//! Projection between the image and a flat ground plane.
//!
//! The plane reference frame has its `y` axis normal to the ground, pointing
//! down, so a camera mounted above the ground sits at a negative `y`. Points on
//! the plane are described in 2D by `(z, -x)`: the first axis looks forward
//! and the second one to the left.

use glam::{DVec2, DVec3};
use kornia_lie::se3::SE3;

use crate::camera::CameraIntrinsic;

/// Lifts a 2D ground coordinate to the 3D plane reference frame.
#[inline]
pub fn plane_to_3d(p: DVec2) -> DVec3 {
    DVec3::new(-p.y, 0.0, p.x)
}

/// Horizontal direction `(z, -x)` of a vector in the plane reference frame.
#[inline]
pub fn ground_direction(v: DVec3) -> DVec2 {
    DVec2::new(v.z, -v.x)
}

/// Converts observations between pixels, normalized image coordinates and
/// the ground plane.
#[derive(Debug, Clone)]
pub struct CameraPlaneProjection {
    intrinsic: CameraIntrinsic,
    plane_to_camera: SE3,
    camera_to_plane: SE3,
}

impl CameraPlaneProjection {
    /// Creates the projection from the camera intrinsics and the plane to camera transform.
    pub fn new(intrinsic: CameraIntrinsic, plane_to_camera: SE3) -> Self {
        Self {
            intrinsic,
            plane_to_camera,
            camera_to_plane: plane_to_camera.inverse(),
        }
    }

    /// Replaces the camera intrinsics.
    pub fn set_intrinsic(&mut self, intrinsic: CameraIntrinsic) {
        self.intrinsic = intrinsic;
    }

    /// Replaces the extrinsics and caches their inverse.
    pub fn set_plane_to_camera(&mut self, plane_to_camera: SE3) {
        self.plane_to_camera = plane_to_camera;
        self.camera_to_plane = plane_to_camera.inverse();
    }

    /// Camera intrinsics.
    pub fn intrinsic(&self) -> &CameraIntrinsic {
        &self.intrinsic
    }

    /// Transform from the plane to the camera frame.
    pub fn plane_to_camera(&self) -> &SE3 {
        &self.plane_to_camera
    }

    /// Transform from the camera to the plane frame.
    pub fn camera_to_plane(&self) -> &SE3 {
        &self.camera_to_plane
    }

    /// Undistorted normalized image coordinate of a pixel.
    pub fn pixel_to_normal(&self, pixel: DVec2) -> DVec2 {
        self.intrinsic.pixel_to_normal(pixel)
    }

    /// Pixel of an undistorted normalized image coordinate.
    pub fn normal_to_pixel(&self, n: DVec2) -> DVec2 {
        self.intrinsic.normal_to_pixel(n)
    }

    /// Unit pointing vector of a normalized observation, rotated into the plane frame.
    pub fn pointing_in_plane(&self, n: DVec2) -> DVec3 {
        (self.camera_to_plane.r * DVec3::new(n.x, n.y, 1.0)).normalize()
    }

    /// Rotates a vector in the plane frame back into the camera frame.
    pub fn rotate_to_camera(&self, v: DVec3) -> DVec3 {
        self.camera_to_plane.r.transpose() * v
    }

    /// Intersects the ray of a normalized observation with the ground plane.
    ///
    /// Returns the 2D plane coordinate, or `None` when the ray is parallel to
    /// the plane or points away from it.
    pub fn normal_to_plane(&self, n: DVec2) -> Option<DVec2> {
        let pointing = self.camera_to_plane.r * DVec3::new(n.x, n.y, 1.0);
        let height = self.camera_to_plane.t.y;

        if pointing.y * height >= 0.0 {
            return None;
        }

        let t = -height / pointing.y;
        Some(DVec2::new(
            pointing.z * t + self.camera_to_plane.t.z,
            -(pointing.x * t + self.camera_to_plane.t.x),
        ))
    }

    /// Projects a 2D plane coordinate into normalized image coordinates.
    ///
    /// Returns `None` when the point lies behind the camera.
    pub fn plane_to_normal(&self, p: DVec2) -> Option<DVec2> {
        let camera = self.plane_to_camera * plane_to_3d(p);
        if camera.z <= 0.0 {
            return None;
        }
        Some(DVec2::new(camera.x / camera.z, camera.y / camera.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DMat3;

    fn level_camera(height: f64) -> CameraPlaneProjection {
        CameraPlaneProjection::new(
            CameraIntrinsic::new(500.0, 500.0, 320.0, 240.0),
            SE3::new(DMat3::IDENTITY, DVec3::new(0.0, height, 0.0)),
        )
    }

    #[test]
    fn test_normal_to_plane_level_camera() {
        let projection = level_camera(1.5);

        // straight below the optical axis, 0.5 normalized units down: z = h / 0.5
        let p = projection.normal_to_plane(DVec2::new(0.0, 0.5)).unwrap();
        assert_relative_eq!(p.x, 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);

        // to the right of the camera is negative on the second plane axis
        let p = projection.normal_to_plane(DVec2::new(0.25, 0.5)).unwrap();
        assert_relative_eq!(p.x, 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, -0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_above_horizon_does_not_hit_plane() {
        let projection = level_camera(1.5);
        assert!(projection.normal_to_plane(DVec2::new(0.1, -0.2)).is_none());
        assert!(projection.normal_to_plane(DVec2::new(0.1, 0.0)).is_none());
    }

    #[test]
    fn test_plane_to_normal_inverts_normal_to_plane() {
        let tilt = SE3::from_axis_angle(DVec3::X, 0.2, DVec3::ZERO);
        let mount = SE3::new(DMat3::IDENTITY, DVec3::new(0.3, 1.2, -0.4));
        let projection = CameraPlaneProjection::new(
            CameraIntrinsic::new(500.0, 500.0, 320.0, 240.0),
            tilt * mount,
        );

        for n in [DVec2::new(0.0, 0.3), DVec2::new(-0.4, 0.2), DVec2::new(0.5, 0.45)] {
            let p = projection.normal_to_plane(n).unwrap();
            let back = projection.plane_to_normal(p).unwrap();
            assert_relative_eq!(back.x, n.x, epsilon = 1e-9);
            assert_relative_eq!(back.y, n.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_behind_camera() {
        let projection = level_camera(1.5);
        assert!(projection.plane_to_normal(DVec2::new(-2.0, 0.0)).is_none());
    }

    #[test]
    fn test_pointing_round_trip() {
        let projection = CameraPlaneProjection::new(
            CameraIntrinsic::new(500.0, 500.0, 320.0, 240.0),
            SE3::from_axis_angle(DVec3::X, 0.1, DVec3::new(0.0, 1.0, 0.0)),
        );
        let pointing = projection.pointing_in_plane(DVec2::new(0.2, -0.1));
        assert_relative_eq!(pointing.length(), 1.0, epsilon = 1e-12);
        let camera = projection.rotate_to_camera(pointing);
        assert_relative_eq!(camera.x / camera.z, 0.2, epsilon = 1e-12);
        assert_relative_eq!(camera.y / camera.z, -0.1, epsilon = 1e-12);
    }
}
