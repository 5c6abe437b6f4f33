use serde::{Deserialize, Serialize};

/// Parameters of [`MonoPlaneInfinity`](crate::MonoPlaneInfinity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoParams {
    /// New tracks are spawned, and the key frame moved, when the number of
    /// ground plane inliers drops below this value. Zero spawns on every frame.
    pub threshold_add: usize,
    /// Tracks are dropped after not being inliers for more than this many frames.
    pub threshold_retire: u64,
    /// Maximum pixel error of an inlier.
    pub threshold_pixel_error: f64,
    /// Reject far points whose motion is not a pure rotation about the plane normal.
    pub strict_far: bool,
}

impl Default for VoParams {
    fn default() -> Self {
        Self {
            threshold_add: 60,
            threshold_retire: 2,
            threshold_pixel_error: 1.5,
            strict_far: false,
        }
    }
}

impl VoParams {
    /// Tolerance on far point angles equivalent to `threshold_pixel_error` at
    /// the image center of a camera with focal length `fx`.
    ///
    /// Never negative: an invalid pixel error yields a zero tolerance.
    pub fn far_angle_error(&self, fx: f64) -> f64 {
        self.threshold_pixel_error.atan2(fx).max(0.0)
    }

    /// Whether the ground inlier count calls for a new key frame.
    pub fn needs_new_tracks(&self, close_inlier_count: usize) -> bool {
        self.threshold_add == 0 || close_inlier_count < self.threshold_add
    }
}
