use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Fixed number of fixed-point iterations used to invert the distortion model.
const UNDISTORT_ITERATIONS: usize = 20;

/// Represents the polynomial distortion parameters of a camera
///
/// Rational radial model with two tangential terms. All zeros means no distortion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PolynomialDistortion {
    /// The first radial distortion coefficient
    pub k1: f64,
    /// The second radial distortion coefficient
    pub k2: f64,
    /// The third radial distortion coefficient
    pub k3: f64,
    /// The fourth radial distortion coefficient
    pub k4: f64,
    /// The fifth radial distortion coefficient
    pub k5: f64,
    /// The sixth radial distortion coefficient
    pub k6: f64,
    /// The first tangential distortion coefficient
    pub p1: f64,
    /// The second tangential distortion coefficient
    pub p2: f64,
}

impl PolynomialDistortion {
    /// Returns true when every coefficient is zero.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Radial gain and tangential offset for an undistorted normalized point.
    fn terms(&self, p: DVec2) -> (f64, DVec2) {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let kr = (1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6)
            / (1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6);

        let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;

        (kr, DVec2::new(dx, dy))
    }

    /// Distorts an undistorted normalized image coordinate.
    pub fn distort(&self, p: DVec2) -> DVec2 {
        let (kr, delta) = self.terms(p);
        p * kr + delta
    }

    /// Removes distortion from a distorted normalized image coordinate.
    pub fn undistort(&self, pd: DVec2) -> DVec2 {
        if self.is_identity() {
            return pd;
        }
        let mut p = pd;
        for _ in 0..UNDISTORT_ITERATIONS {
            let (kr, delta) = self.terms(p);
            p = (pd - delta) / kr;
        }
        p
    }
}

/// Represents the intrinsic parameters of a pinhole camera with lens distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsic {
    /// The focal length in the x direction
    pub fx: f64,
    /// The focal length in the y direction
    pub fy: f64,
    /// The x coordinate of the principal point
    pub cx: f64,
    /// The y coordinate of the principal point
    pub cy: f64,
    /// Lens distortion
    #[serde(default)]
    pub distortion: PolynomialDistortion,
}

impl CameraIntrinsic {
    /// Creates a distortion free pinhole camera.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            distortion: PolynomialDistortion::default(),
        }
    }

    /// Same camera with the given lens distortion.
    pub fn with_distortion(mut self, distortion: PolynomialDistortion) -> Self {
        self.distortion = distortion;
        self
    }

    /// Projects an undistorted normalized image coordinate to a pixel.
    pub fn normal_to_pixel(&self, n: DVec2) -> DVec2 {
        let d = self.distortion.distort(n);
        DVec2::new(self.fx * d.x + self.cx, self.fy * d.y + self.cy)
    }

    /// Back-projects a pixel to an undistorted normalized image coordinate.
    pub fn pixel_to_normal(&self, pixel: DVec2) -> DVec2 {
        let d = DVec2::new((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy);
        self.distortion.undistort(d)
    }
}
