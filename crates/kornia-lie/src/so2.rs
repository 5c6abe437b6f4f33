use glam::{DMat2, DVec2};
use rand::Rng;

/// A planar rotation stored as the unit complex number `z = (cos, sin)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO2 {
    /// Unit complex number `(cos θ, sin θ)`.
    pub z: DVec2,
}

impl SO2 {
    /// The identity rotation.
    pub const IDENTITY: Self = Self {
        z: DVec2::from_array([1.0, 0.0]),
    };

    /// Creates a rotation from its cosine and sine without normalizing them.
    pub fn from_cos_sin(c: f64, s: f64) -> Self {
        Self {
            z: DVec2::new(c, s),
        }
    }

    /// Rotation by `theta` radians.
    pub fn exp(theta: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self::from_cos_sin(c, s)
    }

    /// Angle of the rotation in `(-π, π]`.
    pub fn log(&self) -> f64 {
        self.z.y.atan2(self.z.x)
    }

    /// Uniformly distributed random rotation.
    pub fn from_random() -> Self {
        let mut rng = rand::rng();
        Self::exp(rng.random_range(-std::f64::consts::PI..std::f64::consts::PI))
    }

    /// Cosine of the rotation angle.
    #[inline]
    pub fn cos(&self) -> f64 {
        self.z.x
    }

    /// Sine of the rotation angle.
    #[inline]
    pub fn sin(&self) -> f64 {
        self.z.y
    }

    /// Inverse rotation, the complex conjugate.
    pub fn inverse(&self) -> Self {
        Self::from_cos_sin(self.z.x, -self.z.y)
    }

    /// Rotation matrix.
    pub fn matrix(&self) -> DMat2 {
        DMat2::from_cols(
            DVec2::new(self.z.x, self.z.y),
            DVec2::new(-self.z.y, self.z.x),
        )
    }
}

impl std::ops::Mul<SO2> for SO2 {
    type Output = SO2;

    fn mul(self, rhs: SO2) -> SO2 {
        SO2::from_cos_sin(
            self.z.x * rhs.z.x - self.z.y * rhs.z.y,
            self.z.x * rhs.z.y + self.z.y * rhs.z.x,
        )
    }
}

impl std::ops::Mul<DVec2> for SO2 {
    type Output = DVec2;

    fn mul(self, rhs: DVec2) -> DVec2 {
        DVec2::new(
            self.z.x * rhs.x - self.z.y * rhs.y,
            self.z.y * rhs.x + self.z.x * rhs.y,
        )
    }
}
