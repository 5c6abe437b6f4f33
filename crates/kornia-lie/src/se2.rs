use crate::so2::SO2;
use glam::{DMat3, DVec2, DVec3};
use rand::Rng;

/// A planar rigid transformation `p' = R p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE2 {
    /// Rotation part.
    pub r: SO2,
    /// Translation part.
    pub t: DVec2,
}

impl Default for SE2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SE2 {
    /// The identity transformation.
    pub const IDENTITY: Self = Self {
        r: SO2::IDENTITY,
        t: DVec2::from_array([0.0, 0.0]),
    };

    /// Creates a transformation from a rotation and a translation.
    pub fn new(r: SO2, t: DVec2) -> Self {
        Self { r, t }
    }

    /// Creates a transformation from a yaw angle in radians and a translation.
    pub fn from_yaw(yaw: f64, t: DVec2) -> Self {
        Self::new(SO2::exp(yaw), t)
    }

    /// Random rotation and a translation in the unit square.
    pub fn from_random() -> Self {
        let mut rng = rand::rng();
        Self {
            r: SO2::from_random(),
            t: DVec2::new(rng.random(), rng.random()),
        }
    }

    /// Rotation angle in radians.
    pub fn yaw(&self) -> f64 {
        self.r.log()
    }

    /// Same translation with the rotation replaced by `yaw`.
    pub fn with_yaw(&self, yaw: f64) -> Self {
        Self::new(SO2::exp(yaw), self.t)
    }

    /// Homogeneous 3x3 matrix of the transformation.
    pub fn matrix(&self) -> DMat3 {
        let (c, s) = (self.r.cos(), self.r.sin());
        DMat3::from_cols(
            DVec3::new(c, s, 0.0),
            DVec3::new(-s, c, 0.0),
            DVec3::new(self.t.x, self.t.y, 1.0),
        )
    }

    /// Inverse transformation.
    pub fn inverse(&self) -> Self {
        let r_inv = self.r.inverse();
        Self {
            r: r_inv,
            t: r_inv * (-self.t),
        }
    }

    /// Applies only the rotation part to a direction.
    pub fn rotate(&self, v: DVec2) -> DVec2 {
        self.r * v
    }
}

impl std::ops::Mul<SE2> for SE2 {
    type Output = SE2;

    fn mul(self, other: SE2) -> SE2 {
        SE2::new(self.r * other.r, self.r * other.t + self.t)
    }
}

impl std::ops::Mul<DVec2> for SE2 {
    type Output = DVec2;

    fn mul(self, rhs: DVec2) -> DVec2 {
        self.r * rhs + self.t
    }
}
