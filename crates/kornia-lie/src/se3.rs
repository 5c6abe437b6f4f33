use glam::{DMat3, DMat4, DVec3, DVec4};

/// A rigid transformation in 3D, `p' = R p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    /// Rotation matrix.
    pub r: DMat3,
    /// Translation vector.
    pub t: DVec3,
}

impl Default for SE3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SE3 {
    /// The identity transformation.
    pub const IDENTITY: Self = Self {
        r: DMat3::IDENTITY,
        t: DVec3::ZERO,
    };

    /// Creates a transformation from a rotation matrix and a translation.
    pub fn new(r: DMat3, t: DVec3) -> Self {
        Self { r, t }
    }

    /// Rotation of `angle` radians about `axis` followed by a translation.
    pub fn from_axis_angle(axis: DVec3, angle: f64, t: DVec3) -> Self {
        Self {
            r: DMat3::from_axis_angle(axis.normalize(), angle),
            t,
        }
    }

    /// Inverse transformation.
    pub fn inverse(&self) -> Self {
        let r_inv = self.r.transpose();
        Self {
            r: r_inv,
            t: -(r_inv * self.t),
        }
    }

    /// Homogeneous 4x4 matrix of the transformation.
    pub fn matrix(&self) -> DMat4 {
        DMat4::from_cols(
            self.r.x_axis.extend(0.0),
            self.r.y_axis.extend(0.0),
            self.r.z_axis.extend(0.0),
            DVec4::new(self.t.x, self.t.y, self.t.z, 1.0),
        )
    }
}

impl std::ops::Mul<SE3> for SE3 {
    type Output = SE3;

    fn mul(self, other: SE3) -> SE3 {
        SE3::new(self.r * other.r, self.r * other.t + self.t)
    }
}

impl std::ops::Mul<DVec3> for SE3 {
    type Output = DVec3;

    fn mul(self, rhs: DVec3) -> DVec3 {
        self.r * rhs + self.t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_inverse() {
        let se3 = SE3::from_axis_angle(DVec3::new(1.0, 2.0, -0.5), 0.8, DVec3::new(0.1, -3.0, 2.0));
        let p = DVec3::new(1.0, 2.0, 3.0);
        let q = se3.inverse() * (se3 * p);
        assert_relative_eq!(q.x, p.x, epsilon = EPSILON);
        assert_relative_eq!(q.y, p.y, epsilon = EPSILON);
        assert_relative_eq!(q.z, p.z, epsilon = EPSILON);
    }

    #[test]
    fn test_mul_composes() {
        let a = SE3::from_axis_angle(DVec3::Y, 0.3, DVec3::new(1.0, 0.0, 0.0));
        let b = SE3::from_axis_angle(DVec3::X, -0.2, DVec3::new(0.0, 0.0, 2.0));
        let p = DVec3::new(-1.0, 0.5, 4.0);
        let lhs = (a * b) * p;
        let rhs = a * (b * p);
        assert_relative_eq!(lhs.x, rhs.x, epsilon = EPSILON);
        assert_relative_eq!(lhs.y, rhs.y, epsilon = EPSILON);
        assert_relative_eq!(lhs.z, rhs.z, epsilon = EPSILON);
    }

    #[test]
    fn test_matrix() {
        let se3 = SE3::from_axis_angle(DVec3::Z, 0.5, DVec3::new(1.0, 2.0, 3.0));
        let mat = se3.matrix();
        assert_eq!(mat.w_axis, DVec4::new(1.0, 2.0, 3.0, 1.0));
        let p = DVec3::new(0.2, 0.4, 0.6);
        let q = mat * p.extend(1.0);
        let expected = se3 * p;
        assert_relative_eq!(q.x, expected.x, epsilon = EPSILON);
        assert_relative_eq!(q.y, expected.y, epsilon = EPSILON);
        assert_relative_eq!(q.z, expected.z, epsilon = EPSILON);
    }
}
