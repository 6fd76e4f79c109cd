use nalgebra::{Matrix3, Matrix6, Vector3};

use super::skew;

/// Rotational inertia about the center of mass, in body axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationalInertia {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
}

impl RotationalInertia {
    pub fn new(xx: f64, yy: f64, zz: f64, xy: f64, xz: f64, yz: f64) -> RotationalInertia {
        RotationalInertia {
            xx,
            yy,
            zz,
            xy,
            xz,
            yz,
        }
    }

    pub fn zero() -> RotationalInertia {
        RotationalInertia::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    pub fn diagonal(xx: f64, yy: f64, zz: f64) -> RotationalInertia {
        RotationalInertia::new(xx, yy, zz, 0.0, 0.0, 0.0)
    }

    pub fn from_matrix(m: &Matrix3<f64>) -> RotationalInertia {
        RotationalInertia::new(
            m[(0, 0)],
            m[(1, 1)],
            m[(2, 2)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 2)],
        )
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.xx, self.xy, self.xz, self.xy, self.yy, self.yz, self.xz, self.yz, self.zz,
        )
    }

    /// Re-expresses the tensor in a frame rotated by `rot` (`R I Rᵀ`).
    pub fn rotated(&self, rot: &Matrix3<f64>) -> RotationalInertia {
        RotationalInertia::from_matrix(&(rot * self.to_matrix() * rot.transpose()))
    }
}

/// Mass properties of a rigid body: mass, center of mass in the body frame
/// and rotational inertia about the center of mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialInertia {
    pub mass: f64,
    pub com: Vector3<f64>,
    pub inertia: RotationalInertia,
}

impl Default for SpatialInertia {
    fn default() -> Self {
        Self::zero()
    }
}

impl SpatialInertia {
    pub fn new(mass: f64, com: Vector3<f64>, inertia: RotationalInertia) -> SpatialInertia {
        SpatialInertia { mass, com, inertia }
    }

    pub fn zero() -> SpatialInertia {
        SpatialInertia::new(0.0, Vector3::zeros(), RotationalInertia::zero())
    }

    pub fn point_mass(mass: f64, com: Vector3<f64>) -> SpatialInertia {
        SpatialInertia::new(mass, com, RotationalInertia::zero())
    }

    pub fn solid_sphere(mass: f64, radius: f64) -> SpatialInertia {
        let i = 0.4 * mass * radius * radius;
        SpatialInertia::new(mass, Vector3::zeros(), RotationalInertia::diagonal(i, i, i))
    }

    /// Checks non-negative finite mass and a symmetric positive semi-definite
    /// rotational inertia.
    pub fn validate(&self) -> Result<(), String> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(format!("mass must be finite and non-negative, got {}", self.mass));
        }
        if !self.com.iter().all(|c| c.is_finite()) {
            return Err("center of mass must be finite".to_string());
        }
        let m = self.inertia.to_matrix();
        if !m.iter().all(|c| c.is_finite()) {
            return Err("rotational inertia must be finite".to_string());
        }
        let scale = m.abs().max().max(1.0);
        let min_eig = m.symmetric_eigenvalues().min();
        if min_eig < -1e-12 * scale {
            return Err(format!(
                "rotational inertia is not positive semi-definite (eigenvalue {min_eig:e})"
            ));
        }
        Ok(())
    }

    /// 6×6 spatial inertia about the body origin, `[angular; linear]` order.
    pub fn to_matrix(&self) -> Matrix6<f64> {
        let c = skew(&self.com);
        let mc = c * self.mass;
        let mut res = Matrix6::zeros();
        res.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(self.inertia.to_matrix() + mc * c.transpose()));
        res.fixed_view_mut::<3, 3>(0, 3).copy_from(&mc);
        res.fixed_view_mut::<3, 3>(3, 0).copy_from(&mc.transpose());
        res.fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&Matrix3::from_diagonal_element(self.mass));
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inertia() {
        let inertia = SpatialInertia::new(
            1.0,
            Vector3::zeros(),
            RotationalInertia::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0),
        );
        let spatial_inertia = inertia.to_matrix();
        assert_eq!(spatial_inertia[(0, 0)], 1.0);
        assert_eq!(spatial_inertia[(1, 1)], 2.0);
        assert_eq!(spatial_inertia[(2, 2)], 3.0);
        assert_eq!(spatial_inertia[(0, 1)], 4.0);
        assert_eq!(spatial_inertia[(3, 3)], 1.0);
        assert_eq!(spatial_inertia[(4, 4)], 1.0);
        assert_eq!(spatial_inertia[(5, 5)], 1.0);
    }

    #[test]
    fn test_parallel_axis() {
        // Point mass at distance l along -y, inertia about z at the origin is m l².
        let inertia = SpatialInertia::point_mass(2.0, Vector3::new(0.0, -0.5, 0.0));
        let m = inertia.to_matrix();
        assert_relative_eq!(m[(2, 2)], 2.0 * 0.25);
        assert_relative_eq!(m, m.transpose());
    }

    #[test]
    fn test_validate() {
        assert!(SpatialInertia::solid_sphere(1.0, 0.1).validate().is_ok());
        assert!(SpatialInertia::point_mass(-1.0, Vector3::zeros())
            .validate()
            .is_err());
        let bad = SpatialInertia::new(
            1.0,
            Vector3::zeros(),
            RotationalInertia::diagonal(-1.0, 1.0, 1.0),
        );
        assert!(bad.validate().is_err());
    }
}
