use nalgebra::{Isometry3, Matrix6xX, Translation3, Unit, UnitQuaternion, Vector3};

use super::{JointError, JointModel};
use crate::spatial::Real;

/// Largest accepted deviation of a joint axis from unit length.
const AXIS_NORM_TOLERANCE: f64 = 1e-12;

/// One rotational degree of freedom about `axis` (unit, in F and M).
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    pub axis: Vector3<f64>,
    pub damping: f64,
    pub lower_limit: f64,
    pub upper_limit: f64,
}

impl RevoluteJoint {
    pub fn new(axis: Vector3<f64>) -> RevoluteJoint {
        RevoluteJoint {
            axis: axis.normalize(),
            damping: 0.0,
            lower_limit: f64::NEG_INFINITY,
            upper_limit: f64::INFINITY,
        }
    }

    pub fn with_damping(mut self, damping: f64) -> RevoluteJoint {
        self.damping = damping;
        self
    }

    pub fn with_limits(mut self, lower: f64, upper: f64) -> RevoluteJoint {
        self.lower_limit = lower;
        self.upper_limit = upper;
        self
    }
}

impl JointModel for RevoluteJoint {
    fn num_positions(&self) -> usize {
        1
    }

    fn num_velocities(&self) -> usize {
        1
    }

    fn default_positions(&self, q: &mut [f64]) {
        q[0] = 0.0;
    }

    fn joint_transform<T: Real>(&self, q: &[T]) -> Result<Isometry3<T>, JointError> {
        let axis = Unit::new_unchecked(self.axis.cast::<T>());
        let rot = UnitQuaternion::from_axis_angle(&axis, q[0]);
        Ok(Isometry3::from_parts(Translation3::identity(), rot))
    }

    fn motion_subspace<T: Real>(&self, _q: &[T]) -> Result<Matrix6xX<T>, JointError> {
        let mut s = Matrix6xX::zeros(1);
        s.fixed_view_mut::<3, 1>(0, 0).copy_from(&self.axis.cast::<T>());
        Ok(s)
    }

    fn map_velocity_to_qdot<T: Real>(
        &self,
        _q: &[T],
        v: &[T],
        qdot: &mut [T],
    ) -> Result<(), JointError> {
        qdot[0] = v[0];
        Ok(())
    }

    fn map_qdot_to_velocity<T: Real>(
        &self,
        _q: &[T],
        qdot: &[T],
        v: &mut [T],
    ) -> Result<(), JointError> {
        v[0] = qdot[0];
        Ok(())
    }

    fn add_damping_forces<T: Real>(&self, v: &[T], tau: &mut [T]) {
        tau[0] -= T::from_value(self.damping) * v[0];
    }

    fn position_limits(&self, lower: &mut [f64], upper: &mut [f64]) {
        lower[0] = self.lower_limit;
        upper[0] = self.upper_limit;
    }

    fn validate(&self) -> Result<(), String> {
        validate_axis_joint(&self.axis, self.damping, self.lower_limit, self.upper_limit)
    }
}

pub(super) fn validate_axis_joint(
    axis: &Vector3<f64>,
    damping: f64,
    lower: f64,
    upper: f64,
) -> Result<(), String> {
    if !axis.iter().all(|a| a.is_finite()) {
        return Err("axis must be a finite, non-zero vector".to_string());
    }
    if (axis.norm() - 1.0).abs() > AXIS_NORM_TOLERANCE {
        return Err(format!("axis must have unit length, got norm {}", axis.norm()));
    }
    if !damping.is_finite() || damping < 0.0 {
        return Err(format!("damping must be non-negative, got {damping}"));
    }
    if lower.is_nan() || upper.is_nan() || lower > upper {
        return Err(format!("invalid position limits [{lower}, {upper}]"));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use core::f64::consts::FRAC_PI_2;

    #[test]
    fn test_transform() {
        let joint = RevoluteJoint::new(Vector3::new(0.0, 0.0, 2.0));
        let x = joint.joint_transform(&[FRAC_PI_2]).unwrap();
        assert_relative_eq!(
            x.transform_vector(&Vector3::x()),
            Vector3::y(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_invalid_parameters() {
        let joint = RevoluteJoint::new(Vector3::zeros());
        assert!(joint.validate().is_err());
        let joint = RevoluteJoint::new(Vector3::x()).with_limits(1.0, -1.0);
        assert!(joint.validate().is_err());

        // Axes set through the fields are not normalized for the caller.
        let joint = RevoluteJoint {
            axis: Vector3::new(0.0, 0.0, 2.0),
            ..RevoluteJoint::new(Vector3::z())
        };
        assert!(joint.validate().unwrap_err().contains("unit length"));
        let joint = RevoluteJoint {
            axis: Vector3::zeros(),
            ..RevoluteJoint::new(Vector3::z())
        };
        assert!(joint.validate().is_err());
        assert!(RevoluteJoint::new(Vector3::new(1.0, 1.0, 1.0)).validate().is_ok());
    }
}
