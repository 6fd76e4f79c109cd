use nalgebra::{Isometry3, Matrix6xX, Translation3, UnitQuaternion, Vector3};

use super::revolute::validate_axis_joint;
use super::{JointError, JointModel};
use crate::spatial::Real;

/// One translational degree of freedom along `axis` (unit, in F and M).
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJoint {
    pub axis: Vector3<f64>,
    pub damping: f64,
    pub lower_limit: f64,
    pub upper_limit: f64,
}

impl PrismaticJoint {
    pub fn new(axis: Vector3<f64>) -> PrismaticJoint {
        PrismaticJoint {
            axis: axis.normalize(),
            damping: 0.0,
            lower_limit: f64::NEG_INFINITY,
            upper_limit: f64::INFINITY,
        }
    }

    pub fn with_damping(mut self, damping: f64) -> PrismaticJoint {
        self.damping = damping;
        self
    }

    pub fn with_limits(mut self, lower: f64, upper: f64) -> PrismaticJoint {
        self.lower_limit = lower;
        self.upper_limit = upper;
        self
    }
}

impl JointModel for PrismaticJoint {
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
        Ok(Isometry3::from_parts(
            Translation3::from(self.axis.cast::<T>() * q[0]),
            UnitQuaternion::identity(),
        ))
    }

    fn motion_subspace<T: Real>(&self, _q: &[T]) -> Result<Matrix6xX<T>, JointError> {
        let mut s = Matrix6xX::zeros(1);
        s.fixed_view_mut::<3, 1>(3, 0).copy_from(&self.axis.cast::<T>());
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
