use nalgebra::{Isometry3, Matrix6xX};

use super::{JointError, JointModel};
use crate::spatial::Real;

/// Rigidly attaches M to F, with no coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeldJoint;

impl WeldJoint {
    pub fn new() -> WeldJoint {
        WeldJoint
    }
}

impl JointModel for WeldJoint {
    fn num_positions(&self) -> usize {
        0
    }

    fn num_velocities(&self) -> usize {
        0
    }

    fn default_positions(&self, _q: &mut [f64]) {}

    fn joint_transform<T: Real>(&self, _q: &[T]) -> Result<Isometry3<T>, JointError> {
        Ok(Isometry3::identity())
    }

    fn motion_subspace<T: Real>(&self, _q: &[T]) -> Result<Matrix6xX<T>, JointError> {
        Ok(Matrix6xX::zeros(0))
    }

    fn map_velocity_to_qdot<T: Real>(
        &self,
        _q: &[T],
        _v: &[T],
        _qdot: &mut [T],
    ) -> Result<(), JointError> {
        Ok(())
    }

    fn map_qdot_to_velocity<T: Real>(
        &self,
        _q: &[T],
        _qdot: &[T],
        _v: &mut [T],
    ) -> Result<(), JointError> {
        Ok(())
    }
}
