use nalgebra::{Isometry3, Matrix3, Matrix6xX, Quaternion, Translation3, Vector3};

use super::ball::{
    angular_velocity_to_quaternion_rate, orientation, quaternion_rate_to_angular_velocity,
    write_quaternion,
};
use super::{JointError, JointModel};
use crate::spatial::{Real, SpatialVec};

/// Six degrees of freedom.
///
/// Positions are `[qw, qx, qy, qz, px, py, pz]`: the quaternion of `R_FM`
/// followed by the position of M's origin in F. Velocities are
/// `[ωx, ωy, ωz, vx, vy, vz]`: the angular velocity of M and the velocity of
/// M's origin, both measured and expressed in F.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreeJoint;

impl FreeJoint {
    pub fn new() -> FreeJoint {
        FreeJoint
    }
}

impl JointModel for FreeJoint {
    fn num_positions(&self) -> usize {
        7
    }

    fn num_velocities(&self) -> usize {
        6
    }

    fn default_positions(&self, q: &mut [f64]) {
        write_quaternion(&Quaternion::identity(), &mut q[..4]);
        q[4..7].fill(0.0);
    }

    fn joint_transform<T: Real>(&self, q: &[T]) -> Result<Isometry3<T>, JointError> {
        Ok(Isometry3::from_parts(
            Translation3::new(q[4], q[5], q[6]),
            orientation(&q[..4])?,
        ))
    }

    fn motion_subspace<T: Real>(&self, q: &[T]) -> Result<Matrix6xX<T>, JointError> {
        let r_mf: Matrix3<T> = orientation(&q[..4])?
            .to_rotation_matrix()
            .matrix()
            .transpose();
        let mut s = Matrix6xX::zeros(6);
        s.fixed_view_mut::<3, 3>(0, 0).copy_from(&r_mf);
        s.fixed_view_mut::<3, 3>(3, 3).copy_from(&r_mf);
        Ok(s)
    }

    fn motion_subspace_bias<T: Real>(
        &self,
        q: &[T],
        v: &[T],
    ) -> Result<SpatialVec<T>, JointError> {
        // S's columns are fixed in F, so in M they rotate with -ω.
        let r_mf: Matrix3<T> = orientation(&q[..4])?
            .to_rotation_matrix()
            .matrix()
            .transpose();
        let w_m = r_mf * Vector3::new(v[0], v[1], v[2]);
        let v_m = r_mf * Vector3::new(v[3], v[4], v[5]);
        Ok(SpatialVec::new(Vector3::zeros(), -w_m.cross(&v_m)))
    }

    fn map_velocity_to_qdot<T: Real>(
        &self,
        q: &[T],
        v: &[T],
        qdot: &mut [T],
    ) -> Result<(), JointError> {
        let w = Vector3::new(v[0], v[1], v[2]);
        angular_velocity_to_quaternion_rate(&q[..4], &w, &mut qdot[..4])?;
        qdot[4..7].copy_from_slice(&v[3..6]);
        Ok(())
    }

    fn map_qdot_to_velocity<T: Real>(
        &self,
        q: &[T],
        qdot: &[T],
        v: &mut [T],
    ) -> Result<(), JointError> {
        let w = quaternion_rate_to_angular_velocity(&q[..4], &qdot[..4])?;
        v[..3].copy_from_slice(w.as_slice());
        v[3..6].copy_from_slice(&qdot[4..7]);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_identity() {
        let joint = FreeJoint::new();
        let mut q = [0.0; 7];
        joint.default_positions(&mut q);
        assert_eq!(q, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let x = joint.joint_transform(&q).unwrap();
        assert_relative_eq!(x, Isometry3::identity());
    }

    #[test]
    fn test_bias_vanishes_without_rotation() {
        let q = [1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0];
        let c = FreeJoint::new()
            .motion_subspace_bias(&q, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0])
            .unwrap();
        assert_relative_eq!(c, SpatialVec::zero());
    }
}
