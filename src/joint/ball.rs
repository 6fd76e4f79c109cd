use nalgebra::{
    Isometry3, Matrix3, Matrix6xX, Quaternion, Translation3, UnitQuaternion, Vector3,
};

use super::{JointError, JointModel};
use crate::spatial::Real;

/// Quaternions with a norm below this are treated as degenerate.
const MIN_QUATERNION_NORM: f64 = 1e-12;

/// Reads `[w, x, y, z]`.
pub(super) fn quaternion<T: Real>(q: &[T]) -> Quaternion<T> {
    Quaternion::new(q[0], q[1], q[2], q[3])
}

pub(super) fn write_quaternion<T: Real>(quat: &Quaternion<T>, out: &mut [T]) {
    out[0] = quat.w;
    out[1] = quat.i;
    out[2] = quat.j;
    out[3] = quat.k;
}

/// Normalized orientation `R_FM`; the stored coordinates may drift from unit
/// norm.
pub(super) fn orientation<T: Real>(q: &[T]) -> Result<UnitQuaternion<T>, JointError> {
    UnitQuaternion::try_new(quaternion(q), T::from_value(MIN_QUATERNION_NORM))
        .ok_or(JointError::DegenerateQuaternion)
}

fn check_norm<T: Real>(quat: &Quaternion<T>) -> Result<(), JointError> {
    if quat.norm().value() < MIN_QUATERNION_NORM {
        return Err(JointError::DegenerateQuaternion);
    }
    Ok(())
}

/// `q̇ = ½ [0, ω] ⊗ q` with ω expressed in F.
pub(super) fn angular_velocity_to_quaternion_rate<T: Real>(
    q: &[T],
    w: &Vector3<T>,
    qdot: &mut [T],
) -> Result<(), JointError> {
    let quat = quaternion(q);
    check_norm(&quat)?;
    write_quaternion(&(Quaternion::from_imag(*w) * quat * T::from_value(0.5)), qdot);
    Ok(())
}

/// `[0, ω] = 2 q̇ ⊗ q⁻¹`; the scalar part, which a valid rate leaves at zero,
/// is discarded.
pub(super) fn quaternion_rate_to_angular_velocity<T: Real>(
    q: &[T],
    qdot: &[T],
) -> Result<Vector3<T>, JointError> {
    let quat = quaternion(q);
    check_norm(&quat)?;
    let inv = quat
        .try_inverse()
        .ok_or(JointError::DegenerateQuaternion)?;
    Ok((quaternion(qdot) * inv * T::from_value(2.0)).imag())
}

/// Three rotational degrees of freedom. Positions are the quaternion
/// `[w, x, y, z]` of `R_FM`, velocities the angular velocity of M in F,
/// expressed in F.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BallJoint {
    pub damping: f64,
}

impl BallJoint {
    pub fn new() -> BallJoint {
        BallJoint { damping: 0.0 }
    }

    pub fn with_damping(mut self, damping: f64) -> BallJoint {
        self.damping = damping;
        self
    }
}

impl JointModel for BallJoint {
    fn num_positions(&self) -> usize {
        4
    }

    fn num_velocities(&self) -> usize {
        3
    }

    fn default_positions(&self, q: &mut [f64]) {
        write_quaternion(&Quaternion::identity(), q);
    }

    fn joint_transform<T: Real>(&self, q: &[T]) -> Result<Isometry3<T>, JointError> {
        Ok(Isometry3::from_parts(
            Translation3::identity(),
            orientation(q)?,
        ))
    }

    fn motion_subspace<T: Real>(&self, q: &[T]) -> Result<Matrix6xX<T>, JointError> {
        let r_mf: Matrix3<T> = orientation(q)?.to_rotation_matrix().matrix().transpose();
        let mut s = Matrix6xX::zeros(3);
        s.fixed_view_mut::<3, 3>(0, 0).copy_from(&r_mf);
        Ok(s)
    }

    fn map_velocity_to_qdot<T: Real>(
        &self,
        q: &[T],
        v: &[T],
        qdot: &mut [T],
    ) -> Result<(), JointError> {
        angular_velocity_to_quaternion_rate(q, &Vector3::new(v[0], v[1], v[2]), qdot)
    }

    fn map_qdot_to_velocity<T: Real>(
        &self,
        q: &[T],
        qdot: &[T],
        v: &mut [T],
    ) -> Result<(), JointError> {
        let w = quaternion_rate_to_angular_velocity(q, qdot)?;
        v.copy_from_slice(w.as_slice());
        Ok(())
    }

    fn add_damping_forces<T: Real>(&self, v: &[T], tau: &mut [T]) {
        let d = T::from_value(self.damping);
        for (t, w) in tau.iter_mut().zip(v) {
            *t -= d * *w;
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !self.damping.is_finite() || self.damping < 0.0 {
            return Err(format!("damping must be non-negative, got {}", self.damping));
        }
        Ok(())
    }
}
