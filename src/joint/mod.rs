//! Joint kinds and their kinematic laws.
//!
//! A joint connects an inboard frame F fixed on the parent body to an
//! outboard frame M fixed on the child body. Every kind supplies its
//! coordinate counts, the transform `X_FM(q)`, the motion subspace `S(q)`
//! mapping `v` to the across-joint spatial velocity (expressed in M, about
//! the M origin) and the `v ↔ q̇` mapping.

use nalgebra::{Isometry3, Matrix6xX};

use crate::spatial::{Real, SpatialVec};

mod ball;
mod free;
mod prismatic;
mod revolute;
mod weld;

pub use ball::BallJoint;
pub use free::FreeJoint;
pub use prismatic::PrismaticJoint;
pub use revolute::RevoluteJoint;
pub use weld::WeldJoint;

/// Failure of a per-joint kinematic evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointError {
    /// Quaternion coordinates have zero norm.
    DegenerateQuaternion,
}

impl JointError {
    pub(crate) fn with_joint(self, joint: &str) -> crate::MultibodyError {
        match self {
            JointError::DegenerateQuaternion => crate::MultibodyError::DegenerateQuaternion {
                joint: joint.to_string(),
            },
        }
    }
}

/// Capability interface every joint kind implements.
///
/// Slices passed in are the joint's own block of the global vectors. The
/// kinematic maps are generic over the scalar so they can carry
/// derivatives.
pub trait JointModel {
    fn num_positions(&self) -> usize;

    fn num_velocities(&self) -> usize;

    /// Writes the zero configuration.
    fn default_positions(&self, q: &mut [f64]);

    /// Pose `X_FM` of the outboard frame in the inboard frame.
    fn joint_transform<T: Real>(&self, q: &[T]) -> Result<Isometry3<T>, JointError>;

    /// `S(q)`, 6 × nv, expressed in M.
    fn motion_subspace<T: Real>(&self, q: &[T]) -> Result<Matrix6xX<T>, JointError>;

    /// `Ṡ(q, v) · v`, the velocity product term of the across-joint
    /// acceleration, expressed in M.
    fn motion_subspace_bias<T: Real>(&self, _q: &[T], _v: &[T]) -> Result<SpatialVec<T>, JointError> {
        Ok(SpatialVec::zero())
    }

    /// `q̇ = N(q) v`.
    fn map_velocity_to_qdot<T: Real>(&self, q: &[T], v: &[T], qdot: &mut [T])
        -> Result<(), JointError>;

    /// `v = N⁺(q) q̇`.
    fn map_qdot_to_velocity<T: Real>(&self, q: &[T], qdot: &[T], v: &mut [T])
        -> Result<(), JointError>;

    /// Adds joint dissipation to the generalized force block.
    fn add_damping_forces<T: Real>(&self, _v: &[T], _tau: &mut [T]) {}

    /// Position bounds, one entry per position coordinate.
    fn position_limits(&self, lower: &mut [f64], upper: &mut [f64]) {
        lower.fill(f64::NEG_INFINITY);
        upper.fill(f64::INFINITY);
    }

    /// Checks the construction parameters.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// The closed set of supported joint kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum JointKind {
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Ball(BallJoint),
    Free(FreeJoint),
    Weld(WeldJoint),
}

macro_rules! dispatch {
    ($self:ident, $j:ident => $body:expr) => {
        match $self {
            JointKind::Revolute($j) => $body,
            JointKind::Prismatic($j) => $body,
            JointKind::Ball($j) => $body,
            JointKind::Free($j) => $body,
            JointKind::Weld($j) => $body,
        }
    };
}

impl JointKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            JointKind::Revolute(_) => RevoluteJoint::KIND,
            JointKind::Prismatic(_) => PrismaticJoint::KIND,
            JointKind::Ball(_) => BallJoint::KIND,
            JointKind::Free(_) => FreeJoint::KIND,
            JointKind::Weld(_) => WeldJoint::KIND,
        }
    }
}

impl JointModel for JointKind {
    fn num_positions(&self) -> usize {
        dispatch!(self, j => j.num_positions())
    }

    fn num_velocities(&self) -> usize {
        dispatch!(self, j => j.num_velocities())
    }

    fn default_positions(&self, q: &mut [f64]) {
        dispatch!(self, j => j.default_positions(q))
    }

    fn joint_transform<T: Real>(&self, q: &[T]) -> Result<Isometry3<T>, JointError> {
        dispatch!(self, j => j.joint_transform(q))
    }

    fn motion_subspace<T: Real>(&self, q: &[T]) -> Result<Matrix6xX<T>, JointError> {
        dispatch!(self, j => j.motion_subspace(q))
    }

    fn motion_subspace_bias<T: Real>(&self, q: &[T], v: &[T]) -> Result<SpatialVec<T>, JointError> {
        dispatch!(self, j => j.motion_subspace_bias(q, v))
    }

    fn map_velocity_to_qdot<T: Real>(
        &self,
        q: &[T],
        v: &[T],
        qdot: &mut [T],
    ) -> Result<(), JointError> {
        dispatch!(self, j => j.map_velocity_to_qdot(q, v, qdot))
    }

    fn map_qdot_to_velocity<T: Real>(
        &self,
        q: &[T],
        qdot: &[T],
        v: &mut [T],
    ) -> Result<(), JointError> {
        dispatch!(self, j => j.map_qdot_to_velocity(q, qdot, v))
    }

    fn add_damping_forces<T: Real>(&self, v: &[T], tau: &mut [T]) {
        dispatch!(self, j => j.add_damping_forces(v, tau))
    }

    fn position_limits(&self, lower: &mut [f64], upper: &mut [f64]) {
        dispatch!(self, j => j.position_limits(lower, upper))
    }

    fn validate(&self) -> Result<(), String> {
        dispatch!(self, j => j.validate())
    }
}

/// A concrete joint kind that can be recovered from a [`JointKind`], used for
/// typed lookups.
pub trait TypedJoint: JointModel + Sized {
    const KIND: &'static str;

    fn from_kind(kind: &JointKind) -> Option<&Self>;
}

macro_rules! typed_joint {
    ($ty:ident, $variant:ident, $name:literal) => {
        impl TypedJoint for $ty {
            const KIND: &'static str = $name;

            fn from_kind(kind: &JointKind) -> Option<&Self> {
                match kind {
                    JointKind::$variant(j) => Some(j),
                    _ => None,
                }
            }
        }

        impl From<$ty> for JointKind {
            fn from(j: $ty) -> Self {
                JointKind::$variant(j)
            }
        }
    };
}

typed_joint!(RevoluteJoint, Revolute, "revolute");
typed_joint!(PrismaticJoint, Prismatic, "prismatic");
typed_joint!(BallJoint, Ball, "ball");
typed_joint!(FreeJoint, Free, "free");
typed_joint!(WeldJoint, Weld, "weld");
