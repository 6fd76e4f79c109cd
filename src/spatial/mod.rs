//! 6D spatial algebra.
//!
//! Spatial vectors are stored `[angular; linear]`. A motion vector is
//! `[ω; v]` where `v` is the velocity of the point at the frame origin, a
//! force vector is `[n; f]` with `n` the moment about the frame origin.
//!
//! Everything here is generic over [`Real`] so the same recursions run on
//! `f64` and on dual numbers.

use approx::{AbsDiffEq, RelativeEq};
use nalgebra::{
    Isometry3, Matrix3, Matrix6, Matrix6xX, Quaternion, RealField, Translation3, UnitQuaternion,
    Vector3, Vector6,
};
use num_dual::Dual64;

mod inertia;

pub use inertia::{RotationalInertia, SpatialInertia};

/// Scalar type the kinematics and dynamics evaluators run on.
pub trait Real: RealField + Copy {
    /// The primal value, with any derivative part dropped.
    fn value(self) -> f64;

    fn from_value(x: f64) -> Self {
        nalgebra::convert(x)
    }
}

impl Real for f64 {
    #[inline]
    fn value(self) -> f64 {
        self
    }
}

impl Real for Dual64 {
    #[inline]
    fn value(self) -> f64 {
        self.re
    }
}

/// Skew-symmetric matrix such that `skew(a) * b == a.cross(&b)`.
pub fn skew<T: Real>(v: &Vector3<T>) -> Matrix3<T> {
    let zero = T::zero();
    Matrix3::new(zero, -v.z, v.y, v.z, zero, -v.x, -v.y, v.x, zero)
}

/// Lifts a model pose into the evaluation scalar.
pub fn cast_isometry<T: Real>(x: &Isometry3<f64>) -> Isometry3<T> {
    let coords = x.rotation.quaternion().coords.cast::<T>();
    Isometry3::from_parts(
        Translation3::from(x.translation.vector.cast::<T>()),
        UnitQuaternion::new_unchecked(Quaternion::from(coords)),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialVec<T: Real = f64> {
    pub data: Vector6<T>,
}

impl<T: Real> SpatialVec<T> {
    #[inline]
    pub fn new(angular: Vector3<T>, linear: Vector3<T>) -> Self {
        Self {
            data: Vector6::new(
                angular.x, angular.y, angular.z, linear.x, linear.y, linear.z,
            ),
        }
    }

    #[inline]
    pub fn zero() -> Self {
        Self {
            data: Vector6::zeros(),
        }
    }

    #[inline]
    pub fn from_vector(data: Vector6<T>) -> Self {
        Self { data }
    }

    #[inline]
    pub fn angular(&self) -> Vector3<T> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    #[inline]
    pub fn linear(&self) -> Vector3<T> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    /// Motion cross product `self ×ₘ other`.
    pub fn cross_motion(&self, other: &SpatialVec<T>) -> SpatialVec<T> {
        let w = self.angular();
        let v = self.linear();
        let w2 = other.angular();
        let v2 = other.linear();
        SpatialVec::new(w.cross(&w2), w.cross(&v2) + v.cross(&w2))
    }

    /// Force cross product `self ×f other`.
    pub fn cross_force(&self, other: &SpatialVec<T>) -> SpatialVec<T> {
        let w = self.angular();
        let v = self.linear();
        let n = other.angular();
        let f = other.linear();
        SpatialVec::new(w.cross(&n) + v.cross(&f), w.cross(&f))
    }

    #[inline]
    pub fn dot(&self, other: &SpatialVec<T>) -> T {
        self.data.dot(&other.data)
    }
}

impl<T: Real> std::ops::Add for SpatialVec<T> {
    type Output = SpatialVec<T>;
    #[inline]
    fn add(self, rhs: SpatialVec<T>) -> SpatialVec<T> {
        SpatialVec {
            data: self.data + rhs.data,
        }
    }
}

impl<T: Real> std::ops::AddAssign for SpatialVec<T> {
    #[inline]
    fn add_assign(&mut self, rhs: SpatialVec<T>) {
        self.data += rhs.data;
    }
}

impl<T: Real> std::ops::Sub for SpatialVec<T> {
    type Output = SpatialVec<T>;
    #[inline]
    fn sub(self, rhs: SpatialVec<T>) -> SpatialVec<T> {
        SpatialVec {
            data: self.data - rhs.data,
        }
    }
}

impl<T: Real> std::ops::Mul<T> for SpatialVec<T> {
    type Output = SpatialVec<T>;
    #[inline]
    fn mul(self, rhs: T) -> SpatialVec<T> {
        SpatialVec {
            data: self.data * rhs,
        }
    }
}

impl<T: Real> std::ops::Neg for SpatialVec<T> {
    type Output = SpatialVec<T>;
    #[inline]
    fn neg(self) -> SpatialVec<T> {
        SpatialVec { data: -self.data }
    }
}

impl AbsDiffEq for SpatialVec {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.data.abs_diff_eq(&other.data, epsilon)
    }
}

impl RelativeEq for SpatialVec {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.data.relative_eq(&other.data, epsilon, max_relative)
    }
}

/// Plücker transform from a parent frame P to a child frame C.
///
/// `rot` maps parent coordinates to child coordinates (`R_CP`), `pos` is the
/// child origin expressed in the parent frame (`p_PC`).
#[derive(Debug, Clone, Copy)]
pub struct SpatialTransform<T: Real = f64> {
    pub rot: Matrix3<T>,
    pub pos: Vector3<T>,
}

impl<T: Real> SpatialTransform<T> {
    pub fn identity() -> Self {
        Self {
            rot: Matrix3::identity(),
            pos: Vector3::zeros(),
        }
    }

    /// Builds the transform from the pose `X_PC` of the child in the parent.
    pub fn from_pose(x_pc: &Isometry3<T>) -> Self {
        Self {
            rot: x_pc.rotation.to_rotation_matrix().matrix().transpose(),
            pos: x_pc.translation.vector,
        }
    }

    /// Motion vector from parent to child coordinates.
    pub fn apply_motion(&self, m: &SpatialVec<T>) -> SpatialVec<T> {
        let w = m.angular();
        let v = m.linear() - self.pos.cross(&w);
        SpatialVec::new(self.rot * w, self.rot * v)
    }

    /// Force vector from child to parent coordinates (`Xᵀ f`).
    pub fn inv_apply_force(&self, f: &SpatialVec<T>) -> SpatialVec<T> {
        let rt = self.rot.transpose();
        let force = rt * f.linear();
        let moment = rt * f.angular() + self.pos.cross(&force);
        SpatialVec::new(moment, force)
    }

    /// The 6×6 motion transform `[E 0; -E r̃ E]`.
    pub fn to_motion_matrix(&self) -> Matrix6<T> {
        let mut res = Matrix6::zeros();
        res.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rot);
        res.fixed_view_mut::<3, 3>(3, 3).copy_from(&self.rot);
        res.fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&(-self.rot * skew(&self.pos)));
        res
    }

    /// Applies the motion transform to every column of a motion subspace.
    pub fn apply_motion_columns(&self, s: &Matrix6xX<T>) -> Matrix6xX<T> {
        self.to_motion_matrix() * s
    }

    /// Child-frame inertia expressed in the parent frame, `Xᵀ I X`.
    pub fn inertia_to_parent(&self, inertia: &Matrix6<T>) -> Matrix6<T> {
        let x = self.to_motion_matrix();
        x.transpose() * inertia * x
    }
}
