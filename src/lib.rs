//! # multibody is a library for articulated rigid-body dynamics.
//!
//! Build a tree of bodies and joints on a [`MultiBody`], [`lock`] it, then
//! evaluate kinematics and the equations of motion against a caller-owned
//! [`Context`]:
//!
//! `M(q) v̇ + C(q, v) = τ_g(q) + τ_u + τ_applied + τ_damping`
//!
//! [`lock`]: MultiBody::lock

// #![deny(missing_docs)]
#![deny(unsafe_code)]

mod dynamics;
mod error;
mod geometry;
mod joint;
mod kinematics;
mod multi_body;
mod spatial;
mod state;
mod urdf;

pub use dynamics::{linearize, LinearSystem};
pub use error::{ElementKind, ErrorCategory, MultibodyError, Result};
pub use geometry::{
    FrameId, FrameIdVector, FramePoseVector, GeometryId, GeometryInstance, GeometrySourceId, Shape,
};
pub use joint::{
    BallJoint, FreeJoint, JointError, JointKind, JointModel, PrismaticJoint, RevoluteJoint,
    TypedJoint, WeldJoint,
};
pub use kinematics::KinematicsCache;
pub use multi_body::{
    Actuator, ActuatorIndex, Body, BodyIndex, Joint, JointIndex, ModelConfig, MultiBody,
    STANDARD_GRAVITY, WORLD_INDEX, WORLD_NAME,
};
pub use spatial::{skew, Real, RotationalInertia, SpatialInertia, SpatialTransform, SpatialVec};
pub use state::Context;
