//! Building an open model from a URDF description.

use std::collections::HashMap;
use std::path::Path;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use tracing::debug;
use urdf_rs::{read_file, read_from_string, JointType};

use crate::error::{ElementKind, MultibodyError, Result};
use crate::geometry::Shape;
use crate::joint::{BallJoint, FreeJoint, JointKind, PrismaticJoint, RevoluteJoint, WeldJoint};
use crate::multi_body::{BodyIndex, ModelConfig, MultiBody, WORLD_INDEX, WORLD_NAME};
use crate::spatial::{RotationalInertia, SpatialInertia};

impl MultiBody {
    /// Loads a URDF file. The returned model is still open, so actuators,
    /// extra bodies or gravity can be set before `lock()`.
    pub fn from_urdf(path: impl AsRef<Path>) -> Result<MultiBody> {
        let robot = read_file(path)?;
        parse_robot(robot)
    }

    pub fn from_urdf_str(xml: &str) -> Result<MultiBody> {
        let robot = read_from_string(xml)?;
        parse_robot(robot)
    }
}

fn parse_robot(robot: urdf_rs::Robot) -> Result<MultiBody> {
    let mut multi_body = MultiBody::with_config(robot.name.clone(), ModelConfig::default());

    // link name -> body index
    let mut bodies: HashMap<&str, BodyIndex> = HashMap::new();
    for link in &robot.links {
        let index = if link.name == WORLD_NAME {
            WORLD_INDEX
        } else {
            multi_body.add_body(link.name.clone(), link_inertia(&link.inertial))?
        };
        bodies.insert(link.name.as_str(), index);
    }

    let lookup = |name: &str| {
        bodies
            .get(name)
            .copied()
            .ok_or_else(|| MultibodyError::unknown_name(ElementKind::Body, name))
    };
    for joint in &robot.joints {
        let parent = lookup(&joint.parent.link)?;
        let child = lookup(&joint.child.link)?;
        multi_body.add_joint(
            joint.name.clone(),
            parent,
            origin_to_isometry(&joint.origin),
            child,
            Isometry3::identity(),
            joint_kind(joint)?,
        )?;
    }

    let has_geometry = robot
        .links
        .iter()
        .any(|l| !l.visual.is_empty() || !l.collision.is_empty());
    if has_geometry {
        multi_body.register_as_source(robot.name.clone())?;
        for link in &robot.links {
            let body = lookup(&link.name)?;
            let visuals = link.visual.iter().map(|v| (&v.origin, &v.geometry));
            let collisions = link.collision.iter().map(|c| (&c.origin, &c.geometry));
            for (origin, geometry) in visuals.chain(collisions) {
                if let Some(shape) = shape(geometry) {
                    multi_body.register_geometry(body, origin_to_isometry(origin), shape)?;
                }
            }
        }
    }

    debug!(
        robot = %robot.name,
        links = robot.links.len(),
        joints = robot.joints.len(),
        geometries = multi_body.num_geometries(),
        "parsed URDF"
    );
    Ok(multi_body)
}

fn link_inertia(inertial: &urdf_rs::Inertial) -> SpatialInertia {
    let i = &inertial.inertia;
    let about_com = RotationalInertia::new(i.ixx, i.iyy, i.izz, i.ixy, i.ixz, i.iyz);
    let x_bc = origin_to_isometry(&inertial.origin);
    let rot = x_bc.rotation.to_rotation_matrix();
    SpatialInertia::new(
        inertial.mass.value,
        x_bc.translation.vector,
        about_com.rotated(rot.matrix()),
    )
}

fn joint_kind(joint: &urdf_rs::Joint) -> Result<JointKind> {
    let axis = Vector3::from(joint.axis.xyz.0);
    let damping = joint.dynamics.as_ref().map(|d| d.damping).unwrap_or(0.0);
    let limit = &joint.limit;
    let bounded = limit.lower < limit.upper;
    let kind = match &joint.joint_type {
        JointType::Revolute => {
            let revolute = RevoluteJoint::new(axis).with_damping(damping);
            if bounded {
                revolute.with_limits(limit.lower, limit.upper).into()
            } else {
                revolute.into()
            }
        }
        JointType::Continuous => RevoluteJoint::new(axis).with_damping(damping).into(),
        JointType::Prismatic => {
            let prismatic = PrismaticJoint::new(axis).with_damping(damping);
            if bounded {
                prismatic.with_limits(limit.lower, limit.upper).into()
            } else {
                prismatic.into()
            }
        }
        JointType::Fixed => WeldJoint::new().into(),
        JointType::Floating => FreeJoint::new().into(),
        JointType::Spherical => BallJoint::new().with_damping(damping).into(),
        other => {
            return Err(MultibodyError::UnsupportedJointType {
                joint: joint.name.clone(),
                kind: format!("{other:?}").to_lowercase(),
            })
        }
    };
    Ok(kind)
}

#[allow(unreachable_patterns)]
fn shape(geometry: &urdf_rs::Geometry) -> Option<Shape> {
    use urdf_rs::Geometry;
    match geometry {
        Geometry::Box { size } => Some(Shape::Box {
            size: Vector3::from(size.0),
        }),
        Geometry::Sphere { radius } => Some(Shape::Sphere { radius: *radius }),
        Geometry::Cylinder { radius, length } => Some(Shape::Cylinder {
            radius: *radius,
            length: *length,
        }),
        Geometry::Capsule { radius, length } => Some(Shape::Capsule {
            radius: *radius,
            length: *length,
        }),
        Geometry::Mesh { filename, scale } => Some(Shape::Mesh {
            filename: filename.clone(),
            scale: scale.as_ref().map(|s| Vector3::from(s.0)).unwrap_or_else(|| Vector3::repeat(1.0)),
        }),
        _ => None,
    }
}

fn origin_to_isometry(origin: &urdf_rs::Pose) -> Isometry3<f64> {
    let rpy = origin.rpy.0;
    let xyz = origin.xyz.0;
    Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    )
}
