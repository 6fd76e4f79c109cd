use std::collections::HashMap;

use nalgebra::{DVector, Isometry3, Vector3};
use tracing::{debug, info};

use crate::error::{ElementKind, MultibodyError, Result};
use crate::geometry::GeometryRegistry;
use crate::joint::{FreeJoint, JointKind, JointModel, TypedJoint};
use crate::spatial::{SpatialInertia, SpatialVec};
use crate::state::Context;

mod topology;
mod tree;

pub(crate) use topology::Topology;
pub use tree::{
    Actuator, ActuatorIndex, Body, BodyIndex, Joint, JointIndex, WORLD_INDEX, WORLD_NAME,
};

/// Standard gravity used by [`ModelConfig::default`].
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Model-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Gravitational acceleration in the world frame.
    pub gravity: Vector3<f64>,
    /// Largest condition estimate accepted for an articulated joint inertia
    /// before forward dynamics reports a singular mass matrix.
    pub max_condition_number: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, 0.0, -STANDARD_GRAVITY),
            max_condition_number: 1.0 / f64::EPSILON,
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(MultibodyError::InvalidConfig {
                field: "gravity",
                message: format!("must be finite, got {:?}", self.gravity),
            });
        }
        if !(self.max_condition_number >= 1.0) {
            return Err(MultibodyError::InvalidConfig {
                field: "max_condition_number",
                message: format!("must be at least 1, got {}", self.max_condition_number),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Stage {
    Open,
    Locked(Topology),
}

/// An articulated rigid-body model.
///
/// Built in two phases: while open, bodies, joints, actuators and geometry
/// are added; [`MultiBody::lock`] then freezes the tree and the state
/// layout, after which the model only evaluates against caller-owned
/// [`Context`]s.
#[derive(Debug, Clone)]
pub struct MultiBody {
    pub(crate) name: String,
    pub(crate) config: ModelConfig,
    pub(crate) bodies: Vec<Body>,
    pub(crate) joints: Vec<Joint>,
    pub(crate) actuators: Vec<Actuator>,
    body_names: HashMap<String, BodyIndex>,
    joint_names: HashMap<String, JointIndex>,
    actuator_names: HashMap<String, ActuatorIndex>,
    pub(crate) geometry: GeometryRegistry,
    pub(crate) stage: Stage,
}

impl Default for MultiBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiBody {
    pub fn new() -> MultiBody {
        MultiBody::with_config("multibody", ModelConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: ModelConfig) -> MultiBody {
        let world = Body {
            index: WORLD_INDEX,
            name: WORLD_NAME.to_string(),
            inertia: SpatialInertia::zero(),
        };
        let mut body_names = HashMap::new();
        body_names.insert(WORLD_NAME.to_string(), WORLD_INDEX);
        MultiBody {
            name: name.into(),
            config,
            bodies: vec![world],
            joints: vec![],
            actuators: vec![],
            body_names,
            joint_names: HashMap::new(),
            actuator_names: HashMap::new(),
            geometry: GeometryRegistry::default(),
            stage: Stage::Open,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn gravity(&self) -> &Vector3<f64> {
        &self.config.gravity
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.stage, Stage::Locked(_))
    }

    pub(crate) fn ensure_open(&self, operation: &'static str) -> Result<()> {
        match self.stage {
            Stage::Open => Ok(()),
            Stage::Locked(_) => Err(MultibodyError::PostLock { operation }),
        }
    }

    pub(crate) fn topology(&self, operation: &'static str) -> Result<&Topology> {
        match &self.stage {
            Stage::Locked(topology) => Ok(topology),
            Stage::Open => Err(MultibodyError::PreLock { operation }),
        }
    }

    pub(crate) fn check_body(&self, body: BodyIndex, context: &str) -> Result<&Body> {
        self.bodies.get(body.0).ok_or_else(|| MultibodyError::UnknownBody {
            index: body.0,
            context: context.to_string(),
        })
    }

    fn check_joint(&self, joint: JointIndex, context: &str) -> Result<&Joint> {
        self.joints.get(joint.0).ok_or_else(|| MultibodyError::UnknownJoint {
            index: joint.0,
            context: context.to_string(),
        })
    }

    pub fn set_gravity(&mut self, gravity: Vector3<f64>) -> Result<()> {
        self.ensure_open("set_gravity")?;
        if !gravity.iter().all(|g| g.is_finite()) {
            return Err(MultibodyError::InvalidConfig {
                field: "gravity",
                message: format!("must be finite, got {gravity:?}"),
            });
        }
        self.config.gravity = gravity;
        Ok(())
    }

    pub fn add_body(&mut self, name: impl Into<String>, inertia: SpatialInertia) -> Result<BodyIndex> {
        self.ensure_open("add_body")?;
        let name = name.into();
        if self.body_names.contains_key(&name) {
            return Err(MultibodyError::DuplicateName {
                element: ElementKind::Body,
                name,
            });
        }
        inertia
            .validate()
            .map_err(|message| MultibodyError::InvalidInertia {
                body: name.clone(),
                message,
            })?;
        let index = BodyIndex(self.bodies.len());
        self.body_names.insert(name.clone(), index);
        self.bodies.push(Body {
            index,
            name,
            inertia,
        });
        Ok(index)
    }

    /// Connects `child` to `parent`. `x_pf` places the joint's inboard frame
    /// on the parent, `x_bm` its outboard frame on the child.
    pub fn add_joint(
        &mut self,
        name: impl Into<String>,
        parent: BodyIndex,
        x_pf: Isometry3<f64>,
        child: BodyIndex,
        x_bm: Isometry3<f64>,
        kind: impl Into<JointKind>,
    ) -> Result<JointIndex> {
        self.ensure_open("add_joint")?;
        let name = name.into();
        let kind = kind.into();
        if self.joint_names.contains_key(&name) {
            return Err(MultibodyError::DuplicateName {
                element: ElementKind::Joint,
                name,
            });
        }
        let context = format!("add_joint('{name}')");
        self.check_body(parent, &context)?;
        let child_body = self.check_body(child, &context)?;
        if child == WORLD_INDEX {
            return Err(MultibodyError::WorldAsChild { joint: name });
        }
        if parent == child {
            return Err(MultibodyError::SelfLoop {
                joint: name,
                body: child_body.name.clone(),
            });
        }
        if let Some(existing) = self.joints.iter().find(|j| j.child == child) {
            return Err(MultibodyError::InboardJointExists {
                joint: name,
                body: child_body.name.clone(),
                existing: existing.name.clone(),
            });
        }
        kind.validate()
            .map_err(|message| MultibodyError::InvalidJointParameters {
                joint: name.clone(),
                message,
            })?;
        let index = JointIndex(self.joints.len());
        self.joint_names.insert(name.clone(), index);
        self.joints.push(Joint {
            index,
            name,
            parent,
            child,
            x_pf,
            x_bm,
            kind,
            implicit: false,
        });
        Ok(index)
    }

    /// Actuates every velocity coordinate of `joint`.
    pub fn add_actuator(&mut self, name: impl Into<String>, joint: JointIndex) -> Result<ActuatorIndex> {
        self.ensure_open("add_actuator")?;
        let nv = self.check_joint(joint, "add_actuator")?.kind.num_velocities();
        let dofs: Vec<usize> = (0..nv).collect();
        self.add_actuator_with_dofs(name, joint, &dofs)
    }

    /// Actuates the listed local velocity coordinates of `joint`, one input
    /// each, in the given order.
    pub fn add_actuator_with_dofs(
        &mut self,
        name: impl Into<String>,
        joint: JointIndex,
        dofs: &[usize],
    ) -> Result<ActuatorIndex> {
        self.ensure_open("add_actuator")?;
        let name = name.into();
        if self.actuator_names.contains_key(&name) {
            return Err(MultibodyError::DuplicateName {
                element: ElementKind::Actuator,
                name,
            });
        }
        let target = self.check_joint(joint, &format!("add_actuator('{name}')"))?;
        let nv = target.kind.num_velocities();
        if dofs.is_empty() {
            return Err(MultibodyError::InvalidActuatorDofs {
                actuator: name,
                message: format!("joint '{}' has no coordinates to actuate", target.name),
            });
        }
        for (k, &dof) in dofs.iter().enumerate() {
            if dof >= nv {
                return Err(MultibodyError::InvalidActuatorDofs {
                    actuator: name,
                    message: format!(
                        "coordinate {dof} is out of range for joint '{}' with {nv} velocities",
                        target.name
                    ),
                });
            }
            if dofs[..k].contains(&dof) {
                return Err(MultibodyError::InvalidActuatorDofs {
                    actuator: name,
                    message: format!("coordinate {dof} is listed twice"),
                });
            }
            if let Some(existing) = self
                .actuators
                .iter()
                .find(|a| a.joint == joint && a.dofs.contains(&dof))
            {
                return Err(MultibodyError::DofAlreadyActuated {
                    actuator: name,
                    joint: target.name.clone(),
                    dof,
                    existing: existing.name.clone(),
                });
            }
        }
        let index = ActuatorIndex(self.actuators.len());
        self.actuator_names.insert(name.clone(), index);
        self.actuators.push(Actuator {
            index,
            name,
            joint,
            dofs: dofs.to_vec(),
        });
        Ok(index)
    }

    /// Freezes the topology and computes the state layout.
    ///
    /// Bodies without an inboard joint are attached to the world by a free
    /// joint named `<body>_floating`. On failure the model stays open and
    /// unchanged.
    pub fn lock(&mut self) -> Result<()> {
        self.ensure_open("lock")?;
        self.config.validate()?;

        let mut joints = self.joints.clone();
        let mut joint_names = self.joint_names.clone();
        let mut has_inboard = vec![false; self.bodies.len()];
        for joint in &joints {
            has_inboard[joint.child.0] = true;
        }
        for body in self.bodies.iter().skip(1) {
            if has_inboard[body.index.0] {
                continue;
            }
            let name = format!("{}_floating", body.name);
            if joint_names.contains_key(&name) {
                return Err(MultibodyError::DuplicateName {
                    element: ElementKind::Joint,
                    name,
                });
            }
            debug!(body = %body.name, joint = %name, "adding implicit free joint");
            let index = JointIndex(joints.len());
            joint_names.insert(name.clone(), index);
            joints.push(Joint {
                index,
                name,
                parent: WORLD_INDEX,
                child: body.index,
                x_pf: Isometry3::identity(),
                x_bm: Isometry3::identity(),
                kind: FreeJoint::new().into(),
                implicit: true,
            });
        }

        let topology = Topology::build(&self.bodies, &joints, &self.actuators)?;
        let frames = self.geometry.assign_frames(self.bodies.len());

        info!(
            model = %self.name,
            bodies = self.bodies.len(),
            joints = joints.len(),
            actuators = self.actuators.len(),
            positions = topology.num_positions,
            velocities = topology.num_velocities,
            "locked multibody model"
        );
        self.joints = joints;
        self.joint_names = joint_names;
        self.geometry.frames = frames;
        self.stage = Stage::Locked(topology);
        Ok(())
    }

    pub fn world_body(&self) -> &Body {
        &self.bodies[WORLD_INDEX.0]
    }

    pub fn body(&self, index: BodyIndex) -> Result<&Body> {
        self.check_body(index, "body")
    }

    pub fn joint(&self, index: JointIndex) -> Result<&Joint> {
        self.check_joint(index, "joint")
    }

    pub fn actuator(&self, index: ActuatorIndex) -> Result<&Actuator> {
        self.actuators
            .get(index.0)
            .ok_or_else(|| MultibodyError::UnknownActuator {
                index: index.0,
                context: "actuator".to_string(),
            })
    }

    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter()
    }

    pub fn joints(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter()
    }

    pub fn actuators(&self) -> impl Iterator<Item = &Actuator> {
        self.actuators.iter()
    }

    pub fn has_body_named(&self, name: &str) -> bool {
        self.body_names.contains_key(name)
    }

    pub fn body_by_name(&self, name: &str) -> Result<&Body> {
        self.body_names
            .get(name)
            .map(|i| &self.bodies[i.0])
            .ok_or_else(|| MultibodyError::unknown_name(ElementKind::Body, name))
    }

    pub fn has_joint_named(&self, name: &str) -> bool {
        self.joint_names.contains_key(name)
    }

    pub fn joint_by_name(&self, name: &str) -> Result<&Joint> {
        self.joint_names
            .get(name)
            .map(|i| &self.joints[i.0])
            .ok_or_else(|| MultibodyError::unknown_name(ElementKind::Joint, name))
    }

    /// Looks up a joint and its kind-specific parameters, failing with
    /// [`MultibodyError::KindMismatch`] when the joint is of another kind.
    pub fn joint_kind_by_name<K: TypedJoint>(&self, name: &str) -> Result<(&Joint, &K)> {
        let joint = self.joint_by_name(name)?;
        let typed = K::from_kind(&joint.kind).ok_or_else(|| MultibodyError::KindMismatch {
            name: name.to_string(),
            expected: K::KIND,
            actual: joint.kind.kind_name(),
        })?;
        Ok((joint, typed))
    }

    pub fn has_actuator_named(&self, name: &str) -> bool {
        self.actuator_names.contains_key(name)
    }

    pub fn actuator_by_name(&self, name: &str) -> Result<&Actuator> {
        self.actuator_names
            .get(name)
            .map(|i| &self.actuators[i.0])
            .ok_or_else(|| MultibodyError::unknown_name(ElementKind::Actuator, name))
    }

    /// Includes the world body.
    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn num_actuators(&self) -> usize {
        self.actuators.len()
    }

    pub fn num_actuated_dofs(&self) -> Result<usize> {
        Ok(self.topology("num_actuated_dofs")?.num_actuated_dofs)
    }

    pub fn num_positions(&self) -> Result<usize> {
        Ok(self.topology("num_positions")?.num_positions)
    }

    pub fn num_velocities(&self) -> Result<usize> {
        Ok(self.topology("num_velocities")?.num_velocities)
    }

    pub fn num_multibody_states(&self) -> Result<usize> {
        let topology = self.topology("num_multibody_states")?;
        Ok(topology.num_positions + topology.num_velocities)
    }

    pub fn parent_body(&self, body: BodyIndex) -> Result<Option<BodyIndex>> {
        let topology = self.topology("parent_body")?;
        self.check_body(body, "parent_body")?;
        Ok(topology.parent(body))
    }

    pub fn child_bodies(&self, body: BodyIndex) -> Result<Vec<BodyIndex>> {
        let topology = self.topology("child_bodies")?;
        self.check_body(body, "child_bodies")?;
        Ok(topology.children(body))
    }

    pub fn leaf_bodies(&self) -> Result<Vec<BodyIndex>> {
        Ok(self.topology("leaf_bodies")?.leaves())
    }

    /// Joint that connects `body` to its parent.
    pub fn inboard_joint(&self, body: BodyIndex) -> Result<Option<&Joint>> {
        let topology = self.topology("inboard_joint")?;
        self.check_body(body, "inboard_joint")?;
        Ok(topology.inboard[body.0].map(|j| &self.joints[j.0]))
    }

    /// Offsets of `joint`'s blocks in q and v.
    pub fn joint_offsets(&self, joint: JointIndex) -> Result<(usize, usize)> {
        let topology = self.topology("joint_offsets")?;
        self.check_joint(joint, "joint_offsets")?;
        Ok((topology.q_offsets[joint.0], topology.v_offsets[joint.0]))
    }

    /// A context at the zero configuration with zero velocities and inputs.
    pub fn create_default_context(&self) -> Result<Context> {
        let topology = self.topology("create_default_context")?;
        let mut q = DVector::zeros(topology.num_positions);
        for joint in &self.joints {
            let offset = topology.q_offsets[joint.index.0];
            let nq = joint.kind.num_positions();
            joint
                .kind
                .default_positions(&mut q.as_mut_slice()[offset..offset + nq]);
        }
        Ok(Context::new(
            q,
            topology.num_velocities,
            topology.num_actuated_dofs,
        ))
    }

    pub(crate) fn check_context(&self, topology: &Topology, ctx: &Context) -> Result<()> {
        let checks = [
            ("context positions", topology.num_positions, ctx.q.len()),
            ("context velocities", topology.num_velocities, ctx.v.len()),
            ("context actuation", topology.num_actuated_dofs, ctx.u.len()),
            (
                "context applied forces",
                topology.num_velocities,
                ctx.tau_applied.len(),
            ),
        ];
        for (what, expected, actual) in checks {
            if expected != actual {
                return Err(MultibodyError::dimension(what, expected, actual));
            }
        }
        Ok(())
    }

    pub fn joint_positions<'a>(&self, ctx: &'a Context, joint: JointIndex) -> Result<&'a [f64]> {
        self.check_context(self.topology("joint_positions")?, ctx)?;
        let (offset, _) = self.joint_offsets(joint)?;
        let nq = self.joints[joint.0].kind.num_positions();
        Ok(&ctx.q.as_slice()[offset..offset + nq])
    }

    pub fn joint_velocities<'a>(&self, ctx: &'a Context, joint: JointIndex) -> Result<&'a [f64]> {
        self.check_context(self.topology("joint_velocities")?, ctx)?;
        let (_, offset) = self.joint_offsets(joint)?;
        let nv = self.joints[joint.0].kind.num_velocities();
        Ok(&ctx.v.as_slice()[offset..offset + nv])
    }

    pub fn set_joint_positions(&self, ctx: &mut Context, joint: JointIndex, q: &[f64]) -> Result<()> {
        self.check_context(self.topology("set_joint_positions")?, ctx)?;
        let (offset, _) = self.joint_offsets(joint)?;
        let j = &self.joints[joint.0];
        let nq = j.kind.num_positions();
        if q.len() != nq {
            return Err(MultibodyError::dimension(
                format!("positions of joint '{}'", j.name),
                nq,
                q.len(),
            ));
        }
        ctx.q.as_mut_slice()[offset..offset + nq].copy_from_slice(q);
        Ok(())
    }

    pub fn set_joint_velocities(&self, ctx: &mut Context, joint: JointIndex, v: &[f64]) -> Result<()> {
        self.check_context(self.topology("set_joint_velocities")?, ctx)?;
        let (_, offset) = self.joint_offsets(joint)?;
        let j = &self.joints[joint.0];
        let nv = j.kind.num_velocities();
        if v.len() != nv {
            return Err(MultibodyError::dimension(
                format!("velocities of joint '{}'", j.name),
                nv,
                v.len(),
            ));
        }
        ctx.v.as_mut_slice()[offset..offset + nv].copy_from_slice(v);
        Ok(())
    }

    /// Free joint mobilizing `body`, with its parent's world pose and spatial
    /// velocity at the context's state.
    fn free_joint_frame(
        &self,
        ctx: &Context,
        body: BodyIndex,
        operation: &'static str,
    ) -> Result<(&Joint, Isometry3<f64>, SpatialVec)> {
        let topology = self.topology(operation)?;
        let b = self.check_body(body, operation)?;
        let joint = topology.inboard[body.0]
            .map(|j| &self.joints[j.0])
            .filter(|j| matches!(j.kind, JointKind::Free(_)))
            .ok_or_else(|| MultibodyError::NotFreeBody {
                body: b.name.clone(),
            })?;
        let kinematics = self.calc_kinematics(ctx)?;
        let x_wf = kinematics.poses[joint.parent.0] * joint.x_pf;
        Ok((joint, x_wf, kinematics.velocities[joint.parent.0]))
    }

    /// Sets the free joint of `body` so that its world pose becomes `x_wb`.
    pub fn set_free_body_pose(&self, ctx: &mut Context, body: BodyIndex, x_wb: &Isometry3<f64>) -> Result<()> {
        let (joint, x_wf, _) = self.free_joint_frame(ctx, body, "set_free_body_pose")?;
        let x_fm = x_wf.inverse() * x_wb * joint.x_bm;
        let r = x_fm.rotation;
        let p = x_fm.translation.vector;
        let q = [r.w, r.i, r.j, r.k, p.x, p.y, p.z];
        self.set_joint_positions(ctx, joint.index, &q)
    }

    /// Sets the free joint velocities of `body` so that its spatial velocity
    /// in the world (angular velocity, velocity of the body origin, both
    /// expressed in world) becomes `v_wb`. Positions must already be set.
    pub fn set_free_body_spatial_velocity(
        &self,
        ctx: &mut Context,
        body: BodyIndex,
        v_wb: &SpatialVec,
    ) -> Result<()> {
        let (joint, x_wf, v_wp) =
            self.free_joint_frame(ctx, body, "set_free_body_spatial_velocity")?;
        let x_wb = self.body_pose_in_world(ctx, body)?;
        let x_wp = x_wf * joint.x_pf.inverse();
        let p_wm = (x_wb * joint.x_bm).translation.vector;
        let p_wb = x_wb.translation.vector;
        let p_wp = x_wp.translation.vector;

        let w_rel = v_wb.angular() - v_wp.angular();
        let v_wm = v_wb.linear() + v_wb.angular().cross(&(p_wm - p_wb));
        let v_wp_at_m = v_wp.linear() + v_wp.angular().cross(&(p_wm - p_wp));
        let r_fw = x_wf.rotation.inverse();
        let w_f = r_fw * w_rel;
        let v_f = r_fw * (v_wm - v_wp_at_m);
        self.set_joint_velocities(ctx, joint.index, &[w_f.x, w_f.y, w_f.z, v_f.x, v_f.y, v_f.z])
    }

    /// Lower position bounds, `-∞` where unbounded.
    pub fn position_lower_limits(&self) -> Result<DVector<f64>> {
        Ok(self.position_limits("position_lower_limits")?.0)
    }

    /// Upper position bounds, `+∞` where unbounded.
    pub fn position_upper_limits(&self) -> Result<DVector<f64>> {
        Ok(self.position_limits("position_upper_limits")?.1)
    }

    fn position_limits(&self, operation: &'static str) -> Result<(DVector<f64>, DVector<f64>)> {
        let topology = self.topology(operation)?;
        let mut lower = DVector::zeros(topology.num_positions);
        let mut upper = DVector::zeros(topology.num_positions);
        for joint in &self.joints {
            let offset = topology.q_offsets[joint.index.0];
            let nq = joint.kind.num_positions();
            joint.kind.position_limits(
                &mut lower.as_mut_slice()[offset..offset + nq],
                &mut upper.as_mut_slice()[offset..offset + nq],
            );
        }
        Ok((lower, upper))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::joint::{PrismaticJoint, RevoluteJoint, WeldJoint};
    use crate::spatial::RotationalInertia;

    fn link() -> SpatialInertia {
        SpatialInertia::new(
            1.0,
            Vector3::new(0.0, -0.5, 0.0),
            RotationalInertia::diagonal(0.1, 0.1, 0.1),
        )
    }

    fn two_link() -> MultiBody {
        let mut mb = MultiBody::new();
        let l1 = mb.add_body("Link1", link()).unwrap();
        let l2 = mb.add_body("Link2", link()).unwrap();
        mb.add_joint(
            "Shoulder",
            WORLD_INDEX,
            Isometry3::identity(),
            l1,
            Isometry3::identity(),
            RevoluteJoint::new(Vector3::z()),
        )
        .unwrap();
        let elbow = mb
            .add_joint(
                "Elbow",
                l1,
                Isometry3::translation(0.0, -1.0, 0.0),
                l2,
                Isometry3::identity(),
                RevoluteJoint::new(Vector3::z()),
            )
            .unwrap();
        mb.add_actuator("ElbowMotor", elbow).unwrap();
        mb
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut mb = two_link();
        let err = mb.add_body("Link1", link()).unwrap_err();
        assert!(matches!(err, MultibodyError::DuplicateName { element: ElementKind::Body, .. }));
        let err = mb
            .add_joint(
                "Wrist",
                BodyIndex(1),
                Isometry3::identity(),
                BodyIndex(42),
                Isometry3::identity(),
                WeldJoint::new(),
            )
            .unwrap_err();
        assert!(matches!(err, MultibodyError::UnknownBody { index: 42, .. }));
        assert_eq!(mb.num_joints(), 2);
    }

    #[test]
    fn test_structural_rules() {
        let mut mb = two_link();
        let l2 = mb.body_by_name("Link2").unwrap().index();
        let err = mb
            .add_joint("Again", WORLD_INDEX, Isometry3::identity(), l2, Isometry3::identity(), WeldJoint::new())
            .unwrap_err();
        assert!(matches!(err, MultibodyError::InboardJointExists { .. }));
        let err = mb
            .add_joint("ToWorld", l2, Isometry3::identity(), WORLD_INDEX, Isometry3::identity(), WeldJoint::new())
            .unwrap_err();
        assert!(matches!(err, MultibodyError::WorldAsChild { .. }));
        let l3 = mb.add_body("Link3", link()).unwrap();
        let err = mb
            .add_joint("Loop", l3, Isometry3::identity(), l3, Isometry3::identity(), WeldJoint::new())
            .unwrap_err();
        assert!(matches!(err, MultibodyError::SelfLoop { .. }));
    }

    #[test]
    fn test_actuator_rules() {
        let mut mb = two_link();
        let elbow = mb.joint_by_name("Elbow").unwrap().index();
        let err = mb.add_actuator("Second", elbow).unwrap_err();
        assert!(matches!(err, MultibodyError::DofAlreadyActuated { .. }));
        let shoulder = mb.joint_by_name("Shoulder").unwrap().index();
        let err = mb.add_actuator_with_dofs("Bad", shoulder, &[1]).unwrap_err();
        assert!(matches!(err, MultibodyError::InvalidActuatorDofs { .. }));
        let err = mb.add_actuator("ElbowMotor", shoulder).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
    }

    #[test]
    fn test_lock_once() {
        let mut mb = two_link();
        assert!(matches!(
            mb.num_positions(),
            Err(MultibodyError::PreLock { .. })
        ));
        mb.lock().unwrap();
        assert!(matches!(mb.lock(), Err(MultibodyError::PostLock { operation: "lock" })));
        assert!(matches!(
            mb.add_body("AnotherBody", SpatialInertia::zero()),
            Err(MultibodyError::PostLock { operation: "add_body" })
        ));
        assert!(matches!(
            mb.set_gravity(Vector3::zeros()),
            Err(MultibodyError::PostLock { .. })
        ));
    }

    #[test]
    fn test_cycle_leaves_model_open() {
        let mut mb = MultiBody::new();
        let a = mb.add_body("A", link()).unwrap();
        let b = mb.add_body("B", link()).unwrap();
        mb.add_joint("ab", a, Isometry3::identity(), b, Isometry3::identity(), RevoluteJoint::new(Vector3::z()))
            .unwrap();
        mb.add_joint("ba", b, Isometry3::identity(), a, Isometry3::identity(), RevoluteJoint::new(Vector3::z()))
            .unwrap();
        let err = mb.lock().unwrap_err();
        assert!(matches!(err, MultibodyError::Cycle { .. }));
        assert!(!mb.is_locked());
        assert_eq!(mb.num_joints(), 2);
    }

    #[test]
    fn test_implicit_free_joint() {
        let mut mb = two_link();
        let ball = mb.add_body("Ball", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
        mb.lock().unwrap();
        assert_eq!(mb.num_joints(), 3);
        let (joint, _) = mb.joint_kind_by_name::<FreeJoint>("Ball_floating").unwrap();
        assert!(joint.is_implicit());
        assert_eq!(joint.child_body(), ball);
        assert_eq!(mb.num_positions().unwrap(), 2 + 7);
        assert_eq!(mb.num_velocities().unwrap(), 2 + 6);
        assert_eq!(mb.parent_body(ball).unwrap(), Some(WORLD_INDEX));
        let mut leaves = mb.leaf_bodies().unwrap();
        leaves.sort();
        assert_eq!(leaves, vec![BodyIndex(2), ball]);
    }

    #[test]
    fn test_layout_follows_tree_order() {
        let mut mb = MultiBody::new();
        let a = mb.add_body("A", link()).unwrap();
        let b = mb.add_body("B", link()).unwrap();
        // Joint to the deeper body added first.
        let jb = mb
            .add_joint("jb", a, Isometry3::identity(), b, Isometry3::identity(), PrismaticJoint::new(Vector3::x()))
            .unwrap();
        let ja = mb
            .add_joint("ja", WORLD_INDEX, Isometry3::identity(), a, Isometry3::identity(), RevoluteJoint::new(Vector3::z()))
            .unwrap();
        mb.lock().unwrap();
        assert_eq!(mb.joint_offsets(ja).unwrap(), (0, 0));
        assert_eq!(mb.joint_offsets(jb).unwrap(), (1, 1));
        assert_eq!(mb.child_bodies(a).unwrap(), vec![b]);
        assert_eq!(mb.inboard_joint(b).unwrap().unwrap().name(), "jb");
    }

    #[test]
    fn test_joint_state_access() {
        let mut mb = two_link();
        mb.lock().unwrap();
        let mut ctx = mb.create_default_context().unwrap();
        let elbow = mb.joint_by_name("Elbow").unwrap().index();
        mb.set_joint_positions(&mut ctx, elbow, &[0.7]).unwrap();
        mb.set_joint_velocities(&mut ctx, elbow, &[-1.0]).unwrap();
        assert_eq!(ctx.positions().as_slice(), &[0.0, 0.7]);
        assert_eq!(mb.joint_velocities(&ctx, elbow).unwrap(), &[-1.0]);
        assert!(mb.set_joint_positions(&mut ctx, elbow, &[0.0, 1.0]).is_err());

        // A context sized for another model is rejected, not indexed.
        let mut short = two_link();
        short.add_body("Ball", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
        short.lock().unwrap();
        let mut foreign = short.create_default_context().unwrap();
        let shoulder = short.joint_by_name("Shoulder").unwrap().index();
        let err = mb.joint_positions(&foreign, shoulder).unwrap_err();
        assert!(matches!(err, MultibodyError::DimensionMismatch { expected: 2, actual: 9, .. }));
        assert!(mb.set_joint_velocities(&mut foreign, shoulder, &[1.0]).is_err());
        assert_eq!(short.joint_velocities(&foreign, shoulder).unwrap(), &[0.0]);
    }

    #[test]
    fn test_non_unit_axis_rejected() {
        let mut mb = MultiBody::new();
        let a = mb.add_body("A", link()).unwrap();
        let hinge = RevoluteJoint {
            axis: Vector3::new(0.0, 0.0, 2.0),
            ..RevoluteJoint::new(Vector3::z())
        };
        let err = mb
            .add_joint("hinge", WORLD_INDEX, Isometry3::identity(), a, Isometry3::identity(), hinge)
            .unwrap_err();
        assert!(matches!(err, MultibodyError::InvalidJointParameters { .. }));
        assert_eq!(mb.num_joints(), 0);
    }

    #[test]
    fn test_config_validation() {
        let mut mb = two_link();
        let err = mb.set_gravity(Vector3::new(0.0, f64::NAN, 0.0)).unwrap_err();
        assert!(matches!(err, MultibodyError::InvalidConfig { field: "gravity", .. }));
        assert_eq!(mb.gravity(), &ModelConfig::default().gravity);

        let config = ModelConfig {
            max_condition_number: 0.5,
            ..Default::default()
        };
        let mut mb = MultiBody::with_config("bad", config);
        mb.add_body("A", link()).unwrap();
        let err = mb.lock().unwrap_err();
        assert!(matches!(err, MultibodyError::InvalidConfig { field: "max_condition_number", .. }));
        assert!(!mb.is_locked());
    }

    #[test]
    fn test_limits() {
        let mut mb = MultiBody::new();
        let a = mb.add_body("A", link()).unwrap();
        mb.add_joint(
            "slide",
            WORLD_INDEX,
            Isometry3::identity(),
            a,
            Isometry3::identity(),
            PrismaticJoint::new(Vector3::x()).with_limits(-0.5, 0.25),
        )
        .unwrap();
        assert!(mb.position_lower_limits().is_err());
        mb.lock().unwrap();
        assert_eq!(mb.position_lower_limits().unwrap()[0], -0.5);
        assert_eq!(mb.position_upper_limits().unwrap()[0], 0.25);
    }
}
