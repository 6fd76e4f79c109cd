//! Forward kinematics over the locked tree.

use nalgebra::{DVector, Isometry3, Matrix6xX};
use tracing::trace;

use crate::error::{MultibodyError, Result};
use crate::joint::JointModel;
use crate::multi_body::{BodyIndex, MultiBody, Topology, WORLD_INDEX};
use crate::spatial::{cast_isometry, Real, SpatialTransform, SpatialVec};
use crate::state::Context;

/// Per-body quantities in body coordinates, shared by the dynamics passes.
#[derive(Debug, Clone)]
pub(crate) struct BodyKinematics<T: Real> {
    /// Motion transform from the parent body frame to this body frame.
    pub(crate) xform: SpatialTransform<T>,
    pub(crate) x_wb: Isometry3<T>,
    /// Motion subspace of the inboard joint, about the body origin.
    pub(crate) s: Matrix6xX<T>,
    /// `Ṡ v` of the inboard joint, about the body origin.
    pub(crate) bias: SpatialVec<T>,
    /// Across-joint velocity `S v`.
    pub(crate) v_joint: SpatialVec<T>,
    /// Body spatial velocity.
    pub(crate) velocity: SpatialVec<T>,
}

impl<T: Real> BodyKinematics<T> {
    fn world() -> Self {
        Self {
            xform: SpatialTransform::identity(),
            x_wb: Isometry3::identity(),
            s: Matrix6xX::zeros(0),
            bias: SpatialVec::zero(),
            v_joint: SpatialVec::zero(),
            velocity: SpatialVec::zero(),
        }
    }
}

/// Indexed by body.
pub(crate) type TreeKinematics<T> = Vec<BodyKinematics<T>>;

impl MultiBody {
    /// Recursion over the tree at positions `q` and velocities `v`.
    pub(crate) fn tree_kinematics<T: Real>(
        &self,
        topology: &Topology,
        q: &DVector<T>,
        v: &DVector<T>,
    ) -> Result<TreeKinematics<T>> {
        let mut tree = vec![BodyKinematics::world(); self.bodies.len()];
        for &body in &topology.order {
            let Some(joint) = topology.inboard[body.0].map(|j| &self.joints[j.0]) else {
                continue;
            };
            let (qo, vo) = (topology.q_offsets[joint.index.0], topology.v_offsets[joint.index.0]);
            let q_j = &q.as_slice()[qo..qo + joint.kind.num_positions()];
            let v_j = &v.as_slice()[vo..vo + joint.kind.num_velocities()];
            let fail = |e: crate::joint::JointError| e.with_joint(&joint.name);

            let x_pf: Isometry3<T> = cast_isometry(&joint.x_pf);
            let x_bm_inv: Isometry3<T> = cast_isometry(&joint.x_bm.inverse());
            let x_fm = joint.kind.joint_transform(q_j).map_err(fail)?;
            let x_pb = x_pf * x_fm * x_bm_inv;
            let to_body = SpatialTransform::from_pose(&x_bm_inv);
            let s = to_body.apply_motion_columns(&joint.kind.motion_subspace(q_j).map_err(fail)?);
            let bias = to_body.apply_motion(&joint.kind.motion_subspace_bias(q_j, v_j).map_err(fail)?);
            let v_joint = SpatialVec::from_vector(&s * DVector::from_column_slice(v_j));

            let parent = &tree[joint.parent.0];
            let xform = SpatialTransform::from_pose(&x_pb);
            let x_wb = parent.x_wb * x_pb;
            let velocity = xform.apply_motion(&parent.velocity) + v_joint;
            tree[body.0] = BodyKinematics {
                xform,
                x_wb,
                s,
                bias,
                v_joint,
                velocity,
            };
        }
        Ok(tree)
    }
}

/// World poses and spatial velocities of every body at one state.
#[derive(Debug, Clone)]
pub struct KinematicsCache {
    pub(crate) poses: Vec<Isometry3<f64>>,
    pub(crate) velocities: Vec<SpatialVec>,
}

impl KinematicsCache {
    /// Pose `X_WB`.
    pub fn pose(&self, body: BodyIndex) -> Option<&Isometry3<f64>> {
        self.poses.get(body.0)
    }

    /// Angular velocity and velocity of the body origin, both in world.
    pub fn spatial_velocity(&self, body: BodyIndex) -> Option<&SpatialVec> {
        self.velocities.get(body.0)
    }

    /// Indexed by body.
    pub fn poses(&self) -> &[Isometry3<f64>] {
        &self.poses
    }
}

impl MultiBody {
    pub fn calc_kinematics(&self, ctx: &Context) -> Result<KinematicsCache> {
        let topology = self.topology("calc_kinematics")?;
        self.check_context(topology, ctx)?;
        trace!(model = %self.name, "calc_kinematics");
        let tree = self.tree_kinematics(topology, &ctx.q, &ctx.v)?;
        let (poses, velocities) = tree
            .into_iter()
            .map(|b| {
                let rot = b.x_wb.rotation;
                let v_w = SpatialVec::new(rot * b.velocity.angular(), rot * b.velocity.linear());
                (b.x_wb, v_w)
            })
            .unzip();
        Ok(KinematicsCache { poses, velocities })
    }

    /// `X_WB` of every body, indexed by body.
    pub fn calc_body_poses_in_world(&self, ctx: &Context) -> Result<Vec<Isometry3<f64>>> {
        Ok(self.calc_kinematics(ctx)?.poses)
    }

    pub fn body_pose_in_world(&self, ctx: &Context, body: BodyIndex) -> Result<Isometry3<f64>> {
        self.topology("body_pose_in_world")?;
        self.check_body(body, "body_pose_in_world")?;
        if body == WORLD_INDEX {
            return Ok(Isometry3::identity());
        }
        Ok(self.calc_kinematics(ctx)?.poses[body.0])
    }

    pub fn body_spatial_velocity_in_world(&self, ctx: &Context, body: BodyIndex) -> Result<SpatialVec> {
        self.topology("body_spatial_velocity_in_world")?;
        self.check_body(body, "body_spatial_velocity_in_world")?;
        self.calc_kinematics(ctx)?
            .velocities
            .get(body.0)
            .copied()
            .ok_or_else(|| MultibodyError::UnknownBody {
                index: body.0,
                context: "body_spatial_velocity_in_world".to_string(),
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::joint::{PrismaticJoint, RevoluteJoint};
    use crate::spatial::SpatialInertia;
    use approx::assert_relative_eq;
    use core::f64::consts::FRAC_PI_2;
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    fn rod() -> SpatialInertia {
        SpatialInertia::point_mass(1.0, Vector3::zeros())
    }

    fn double_pendulum() -> MultiBody {
        let mut mb = MultiBody::new();
        let l1 = mb.add_body("upper", rod()).unwrap();
        let l2 = mb.add_body("lower", rod()).unwrap();
        mb.add_joint(
            "shoulder",
            WORLD_INDEX,
            Isometry3::identity(),
            l1,
            Isometry3::identity(),
            RevoluteJoint::new(Vector3::z()),
        )
        .unwrap();
        mb.add_joint(
            "elbow",
            l1,
            Isometry3::translation(0.0, -1.0, 0.0),
            l2,
            Isometry3::identity(),
            RevoluteJoint::new(Vector3::z()),
        )
        .unwrap();
        mb.lock().unwrap();
        mb
    }

    #[test]
    fn test_chain_poses() {
        let mb = double_pendulum();
        let mut ctx = mb.create_default_context().unwrap();
        ctx.set_positions(&[FRAC_PI_2, 0.0]).unwrap();
        let poses = mb.calc_body_poses_in_world(&ctx).unwrap();
        assert_eq!(poses.len(), 3);
        assert_relative_eq!(poses[0], Isometry3::identity());
        assert_relative_eq!(
            poses[2].translation.vector,
            Vector3::new(1.0, 0.0, 0.0),
            epsilon = 1e-15
        );
        assert_relative_eq!(poses[2].rotation.angle(), FRAC_PI_2, epsilon = 1e-15);
    }

    #[test]
    fn test_chain_velocities() {
        let mb = double_pendulum();
        let mut ctx = mb.create_default_context().unwrap();
        ctx.set_velocities(&[2.0, -0.5]).unwrap();
        let kin = mb.calc_kinematics(&ctx).unwrap();
        let lower = kin.spatial_velocity(BodyIndex(2)).unwrap();
        assert_relative_eq!(lower.angular(), Vector3::new(0.0, 0.0, 1.5), epsilon = 1e-15);
        assert_relative_eq!(lower.linear(), Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-15);
    }

    #[test]
    fn test_offset_joint_frame() {
        // Joint at the top of a link whose body origin is its center.
        let mut mb = MultiBody::new();
        let link = mb.add_body("link", rod()).unwrap();
        mb.add_joint(
            "pin",
            WORLD_INDEX,
            Isometry3::identity(),
            link,
            Isometry3::translation(0.0, 0.5, 0.0),
            RevoluteJoint::new(Vector3::z()),
        )
        .unwrap();
        mb.lock().unwrap();
        let mut ctx = mb.create_default_context().unwrap();
        ctx.set_velocities(&[3.0]).unwrap();
        let pose = mb.body_pose_in_world(&ctx, link).unwrap();
        assert_relative_eq!(pose.translation.vector, Vector3::new(0.0, -0.5, 0.0));
        let vel = mb.body_spatial_velocity_in_world(&ctx, link).unwrap();
        assert_relative_eq!(vel.linear(), Vector3::new(1.5, 0.0, 0.0), epsilon = 1e-15);

        ctx.set_positions(&[FRAC_PI_2]).unwrap();
        let vel = mb.body_spatial_velocity_in_world(&ctx, link).unwrap();
        assert_relative_eq!(vel.linear(), Vector3::new(0.0, 1.5, 0.0), epsilon = 1e-15);
    }

    #[test]
    fn test_free_body_pose_round_trip() {
        let mut mb = MultiBody::new();
        let base = mb.add_body("base", rod()).unwrap();
        let puck = mb.add_body("puck", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
        mb.add_joint(
            "slide",
            WORLD_INDEX,
            Isometry3::identity(),
            base,
            Isometry3::identity(),
            PrismaticJoint::new(Vector3::x()),
        )
        .unwrap();
        mb.lock().unwrap();
        let mut ctx = mb.create_default_context().unwrap();
        let slide = mb.joint_by_name("slide").unwrap().index();
        mb.set_joint_positions(&mut ctx, slide, &[0.4]).unwrap();

        let pose = Isometry3::from_parts(
            Translation3::new(0.1, -2.0, 0.3),
            UnitQuaternion::from_euler_angles(0.2, 0.9, -1.4),
        );
        mb.set_free_body_pose(&mut ctx, puck, &pose).unwrap();
        assert_relative_eq!(
            mb.body_pose_in_world(&ctx, puck).unwrap(),
            pose,
            epsilon = 1e-14
        );

        let v = SpatialVec::new(Vector3::new(0.3, -1.0, 2.0), Vector3::new(4.0, 0.5, -0.2));
        mb.set_free_body_spatial_velocity(&mut ctx, puck, &v).unwrap();
        assert_relative_eq!(
            mb.body_spatial_velocity_in_world(&ctx, puck).unwrap(),
            v,
            epsilon = 1e-14
        );

        let err = mb.set_free_body_pose(&mut ctx, base, &pose).unwrap_err();
        assert!(matches!(err, MultibodyError::NotFreeBody { .. }));
    }

    #[test]
    fn test_requires_lock() {
        let mut mb = MultiBody::new();
        mb.add_body("b", rod()).unwrap();
        assert!(matches!(
            mb.body_pose_in_world(&Context::new(DVector::zeros(0), 0, 0), BodyIndex(1)),
            Err(MultibodyError::PreLock { .. })
        ));
    }
}
