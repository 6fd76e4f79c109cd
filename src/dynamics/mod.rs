//! Equations of motion
//!
//! `M(q) v̇ + C(q, v) = τ_g(q) + τ_u + τ_applied + τ_damping`
//!
//! Mass matrix by composite rigid bodies, bias and gravity terms by
//! recursive Newton-Euler, forward dynamics by the articulated-body
//! recursion in [`aba`].

mod aba;
mod linearize;

pub use linearize::{linearize, LinearSystem};

use nalgebra::{DMatrix, DVector, Matrix6, Vector3};
use tracing::trace;

use crate::error::Result;
use crate::joint::JointModel;
use crate::kinematics::TreeKinematics;
use crate::multi_body::{MultiBody, Topology, WORLD_INDEX};
use crate::spatial::{Real, SpatialVec};
use crate::state::Context;

impl MultiBody {
    pub(crate) fn body_inertias<T: Real>(&self) -> Vec<Matrix6<T>> {
        self.bodies.iter().map(|b| b.inertia.to_matrix().cast()).collect()
    }

    /// Recursive Newton-Euler: generalized forces needed to produce `vdot`
    /// at the kinematic state `tree`, with `gravity` acting on every body.
    pub(crate) fn rnea<T: Real>(
        &self,
        topology: &Topology,
        tree: &TreeKinematics<T>,
        vdot: &DVector<T>,
        gravity: &Vector3<T>,
    ) -> DVector<T> {
        let inertias = self.body_inertias::<T>();
        let mut accel = vec![SpatialVec::zero(); self.bodies.len()];
        let mut force = vec![SpatialVec::zero(); self.bodies.len()];
        accel[WORLD_INDEX.0] = SpatialVec::new(Vector3::zeros(), -gravity);

        for &body in &topology.order {
            let Some(j) = topology.inboard[body.0] else {
                continue;
            };
            let joint = &self.joints[j.0];
            let b = &tree[body.0];
            let vo = topology.v_offsets[j.0];
            let nv = joint.kind.num_velocities();
            let s_vdot = SpatialVec::from_vector(&b.s * vdot.rows(vo, nv));
            let a = b.xform.apply_motion(&accel[joint.parent.0])
                + s_vdot
                + b.bias
                + b.velocity.cross_motion(&b.v_joint);
            let inertia = &inertias[body.0];
            let momentum = SpatialVec::from_vector(inertia * b.velocity.data);
            force[body.0] = SpatialVec::from_vector(inertia * a.data) + b.velocity.cross_force(&momentum);
            accel[body.0] = a;
        }

        let mut tau = DVector::zeros(topology.num_velocities);
        for &body in topology.order.iter().rev() {
            let Some(j) = topology.inboard[body.0] else {
                continue;
            };
            let joint = &self.joints[j.0];
            let b = &tree[body.0];
            let vo = topology.v_offsets[j.0];
            let nv = joint.kind.num_velocities();
            tau.rows_mut(vo, nv).copy_from(&(b.s.transpose() * force[body.0].data));
            if joint.parent != WORLD_INDEX {
                let to_parent = b.xform.inv_apply_force(&force[body.0]);
                force[joint.parent.0] += to_parent;
            }
        }
        tau
    }

    /// Composite-rigid-body mass matrix at the kinematic state `tree`.
    pub(crate) fn crba<T: Real>(&self, topology: &Topology, tree: &TreeKinematics<T>) -> DMatrix<T> {
        let mut composite = self.body_inertias::<T>();
        for &body in topology.order.iter().rev() {
            let Some(j) = topology.inboard[body.0] else {
                continue;
            };
            let parent = self.joints[j.0].parent;
            if parent != WORLD_INDEX {
                let to_parent = tree[body.0].xform.inertia_to_parent(&composite[body.0]);
                composite[parent.0] += to_parent;
            }
        }

        let n = topology.num_velocities;
        let mut mass = DMatrix::zeros(n, n);
        for &body in &topology.order {
            let Some(j) = topology.inboard[body.0] else {
                continue;
            };
            let nv_i = self.joints[j.0].kind.num_velocities();
            if nv_i == 0 {
                continue;
            }
            let vo_i = topology.v_offsets[j.0];
            let mut f = &composite[body.0] * &tree[body.0].s;
            mass.view_mut((vo_i, vo_i), (nv_i, nv_i))
                .copy_from(&(tree[body.0].s.transpose() * &f));

            let mut k = body;
            loop {
                let Some(jk) = topology.inboard[k.0] else {
                    break;
                };
                let parent = self.joints[jk.0].parent;
                if parent == WORLD_INDEX {
                    break;
                }
                f = tree[k.0].xform.to_motion_matrix().transpose() * f;
                k = parent;
                let Some(jp) = topology.inboard[k.0] else {
                    break;
                };
                let nv_k = self.joints[jp.0].kind.num_velocities();
                if nv_k == 0 {
                    continue;
                }
                let vo_k = topology.v_offsets[jp.0];
                let block = tree[k.0].s.transpose() * &f;
                mass.view_mut((vo_k, vo_i), (nv_k, nv_i)).copy_from(&block);
                mass.view_mut((vo_i, vo_k), (nv_i, nv_k))
                    .copy_from(&block.transpose());
            }
        }
        mass
    }

    /// `τ_u + τ_applied + τ_damping`.
    pub(crate) fn total_generalized_forces<T: Real>(
        &self,
        topology: &Topology,
        v: &DVector<T>,
        u: &DVector<T>,
        tau_applied: &DVector<T>,
    ) -> DVector<T> {
        let mut tau = self.actuation_forces(topology, u);
        tau += tau_applied;
        for joint in &self.joints {
            let vo = topology.v_offsets[joint.index.0];
            let nv = joint.kind.num_velocities();
            joint.kind.add_damping_forces(
                &v.as_slice()[vo..vo + nv],
                &mut tau.as_mut_slice()[vo..vo + nv],
            );
        }
        tau
    }

    fn actuation_forces<T: Real>(&self, topology: &Topology, u: &DVector<T>) -> DVector<T> {
        let mut tau = DVector::zeros(topology.num_velocities);
        for (actuator, &uo) in self.actuators.iter().zip(&topology.u_offsets) {
            let vo = topology.v_offsets[actuator.joint.0];
            for (k, &dof) in actuator.dofs.iter().enumerate() {
                tau[vo + dof] += u[uo + k];
            }
        }
        tau
    }

    /// `[q̇; v̇]` at `(q, v, u, τ_applied)`, for any scalar.
    pub(crate) fn time_derivatives<T: Real>(
        &self,
        topology: &Topology,
        q: &DVector<T>,
        v: &DVector<T>,
        u: &DVector<T>,
        tau_applied: &DVector<T>,
    ) -> Result<DVector<T>> {
        let qdot = self.velocity_to_qdot(topology, q, v)?;
        let tau = self.total_generalized_forces(topology, v, u, tau_applied);
        let vdot = self.articulated_body_dynamics(topology, q, v, &tau)?;
        let (nq, nv) = (qdot.len(), vdot.len());
        let mut xdot = DVector::zeros(nq + nv);
        xdot.rows_mut(0, nq).copy_from(&qdot);
        xdot.rows_mut(nq, nv).copy_from(&vdot);
        Ok(xdot)
    }

    /// Mass matrix `M(q)`, symmetric positive definite for a valid model.
    pub fn calc_mass_matrix(&self, ctx: &Context) -> Result<DMatrix<f64>> {
        let topology = self.topology("calc_mass_matrix")?;
        self.check_context(topology, ctx)?;
        trace!(model = %self.name, "calc_mass_matrix");
        let tree = self.tree_kinematics(topology, &ctx.q, &ctx.v)?;
        Ok(self.crba(topology, &tree))
    }

    /// Coriolis, centrifugal and gyroscopic terms `C(q, v)`.
    pub fn calc_bias_term(&self, ctx: &Context) -> Result<DVector<f64>> {
        let topology = self.topology("calc_bias_term")?;
        self.check_context(topology, ctx)?;
        let tree = self.tree_kinematics(topology, &ctx.q, &ctx.v)?;
        let zero = DVector::zeros(topology.num_velocities);
        Ok(self.rnea(topology, &tree, &zero, &Vector3::zeros()))
    }

    /// Gravity generalized forces `τ_g(q)`.
    pub fn calc_gravity_generalized_forces(&self, ctx: &Context) -> Result<DVector<f64>> {
        let topology = self.topology("calc_gravity_generalized_forces")?;
        self.check_context(topology, ctx)?;
        let zero = DVector::zeros(topology.num_velocities);
        let tree = self.tree_kinematics(topology, &ctx.q, &zero)?;
        Ok(-self.rnea(topology, &tree, &zero, &self.config.gravity))
    }

    /// `M v̇ + C − τ_g`: the generalized forces that produce `vdot`.
    pub fn calc_inverse_dynamics(&self, ctx: &Context, vdot: &DVector<f64>) -> Result<DVector<f64>> {
        let topology = self.topology("calc_inverse_dynamics")?;
        self.check_context(topology, ctx)?;
        if vdot.len() != topology.num_velocities {
            return Err(crate::MultibodyError::dimension(
                "generalized accelerations",
                topology.num_velocities,
                vdot.len(),
            ));
        }
        let tree = self.tree_kinematics(topology, &ctx.q, &ctx.v)?;
        Ok(self.rnea(topology, &tree, vdot, &self.config.gravity))
    }

    /// Generalized forces produced by the context's actuation input.
    pub fn calc_actuation_generalized_forces(&self, ctx: &Context) -> Result<DVector<f64>> {
        let topology = self.topology("calc_actuation_generalized_forces")?;
        self.check_context(topology, ctx)?;
        Ok(self.actuation_forces(topology, &ctx.u))
    }

    /// `[q̇; v̇]` at the context's state and inputs.
    pub fn calc_time_derivatives(&self, ctx: &Context) -> Result<DVector<f64>> {
        let topology = self.topology("calc_time_derivatives")?;
        self.check_context(topology, ctx)?;
        trace!(model = %self.name, "calc_time_derivatives");
        self.time_derivatives(topology, &ctx.q, &ctx.v, &ctx.u, &ctx.tau_applied)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::joint::{BallJoint, PrismaticJoint, RevoluteJoint, WeldJoint};
    use crate::spatial::{RotationalInertia, SpatialInertia};
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;

    fn link() -> SpatialInertia {
        SpatialInertia::new(
            1.3,
            Vector3::new(0.1, -0.4, 0.05),
            RotationalInertia::new(0.2, 0.15, 0.1, 0.01, -0.02, 0.005),
        )
    }

    /// Branching tree with every joint kind.
    fn tree_model() -> MultiBody {
        let mut mb = MultiBody::new();
        let cart = mb.add_body("cart", link()).unwrap();
        let arm = mb.add_body("arm", link()).unwrap();
        let tool = mb.add_body("tool", link()).unwrap();
        let head = mb.add_body("head", link()).unwrap();
        mb.add_body("drone", link()).unwrap();
        let rail = mb
            .add_joint(
                "rail",
                WORLD_INDEX,
                Isometry3::translation(0.0, 0.0, 1.0),
                cart,
                Isometry3::identity(),
                PrismaticJoint::new(Vector3::new(1.0, 0.2, 0.0)).with_damping(0.3),
            )
            .unwrap();
        let hinge = mb
            .add_joint(
                "hinge",
                cart,
                Isometry3::new(Vector3::new(0.1, 0.0, 0.2), Vector3::new(0.0, 0.3, 0.0)),
                arm,
                Isometry3::translation(0.0, 0.4, 0.0),
                RevoluteJoint::new(Vector3::new(0.0, 1.0, 1.0)),
            )
            .unwrap();
        mb.add_joint(
            "mount",
            arm,
            Isometry3::translation(0.0, -0.8, 0.0),
            tool,
            Isometry3::identity(),
            WeldJoint::new(),
        )
        .unwrap();
        mb.add_joint(
            "neck",
            cart,
            Isometry3::translation(0.0, 0.0, 0.5),
            head,
            Isometry3::translation(0.0, 0.0, -0.1),
            BallJoint::new(),
        )
        .unwrap();
        mb.add_actuator("rail_motor", rail).unwrap();
        mb.add_actuator("hinge_motor", hinge).unwrap();
        mb.lock().unwrap();
        mb
    }

    fn sample_context(mb: &MultiBody) -> Context {
        let mut ctx = mb.create_default_context().unwrap();
        let neck = mb.joint_by_name("neck").unwrap().index();
        let q = nalgebra::UnitQuaternion::from_euler_angles(0.4, -0.3, 0.8);
        mb.set_joint_positions(&mut ctx, neck, &[q.w, q.i, q.j, q.k]).unwrap();
        let rail = mb.joint_by_name("rail").unwrap().index();
        mb.set_joint_positions(&mut ctx, rail, &[0.35]).unwrap();
        let hinge = mb.joint_by_name("hinge").unwrap().index();
        mb.set_joint_positions(&mut ctx, hinge, &[-0.9]).unwrap();
        let drone = mb.body_by_name("drone").unwrap().index();
        let pose = Isometry3::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.2, -0.1, 0.7));
        mb.set_free_body_pose(&mut ctx, drone, &pose).unwrap();
        let nv = mb.num_velocities().unwrap();
        let v: Vec<f64> = (0..nv).map(|i| 0.7 - 0.23 * i as f64).collect();
        ctx.set_velocities(&v).unwrap();
        ctx.set_actuation(&[1.5, -0.4]).unwrap();
        ctx
    }

    #[test]
    fn test_mass_matrix_is_spd() {
        let mb = tree_model();
        let ctx = sample_context(&mb);
        let m = mb.calc_mass_matrix(&ctx).unwrap();
        assert_eq!(m.nrows(), 1 + 1 + 3 + 6);
        assert_relative_eq!(m.clone(), m.transpose(), epsilon = 5.0 * f64::EPSILON * m.norm());
        assert!(m.cholesky().is_some());
    }

    #[test]
    fn test_mass_matrix_matches_inverse_dynamics() {
        // Column k of M is ID(e_k) with velocity and gravity removed.
        let mb = tree_model();
        let ctx = sample_context(&mb);
        let topology = mb.topology("test").unwrap();
        let zero = DVector::zeros(topology.num_velocities);
        let tree = mb.tree_kinematics::<f64>(topology, &ctx.q, &zero).unwrap();
        let m = mb.calc_mass_matrix(&ctx).unwrap();
        for k in 0..topology.num_velocities {
            let mut e = DVector::zeros(topology.num_velocities);
            e[k] = 1.0;
            let col = mb.rnea(topology, &tree, &e, &Vector3::zeros());
            assert_relative_eq!(col, m.column(k).clone_owned(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inverse_dynamics_decomposition() {
        let mb = tree_model();
        let ctx = sample_context(&mb);
        let nv = mb.num_velocities().unwrap();
        let vdot = DVector::from_iterator(nv, (0..nv).map(|i| 0.1 * i as f64 - 0.3));
        let m = mb.calc_mass_matrix(&ctx).unwrap();
        let c = mb.calc_bias_term(&ctx).unwrap();
        let g = mb.calc_gravity_generalized_forces(&ctx).unwrap();
        let id = mb.calc_inverse_dynamics(&ctx, &vdot).unwrap();
        assert_relative_eq!(id, &m * &vdot + c - g, epsilon = 1e-12);
    }

    #[test]
    fn test_weld_contributes_no_coordinates() {
        let mb = tree_model();
        let mount = mb.joint_by_name("mount").unwrap();
        assert_eq!(mb.joint_velocities(&mb.create_default_context().unwrap(), mount.index()).unwrap().len(), 0);
        assert_eq!(mb.num_positions().unwrap(), 1 + 1 + 4 + 7);
    }

    #[test]
    fn test_actuation_forces() {
        let mb = tree_model();
        let ctx = sample_context(&mb);
        let tau = mb.calc_actuation_generalized_forces(&ctx).unwrap();
        let (_, rail) = mb.joint_offsets(mb.joint_by_name("rail").unwrap().index()).unwrap();
        let (_, hinge) = mb.joint_offsets(mb.joint_by_name("hinge").unwrap().index()).unwrap();
        assert_eq!(tau[rail], 1.5);
        assert_eq!(tau[hinge], -0.4);
        assert_eq!(tau.iter().filter(|t| **t != 0.0).count(), 2);
    }

    #[test]
    fn test_partial_actuator() {
        let mut mb = MultiBody::new();
        let b = mb.add_body("ball", link()).unwrap();
        let j = mb
            .add_joint("socket", WORLD_INDEX, Isometry3::identity(), b, Isometry3::identity(), BallJoint::new())
            .unwrap();
        mb.add_actuator_with_dofs("yaw", j, &[2]).unwrap();
        mb.add_actuator_with_dofs("roll_pitch", j, &[1, 0]).unwrap();
        mb.lock().unwrap();
        assert_eq!(mb.num_actuated_dofs().unwrap(), 3);
        let mut ctx = mb.create_default_context().unwrap();
        ctx.set_actuation(&[3.0, 2.0, 1.0]).unwrap();
        let tau = mb.calc_actuation_generalized_forces(&ctx).unwrap();
        assert_eq!(tau.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_time_derivatives_layout() {
        let mb = tree_model();
        let ctx = sample_context(&mb);
        let xdot = mb.calc_time_derivatives(&ctx).unwrap();
        let nq = mb.num_positions().unwrap();
        let qdot = mb.map_velocity_to_qdot(&ctx, ctx.velocities()).unwrap();
        let vdot = mb.calc_forward_dynamics(&ctx).unwrap();
        assert_eq!(xdot.len(), mb.num_multibody_states().unwrap());
        assert_eq!(xdot.rows(0, nq).clone_owned(), qdot);
        assert_eq!(xdot.rows(nq, vdot.len()).clone_owned(), vdot);
    }
}
