//! Articulated-body forward dynamics.

use nalgebra::{DMatrix, DVector, Matrix6, Matrix6xX, Vector3};
use tracing::{trace, warn};

use crate::error::{MultibodyError, Result};
use crate::joint::JointModel;
use crate::multi_body::{Joint, MultiBody, Topology, WORLD_INDEX};
use crate::spatial::{Real, SpatialVec};
use crate::state::Context;

/// Per-body terms of the inward pass.
struct Articulated<T: Real> {
    u_mat: Matrix6xX<T>,
    d_inv: DMatrix<T>,
    u: DVector<T>,
    c: SpatialVec<T>,
}

impl MultiBody {
    /// Checks the conditioning of a joint-space articulated inertia and
    /// inverts it through its Cholesky factor.
    fn invert_articulated<T: Real>(&self, joint: &Joint, d: DMatrix<T>) -> Result<DMatrix<T>> {
        let eigenvalues = d.map(|x| x.value()).symmetric_eigenvalues();
        let (min, max) = (eigenvalues.min(), eigenvalues.max());
        let condition = if min > 0.0 { max / min } else { f64::INFINITY };
        let singular = |condition: f64| {
            warn!(joint = %joint.name, condition, "articulated inertia is singular");
            MultibodyError::SingularMassMatrix {
                joint: joint.name.clone(),
                condition,
            }
        };
        if !(condition <= self.config.max_condition_number) {
            return Err(singular(condition));
        }
        d.cholesky()
            .map(|chol| chol.inverse())
            .ok_or_else(|| singular(f64::INFINITY))
    }

    /// Articulated-body recursion: `v̇` at `(q, v)` under the total
    /// generalized force `tau` and the model's gravity.
    pub(crate) fn articulated_body_dynamics<T: Real>(
        &self,
        topology: &Topology,
        q: &DVector<T>,
        v: &DVector<T>,
        tau: &DVector<T>,
    ) -> Result<DVector<T>> {
        let tree = self.tree_kinematics(topology, q, v)?;

        let mut inertia: Vec<Matrix6<T>> = self.body_inertias();
        let mut bias_force: Vec<SpatialVec<T>> = tree
            .iter()
            .zip(&inertia)
            .map(|(b, i)| b.velocity.cross_force(&SpatialVec::from_vector(i * b.velocity.data)))
            .collect();
        let mut terms: Vec<Option<Articulated<T>>> = (0..self.bodies.len()).map(|_| None).collect();

        for &body in topology.order.iter().rev() {
            let Some(j) = topology.inboard[body.0] else {
                continue;
            };
            let joint = &self.joints[j.0];
            let b = &tree[body.0];
            let c = b.bias + b.velocity.cross_motion(&b.v_joint);
            let vo = topology.v_offsets[j.0];
            let nv = joint.kind.num_velocities();

            let u_mat = &inertia[body.0] * &b.s;
            let d = b.s.transpose() * &u_mat;
            let u = tau.rows(vo, nv).clone_owned() - b.s.transpose() * bias_force[body.0].data;
            let d_inv = if nv == 0 {
                DMatrix::zeros(0, 0)
            } else {
                self.invert_articulated(joint, d)?
            };

            if joint.parent != WORLD_INDEX {
                let projected = &u_mat * &d_inv;
                let i_a = inertia[body.0] - &projected * u_mat.transpose();
                let p_a = bias_force[body.0].data
                    + i_a * c.data
                    + &projected * &u;
                let to_parent_inertia = b.xform.inertia_to_parent(&i_a);
                let to_parent_force = b.xform.inv_apply_force(&SpatialVec::from_vector(p_a));
                inertia[joint.parent.0] += to_parent_inertia;
                bias_force[joint.parent.0] += to_parent_force;
            }
            terms[body.0] = Some(Articulated { u_mat, d_inv, u, c });
        }

        let gravity: Vector3<T> = self.config.gravity.cast();
        let mut accel = vec![SpatialVec::zero(); self.bodies.len()];
        accel[WORLD_INDEX.0] = SpatialVec::new(Vector3::zeros(), -gravity);
        let mut vdot = DVector::zeros(topology.num_velocities);
        for &body in &topology.order {
            let (Some(j), Some(t)) = (topology.inboard[body.0], terms[body.0].as_ref()) else {
                continue;
            };
            let joint = &self.joints[j.0];
            let b = &tree[body.0];
            let a_prime = b.xform.apply_motion(&accel[joint.parent.0]) + t.c;
            let qdd = &t.d_inv * (&t.u - t.u_mat.transpose() * a_prime.data);
            accel[body.0] = a_prime + SpatialVec::from_vector(&b.s * &qdd);
            let vo = topology.v_offsets[j.0];
            vdot.rows_mut(vo, qdd.len()).copy_from(&qdd);
        }
        Ok(vdot)
    }

    /// `v̇` at the context's state and inputs.
    pub fn calc_forward_dynamics(&self, ctx: &Context) -> Result<DVector<f64>> {
        let topology = self.topology("calc_forward_dynamics")?;
        self.check_context(topology, ctx)?;
        trace!(model = %self.name, "calc_forward_dynamics");
        let tau = self.total_generalized_forces(topology, &ctx.v, &ctx.u, &ctx.tau_applied);
        self.articulated_body_dynamics(topology, &ctx.q, &ctx.v, &tau)
    }
}
