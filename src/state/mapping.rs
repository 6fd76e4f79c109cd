use nalgebra::DVector;

use super::Context;
use crate::error::{MultibodyError, Result};
use crate::joint::JointModel;
use crate::multi_body::{MultiBody, Topology};
use crate::spatial::Real;

impl MultiBody {
    /// `q̇ = N(q) v`; lengths are assumed to match the topology.
    pub(crate) fn velocity_to_qdot<T: Real>(
        &self,
        topology: &Topology,
        q: &DVector<T>,
        v: &DVector<T>,
    ) -> Result<DVector<T>> {
        let mut qdot = DVector::zeros(topology.num_positions);
        for joint in &self.joints {
            let (qo, vo) = (topology.q_offsets[joint.index.0], topology.v_offsets[joint.index.0]);
            let (nq, nv) = (joint.kind.num_positions(), joint.kind.num_velocities());
            joint
                .kind
                .map_velocity_to_qdot(
                    &q.as_slice()[qo..qo + nq],
                    &v.as_slice()[vo..vo + nv],
                    &mut qdot.as_mut_slice()[qo..qo + nq],
                )
                .map_err(|e| e.with_joint(&joint.name))?;
        }
        Ok(qdot)
    }

    /// `q̇ = N(q) v` at the context's positions.
    pub fn map_velocity_to_qdot(&self, ctx: &Context, v: &DVector<f64>) -> Result<DVector<f64>> {
        let topology = self.topology("map_velocity_to_qdot")?;
        self.check_context(topology, ctx)?;
        if v.len() != topology.num_velocities {
            return Err(MultibodyError::dimension(
                "generalized velocities",
                topology.num_velocities,
                v.len(),
            ));
        }
        self.velocity_to_qdot(topology, &ctx.q, v)
    }

    /// `v = N⁺(q) q̇` at the context's positions.
    ///
    /// For quaternion joints the component of `q̇` along the quaternion
    /// itself is discarded.
    pub fn map_qdot_to_velocity(&self, ctx: &Context, qdot: &DVector<f64>) -> Result<DVector<f64>> {
        let topology = self.topology("map_qdot_to_velocity")?;
        self.check_context(topology, ctx)?;
        if qdot.len() != topology.num_positions {
            return Err(MultibodyError::dimension(
                "position time derivatives",
                topology.num_positions,
                qdot.len(),
            ));
        }
        let mut v = DVector::zeros(topology.num_velocities);
        for joint in &self.joints {
            let (qo, vo) = (topology.q_offsets[joint.index.0], topology.v_offsets[joint.index.0]);
            let (nq, nv) = (joint.kind.num_positions(), joint.kind.num_velocities());
            joint
                .kind
                .map_qdot_to_velocity(
                    &ctx.q.as_slice()[qo..qo + nq],
                    &qdot.as_slice()[qo..qo + nq],
                    &mut v.as_mut_slice()[vo..vo + nv],
                )
                .map_err(|e| e.with_joint(&joint.name))?;
        }
        Ok(v)
    }
}
