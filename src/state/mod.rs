//! Caller-owned evaluation state.
//!
//! A [`Context`] holds everything that changes between evaluations:
//! generalized positions `q`, generalized velocities `v`, the actuation input
//! `u` and applied generalized forces. The model itself never stores any of
//! these, so one locked model can be evaluated from several threads, each
//! with its own context.

use nalgebra::DVector;

use crate::error::{MultibodyError, Result};

mod mapping;

#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub(crate) q: DVector<f64>,
    pub(crate) v: DVector<f64>,
    pub(crate) u: DVector<f64>,
    pub(crate) tau_applied: DVector<f64>,
}

fn copy_checked(dst: &mut DVector<f64>, src: &[f64], what: &str) -> Result<()> {
    if dst.len() != src.len() {
        return Err(MultibodyError::dimension(what, dst.len(), src.len()));
    }
    dst.copy_from_slice(src);
    Ok(())
}

impl Context {
    pub(crate) fn new(q: DVector<f64>, nv: usize, nu: usize) -> Context {
        Context {
            q,
            v: DVector::zeros(nv),
            u: DVector::zeros(nu),
            tau_applied: DVector::zeros(nv),
        }
    }

    pub fn positions(&self) -> &DVector<f64> {
        &self.q
    }

    pub fn velocities(&self) -> &DVector<f64> {
        &self.v
    }

    pub fn actuation(&self) -> &DVector<f64> {
        &self.u
    }

    pub fn applied_generalized_forces(&self) -> &DVector<f64> {
        &self.tau_applied
    }

    pub fn set_positions(&mut self, q: &[f64]) -> Result<()> {
        copy_checked(&mut self.q, q, "positions")
    }

    pub fn set_velocities(&mut self, v: &[f64]) -> Result<()> {
        copy_checked(&mut self.v, v, "velocities")
    }

    pub fn set_actuation(&mut self, u: &[f64]) -> Result<()> {
        copy_checked(&mut self.u, u, "actuation input")
    }

    pub fn set_applied_generalized_forces(&mut self, tau: &[f64]) -> Result<()> {
        copy_checked(&mut self.tau_applied, tau, "applied generalized forces")
    }

    /// `[q; v]`.
    pub fn state_vector(&self) -> DVector<f64> {
        let nq = self.q.len();
        let mut x = DVector::zeros(nq + self.v.len());
        x.rows_mut(0, nq).copy_from(&self.q);
        x.rows_mut(nq, self.v.len()).copy_from(&self.v);
        x
    }

    pub fn set_state_vector(&mut self, x: &[f64]) -> Result<()> {
        let nq = self.q.len();
        let nv = self.v.len();
        if x.len() != nq + nv {
            return Err(MultibodyError::dimension("state vector", nq + nv, x.len()));
        }
        self.q.copy_from_slice(&x[..nq]);
        self.v.copy_from_slice(&x[nq..]);
        Ok(())
    }
}
