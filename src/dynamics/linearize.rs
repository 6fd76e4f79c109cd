//! Linearization of `ẋ = f(x, u)` about an operating point, with
//! `x = [q; v]`.
//!
//! Each column of the Jacobians is one forward-mode pass of the dynamics on
//! dual numbers, seeded along a single state or input coordinate, so the
//! result is exact up to rounding.

use nalgebra::{DMatrix, DVector};
use num_dual::Dual64;
use tracing::debug;

use crate::error::Result;
use crate::multi_body::MultiBody;
use crate::state::Context;

/// `δẋ = A δx + B δu`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    /// `∂f/∂x`, (nq + nv) × (nq + nv).
    pub a: DMatrix<f64>,
    /// `∂f/∂u`, (nq + nv) × nu.
    pub b: DMatrix<f64>,
}

/// Which operating-point coordinate a pass differentiates along.
#[derive(Debug, Clone, Copy)]
enum Seed {
    Position(usize),
    Velocity(usize),
    Input(usize),
}

fn constant(x: &DVector<f64>) -> DVector<Dual64> {
    x.map(|re| Dual64::new(re, 0.0))
}

/// Linearizes the time derivatives of `model` about the state and input in
/// `ctx`. The context is not modified.
pub fn linearize(model: &MultiBody, ctx: &Context) -> Result<LinearSystem> {
    let topology = model.topology("linearize")?;
    model.check_context(topology, ctx)?;
    let (nq, nv, nu) = (ctx.q.len(), ctx.v.len(), ctx.u.len());
    let nx = nq + nv;
    debug!(model = %model.name, states = nx, inputs = nu, "linearizing");

    let tau_applied = constant(&ctx.tau_applied);
    let column = |seed: Seed| -> Result<DVector<f64>> {
        let (mut q, mut v, mut u) = (constant(&ctx.q), constant(&ctx.v), constant(&ctx.u));
        match seed {
            Seed::Position(i) => q[i].eps = 1.0,
            Seed::Velocity(i) => v[i].eps = 1.0,
            Seed::Input(i) => u[i].eps = 1.0,
        }
        let xdot = model.time_derivatives(topology, &q, &v, &u, &tau_applied)?;
        Ok(xdot.map(|d| d.eps))
    };

    let mut a = DMatrix::zeros(nx, nx);
    for i in 0..nq {
        a.set_column(i, &column(Seed::Position(i))?);
    }
    for i in 0..nv {
        a.set_column(nq + i, &column(Seed::Velocity(i))?);
    }
    let mut b = DMatrix::zeros(nx, nu);
    for i in 0..nu {
        b.set_column(i, &column(Seed::Input(i))?);
    }
    Ok(LinearSystem { a, b })
}
