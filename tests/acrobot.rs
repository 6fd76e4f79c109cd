//! Acrobot (two-link underactuated pendulum) against its closed-form
//! equations of motion.

use approx::assert_relative_eq;
use core::f64::consts::PI;
use multibody::{
    Context, MultiBody, RevoluteJoint, RotationalInertia, SpatialInertia, WORLD_INDEX,
};
use nalgebra::{DMatrix, DVector, Isometry3, Matrix2, Vector2, Vector3};

const M1: f64 = 1.0;
const M2: f64 = 1.0;
const L1: f64 = 1.0;
const LC1: f64 = 0.5;
const LC2: f64 = 1.0;
const IC1: f64 = 0.083;
const IC2: f64 = 0.33;
const G: f64 = 9.81;
/// Relative agreement with the closed form; absolute slack scales with the
/// compared quantity's norm.
const TOL: f64 = 5.0 * f64::EPSILON;

/// (θ1, θ2, θ̇1, θ̇2, elbow torque)
const STATES: [[f64; 5]; 4] = [
    [-PI / 5.0, PI / 2.0, 0.5, 1.0, -1.0],
    [PI / 3.0, -PI / 5.0, 0.7, -1.0, 1.0],
    [PI / 4.0, -PI / 3.0, -0.5, 2.0, -1.5],
    [-PI, -PI / 2.0, -1.5, -2.5, 2.0],
];

fn build_acrobot() -> MultiBody {
    let mut mb = MultiBody::new();
    mb.set_gravity(Vector3::new(0.0, -G, 0.0)).unwrap();
    let link1 = mb
        .add_body(
            "Link1",
            SpatialInertia::new(M1, Vector3::new(0.0, -LC1, 0.0), RotationalInertia::diagonal(IC1, 0.0, IC1)),
        )
        .unwrap();
    let link2 = mb
        .add_body(
            "Link2",
            SpatialInertia::new(M2, Vector3::new(0.0, -LC2, 0.0), RotationalInertia::diagonal(IC2, 0.0, IC2)),
        )
        .unwrap();
    mb.add_joint(
        "ShoulderJoint",
        WORLD_INDEX,
        Isometry3::identity(),
        link1,
        Isometry3::identity(),
        RevoluteJoint::new(Vector3::z()),
    )
    .unwrap();
    let elbow = mb
        .add_joint(
            "ElbowJoint",
            link1,
            Isometry3::translation(0.0, -L1, 0.0),
            link2,
            Isometry3::identity(),
            RevoluteJoint::new(Vector3::z()),
        )
        .unwrap();
    mb.add_actuator("ElbowJoint", elbow).unwrap();
    mb.lock().unwrap();
    mb
}

struct ClosedForm {
    mass: Matrix2<f64>,
    bias: Vector2<f64>,
    gravity: Vector2<f64>,
}

fn closed_form(state: &[f64; 5]) -> ClosedForm {
    let [t1, t2, w1, w2, _] = *state;
    let (s1, s2, c2, s12) = (t1.sin(), t2.sin(), t2.cos(), (t1 + t2).sin());
    let m11 = IC1 + IC2 + M1 * LC1 * LC1 + M2 * (L1 * L1 + LC2 * LC2 + 2.0 * L1 * LC2 * c2);
    let m12 = IC2 + M2 * (LC2 * LC2 + L1 * LC2 * c2);
    let m22 = IC2 + M2 * LC2 * LC2;
    let h = M2 * L1 * LC2 * s2;
    ClosedForm {
        mass: Matrix2::new(m11, m12, m12, m22),
        bias: Vector2::new(-2.0 * h * w1 * w2 - h * w2 * w2, h * w1 * w1),
        gravity: Vector2::new(
            -M1 * G * LC1 * s1 - M2 * G * (L1 * s1 + LC2 * s12),
            -M2 * G * LC2 * s12,
        ),
    }
}

fn context_at(mb: &MultiBody, state: &[f64; 5]) -> Context {
    let mut ctx = mb.create_default_context().unwrap();
    ctx.set_positions(&state[..2]).unwrap();
    ctx.set_velocities(&state[2..4]).unwrap();
    ctx.set_actuation(&state[4..]).unwrap();
    ctx
}

fn to_dmatrix(m: &Matrix2<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(2, 2, m.as_slice())
}

#[test]
fn test_counts() {
    let mb = build_acrobot();
    assert_eq!(mb.num_bodies(), 3);
    assert_eq!(mb.num_joints(), 2);
    assert_eq!(mb.num_actuators(), 1);
    assert_eq!(mb.num_actuated_dofs().unwrap(), 1);
    assert_eq!(mb.num_positions().unwrap(), 2);
    assert_eq!(mb.num_velocities().unwrap(), 2);
    assert_eq!(mb.num_multibody_states().unwrap(), 4);
    assert!(mb.has_joint_named("ShoulderJoint"));
    assert!(mb.has_actuator_named("ElbowJoint"));
}

#[test]
fn test_mass_matrix_and_forces() {
    let mb = build_acrobot();
    for state in &STATES {
        let ctx = context_at(&mb, state);
        let expected = closed_form(state);
        let m = mb.calc_mass_matrix(&ctx).unwrap();
        let m_expected = to_dmatrix(&expected.mass);
        assert_relative_eq!(m, m_expected, epsilon = TOL * m_expected.norm(), max_relative = TOL);

        let c = mb.calc_bias_term(&ctx).unwrap();
        let c_expected = DVector::from_column_slice(expected.bias.as_slice());
        assert_relative_eq!(c, c_expected, epsilon = TOL * c_expected.norm(), max_relative = TOL);

        let g = mb.calc_gravity_generalized_forces(&ctx).unwrap();
        let g_expected = DVector::from_column_slice(expected.gravity.as_slice());
        assert_relative_eq!(g, g_expected, epsilon = TOL * g_expected.norm(), max_relative = TOL);
    }
}

#[test]
fn test_time_derivatives() {
    let mb = build_acrobot();
    for state in &STATES {
        let ctx = context_at(&mb, state);
        let expected = closed_form(state);
        let rhs = expected.gravity - expected.bias + Vector2::new(0.0, state[4]);
        let vdot = expected.mass.try_inverse().unwrap() * rhs;

        let xdot = mb.calc_time_derivatives(&ctx).unwrap();
        assert_eq!(xdot.len(), 4);
        assert_eq!(xdot[0], state[2]);
        assert_eq!(xdot[1], state[3]);
        assert_relative_eq!(xdot[2], vdot[0], epsilon = TOL * vdot.norm(), max_relative = TOL);
        assert_relative_eq!(xdot[3], vdot[1], epsilon = TOL * vdot.norm(), max_relative = TOL);
    }
}

#[test]
fn test_urdf_matches_hand_built() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/urdf/acrobot.urdf");
    let mut loaded = MultiBody::from_urdf(path).unwrap();
    loaded.set_gravity(Vector3::new(0.0, -G, 0.0)).unwrap();
    let elbow = loaded.joint_by_name("ElbowJoint").unwrap().index();
    loaded.add_actuator("ElbowJoint", elbow).unwrap();
    loaded.lock().unwrap();

    let built = build_acrobot();
    assert_eq!(loaded.num_bodies(), built.num_bodies());
    assert_eq!(loaded.num_joints(), built.num_joints());
    assert_eq!(loaded.num_positions().unwrap(), built.num_positions().unwrap());
    assert_eq!(loaded.geometry_frame_ids().unwrap().len(), 2);

    for state in &STATES {
        let a = loaded.calc_time_derivatives(&context_at(&loaded, state)).unwrap();
        let b = built.calc_time_derivatives(&context_at(&built, state)).unwrap();
        assert_relative_eq!(a, b, epsilon = TOL * b.norm(), max_relative = TOL);
    }
}
