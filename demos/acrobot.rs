use std::f64::consts::FRAC_PI_4;

use multibody::{linearize, MultiBody};
use nalgebra::Vector3;

fn main() {
    let mut acrobot = MultiBody::from_urdf("urdf/acrobot.urdf").unwrap();
    acrobot.set_gravity(Vector3::new(0.0, -9.81, 0.0)).unwrap();
    let elbow = acrobot.joint_by_name("ElbowJoint").unwrap().index();
    acrobot.add_actuator("ElbowMotor", elbow).unwrap();
    acrobot.lock().unwrap();

    let mut ctx = acrobot.create_default_context().unwrap();
    ctx.set_positions(&[FRAC_PI_4, 0.0]).unwrap();

    // semi-implicit Euler
    let dt = 1e-3;
    let nq = acrobot.num_positions().unwrap();
    for step in 0..=2000 {
        let xdot = acrobot.calc_time_derivatives(&ctx).unwrap();
        let v = ctx.velocities() + xdot.rows(nq, ctx.velocities().len()) * dt;
        let q = ctx.positions() + &v * dt;
        ctx.set_velocities(v.as_slice()).unwrap();
        ctx.set_positions(q.as_slice()).unwrap();
        if step % 500 == 0 {
            println!("t = {:.2}s  q = {:?}", step as f64 * dt, q.as_slice());
        }
    }

    // upright equilibrium
    ctx.set_positions(&[std::f64::consts::PI, 0.0]).unwrap();
    ctx.set_velocities(&[0.0, 0.0]).unwrap();
    let sys = linearize(&acrobot, &ctx).unwrap();
    println!("A = {:.4}", sys.a);
    println!("B = {:.4}", sys.b);
}
