use nalgebra::Isometry3;

use crate::joint::JointKind;
use crate::spatial::SpatialInertia;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_type!(
    /// Stable handle of a body. Index 0 is the world.
    BodyIndex
);
index_type!(
    /// Stable handle of a joint.
    JointIndex
);
index_type!(
    /// Stable handle of an actuator.
    ActuatorIndex
);

/// The world body's handle.
pub const WORLD_INDEX: BodyIndex = BodyIndex(0);

/// Name of the world body.
pub const WORLD_NAME: &str = "world";

#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) index: BodyIndex,
    pub(crate) name: String,
    pub(crate) inertia: SpatialInertia,
}

impl Body {
    pub fn index(&self) -> BodyIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spatial_inertia(&self) -> &SpatialInertia {
        &self.inertia
    }

    pub fn is_world(&self) -> bool {
        self.index == WORLD_INDEX
    }
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub(crate) index: JointIndex,
    pub(crate) name: String,
    pub(crate) parent: BodyIndex,
    pub(crate) child: BodyIndex,
    /// Pose of the inboard frame F in the parent body.
    pub(crate) x_pf: Isometry3<f64>,
    /// Pose of the outboard frame M in the child body.
    pub(crate) x_bm: Isometry3<f64>,
    pub(crate) kind: JointKind,
    /// Added by `lock()` for a body that had no inboard joint.
    pub(crate) implicit: bool,
}

impl Joint {
    pub fn index(&self) -> JointIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_body(&self) -> BodyIndex {
        self.parent
    }

    pub fn child_body(&self) -> BodyIndex {
        self.child
    }

    pub fn frame_on_parent(&self) -> &Isometry3<f64> {
        &self.x_pf
    }

    pub fn frame_on_child(&self) -> &Isometry3<f64> {
        &self.x_bm
    }

    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }
}

#[derive(Debug, Clone)]
pub struct Actuator {
    pub(crate) index: ActuatorIndex,
    pub(crate) name: String,
    pub(crate) joint: JointIndex,
    /// Local velocity coordinates of the joint, in input order.
    pub(crate) dofs: Vec<usize>,
}

impl Actuator {
    pub fn index(&self) -> ActuatorIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joint(&self) -> JointIndex {
        self.joint
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn num_inputs(&self) -> usize {
        self.dofs.len()
    }
}
