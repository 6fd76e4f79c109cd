//! Error types for building and evaluating a multibody model.

use thiserror::Error;

/// Kind of named element, used in lookup and duplicate-name errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Body,
    Joint,
    Actuator,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Body => write!(f, "body"),
            ElementKind::Joint => write!(f, "joint"),
            ElementKind::Actuator => write!(f, "actuator"),
        }
    }
}

/// Coarse classification of a [`MultibodyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Operation called in the wrong lifecycle stage.
    LockState,
    /// Name lookup found nothing.
    UnknownName,
    /// Typed joint lookup matched a joint of another kind.
    KindMismatch,
    /// The requested topology or argument shape is invalid.
    Structural,
    /// Geometry export misuse.
    Geometry,
    /// A numerical evaluation failed.
    Numerical,
    /// A model description could not be parsed.
    Parse,
}

/// Errors that can occur while building or evaluating a multibody model.
#[derive(Debug, Error)]
pub enum MultibodyError {
    #[error("post-lock calls to '{operation}' are not allowed; calls to this method must happen before lock()")]
    PostLock {
        operation: &'static str,
    },

    #[error("pre-lock calls to '{operation}' are not allowed; you must call lock() first")]
    PreLock {
        operation: &'static str,
    },

    #[error("there is no {element} named '{name}' in the model")]
    UnknownName {
        element: ElementKind,
        name: String,
    },

    #[error("joint '{name}' is a {actual} joint, not a {expected} joint")]
    KindMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("a {element} named '{name}' already exists")]
    DuplicateName {
        element: ElementKind,
        name: String,
    },

    #[error("{context}: body index {index} does not exist")]
    UnknownBody {
        index: usize,
        context: String,
    },

    #[error("joint '{joint}': {message}")]
    InvalidJointParameters {
        joint: String,
        message: String,
    },

    #[error("{context}: joint index {index} does not exist")]
    UnknownJoint {
        index: usize,
        context: String,
    },

    #[error("{context}: actuator index {index} does not exist")]
    UnknownActuator {
        index: usize,
        context: String,
    },

    #[error("joint '{joint}': body '{body}' already has inboard joint '{existing}'")]
    InboardJointExists {
        joint: String,
        body: String,
        existing: String,
    },

    #[error("joint '{joint}': the world body cannot be the child of a joint")]
    WorldAsChild {
        joint: String,
    },

    #[error("joint '{joint}': parent and child are the same body '{body}'")]
    SelfLoop {
        joint: String,
        body: String,
    },

    /// Bodies that cannot be reached from the world.
    #[error("topology contains a closed loop through body '{body}'")]
    Cycle {
        body: String,
    },

    #[error("actuator '{actuator}': {message}")]
    InvalidActuatorDofs {
        actuator: String,
        message: String,
    },

    #[error("actuator '{actuator}': coordinate {dof} of joint '{joint}' is already driven by '{existing}'")]
    DofAlreadyActuated {
        actuator: String,
        joint: String,
        dof: usize,
        existing: String,
    },

    #[error("body '{body}': invalid spatial inertia: {message}")]
    InvalidInertia {
        body: String,
        message: String,
    },

    #[error("{what}: expected length {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration '{field}': {message}")]
    InvalidConfig {
        field: &'static str,
        message: String,
    },

    /// Free-body helpers used on a body not mobilized by a free joint.
    #[error("body '{body}' is not a free body")]
    NotFreeBody {
        body: String,
    },

    #[error("joint '{joint}': unsupported joint type '{kind}'")]
    UnsupportedJointType {
        joint: String,
        kind: String,
    },

    /// `register_as_source` called a second time.
    #[error("model is already registered as geometry source '{name}'")]
    GeometrySourceRegistered {
        name: String,
    },

    #[error("'{operation}' requires the model to be registered as a geometry source")]
    NoGeometrySource {
        operation: &'static str,
    },

    #[error("the world body does not have a geometry frame")]
    WorldBodyFrame,

    #[error("body '{body}' does not have geometry registered with it")]
    NoGeometry {
        body: String,
    },

    /// Cholesky factorization failed or the system is ill-conditioned.
    #[error("mass matrix is singular or ill-conditioned at joint '{joint}' (condition estimate {condition:e})")]
    SingularMassMatrix {
        joint: String,
        /// Condition estimate; infinite when factorization failed.
        condition: f64,
    },

    #[error("joint '{joint}': quaternion coordinates have zero norm")]
    DegenerateQuaternion {
        joint: String,
    },

    #[error("URDF error: {0}")]
    Urdf(#[from] urdf_rs::UrdfError),
}

impl MultibodyError {
    /// Which class of failure this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        use MultibodyError::*;
        match self {
            PostLock { .. } | PreLock { .. } => ErrorCategory::LockState,
            UnknownName { .. } => ErrorCategory::UnknownName,
            KindMismatch { .. } => ErrorCategory::KindMismatch,
            DuplicateName { .. }
            | UnknownBody { .. }
            | UnknownJoint { .. }
            | UnknownActuator { .. }
            | InvalidJointParameters { .. }
            | InboardJointExists { .. }
            | WorldAsChild { .. }
            | SelfLoop { .. }
            | Cycle { .. }
            | InvalidActuatorDofs { .. }
            | DofAlreadyActuated { .. }
            | InvalidInertia { .. }
            | DimensionMismatch { .. }
            | NotFreeBody { .. }
            | InvalidConfig { .. }
            | UnsupportedJointType { .. }
            | GeometrySourceRegistered { .. } => ErrorCategory::Structural,
            NoGeometrySource { .. } | WorldBodyFrame | NoGeometry { .. } => {
                ErrorCategory::Geometry
            }
            SingularMassMatrix { .. } | DegenerateQuaternion { .. } => ErrorCategory::Numerical,
            Urdf(_) => ErrorCategory::Parse,
        }
    }

    pub(crate) fn unknown_name(element: ElementKind, name: impl Into<String>) -> Self {
        Self::UnknownName {
            element,
            name: name.into(),
        }
    }

    pub(crate) fn dimension(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

/// Result type for multibody operations.
pub type Result<T> = std::result::Result<T, MultibodyError>;
