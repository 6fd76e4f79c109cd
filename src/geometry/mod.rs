//! Geometry export boundary.
//!
//! The model registers itself as a geometry source, bodies get shapes
//! attached before lock, and after lock every moving body that carries
//! geometry is published as one frame with its world pose.

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{Isometry3, Vector3};
use tracing::debug;

use crate::error::{MultibodyError, Result};
use crate::multi_body::{BodyIndex, MultiBody, WORLD_INDEX};
use crate::state::Context;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            pub(crate) fn next() -> Self {
                Self(next_id())
            }

            pub fn value(self) -> u64 {
                self.0
            }
        }
    };
}

identifier!(
    /// Identifies this model as a producer of geometry frames.
    GeometrySourceId
);
identifier!(
    /// Identifies the frame of one moving body.
    FrameId
);
identifier!(
    /// Identifies one registered shape.
    GeometryId
);

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Sphere { radius: f64 },
    Box { size: Vector3<f64> },
    Cylinder { radius: f64, length: f64 },
    Capsule { radius: f64, length: f64 },
    Mesh { filename: String, scale: Vector3<f64> },
}

#[derive(Debug, Clone)]
pub struct GeometryInstance {
    pub id: GeometryId,
    pub body: BodyIndex,
    /// Pose of the shape in its body frame.
    pub pose: Isometry3<f64>,
    pub shape: Shape,
}

/// Frame identifiers published by one source, ordered by body index.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameIdVector {
    source_id: GeometrySourceId,
    ids: Vec<FrameId>,
}

impl FrameIdVector {
    pub(crate) fn new(source_id: GeometrySourceId, ids: Vec<FrameId>) -> Self {
        Self { source_id, ids }
    }

    pub fn source_id(&self) -> GeometrySourceId {
        self.source_id
    }

    pub fn ids(&self) -> &[FrameId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Position of `id` in this vector.
    pub fn index_of(&self, id: FrameId) -> Option<usize> {
        self.ids.iter().position(|f| *f == id)
    }
}

/// World poses parallel to a [`FrameIdVector`].
#[derive(Debug, Clone, PartialEq)]
pub struct FramePoseVector {
    source_id: GeometrySourceId,
    poses: Vec<Isometry3<f64>>,
}

impl FramePoseVector {
    pub(crate) fn new(source_id: GeometrySourceId, poses: Vec<Isometry3<f64>>) -> Self {
        Self { source_id, poses }
    }

    pub fn source_id(&self) -> GeometrySourceId {
        self.source_id
    }

    pub fn poses(&self) -> &[Isometry3<f64>] {
        &self.poses
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Registration state owned by the model.
#[derive(Debug, Clone, Default)]
pub(crate) struct GeometryRegistry {
    pub(crate) source: Option<(GeometrySourceId, String)>,
    pub(crate) geometries: Vec<GeometryInstance>,
    /// Frame of every body, indexed by body; assigned at lock.
    pub(crate) frames: Vec<Option<FrameId>>,
}

impl GeometryRegistry {
    pub(crate) fn source_id(&self) -> Option<GeometrySourceId> {
        self.source.as_ref().map(|(id, _)| *id)
    }

    /// Non-world bodies with at least one shape, ascending.
    pub(crate) fn bodies_with_geometry(&self) -> Vec<BodyIndex> {
        let mut bodies: Vec<BodyIndex> = self
            .geometries
            .iter()
            .map(|g| g.body)
            .filter(|b| *b != WORLD_INDEX)
            .collect();
        bodies.sort();
        bodies.dedup();
        bodies
    }

    pub(crate) fn assign_frames(&self, num_bodies: usize) -> Vec<Option<FrameId>> {
        let mut frames = vec![None; num_bodies];
        if self.source.is_some() {
            for body in self.bodies_with_geometry() {
                frames[body.0] = Some(FrameId::next());
            }
        }
        frames
    }
}


impl MultiBody {
    /// Registers the model as a geometry source. Pre-lock, once.
    pub fn register_as_source(&mut self, name: impl Into<String>) -> Result<GeometrySourceId> {
        self.ensure_open("register_as_source")?;
        if let Some((_, existing)) = &self.geometry.source {
            return Err(MultibodyError::GeometrySourceRegistered {
                name: existing.clone(),
            });
        }
        let name = name.into();
        let id = GeometrySourceId::next();
        debug!(source = %name, id = id.value(), "registered geometry source");
        self.geometry.source = Some((id, name));
        Ok(id)
    }

    pub fn geometry_source_id(&self) -> Option<GeometrySourceId> {
        self.geometry.source_id()
    }

    /// Attaches `shape` to `body` at pose `x_bg`. Shapes on the world body
    /// are anchored and never get a frame.
    pub fn register_geometry(
        &mut self,
        body: BodyIndex,
        x_bg: Isometry3<f64>,
        shape: Shape,
    ) -> Result<GeometryId> {
        self.ensure_open("register_geometry")?;
        if self.geometry.source.is_none() {
            return Err(MultibodyError::NoGeometrySource {
                operation: "register_geometry",
            });
        }
        let body_name = self.check_body(body, "register_geometry")?.name.clone();
        let id = GeometryId::next();
        debug!(body = %body_name, id = id.value(), ?shape, "registered geometry");
        self.geometry.geometries.push(GeometryInstance {
            id,
            body,
            pose: x_bg,
            shape,
        });
        Ok(id)
    }

    /// Counts every registered shape, anchored ones included.
    pub fn num_geometries(&self) -> usize {
        self.geometry.geometries.len()
    }

    pub fn geometries(&self) -> &[GeometryInstance] {
        &self.geometry.geometries
    }

    fn locked_source(&self, operation: &'static str) -> Result<GeometrySourceId> {
        self.topology(operation)?;
        self.geometry
            .source_id()
            .ok_or(MultibodyError::NoGeometrySource { operation })
    }

    /// Frame ids of every moving body with geometry, by ascending body index.
    pub fn geometry_frame_ids(&self) -> Result<FrameIdVector> {
        let source = self.locked_source("geometry_frame_ids")?;
        let ids = self.geometry.frames.iter().flatten().copied().collect();
        Ok(FrameIdVector::new(source, ids))
    }

    /// World poses parallel to [`MultiBody::geometry_frame_ids`].
    pub fn calc_geometry_poses(&self, ctx: &Context) -> Result<FramePoseVector> {
        let source = self.locked_source("calc_geometry_poses")?;
        let kinematics = self.calc_kinematics(ctx)?;
        let poses = self
            .geometry
            .frames
            .iter()
            .zip(kinematics.poses)
            .filter(|(frame, _)| frame.is_some())
            .map(|(_, pose)| pose)
            .collect();
        Ok(FramePoseVector::new(source, poses))
    }

    pub fn body_frame_id(&self, body: BodyIndex) -> Result<FrameId> {
        self.locked_source("body_frame_id")?;
        let b = self.check_body(body, "body_frame_id")?;
        if b.is_world() {
            return Err(MultibodyError::WorldBodyFrame);
        }
        self.geometry.frames[body.0].ok_or_else(|| MultibodyError::NoGeometry {
            body: b.name.clone(),
        })
    }
}
