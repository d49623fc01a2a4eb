//! # Collaborator Interfaces
//!
//! Everything the streaming world asks of the surrounding engine: physics
//! ray casts, mesh submission, instanced foliage rendering, navigation
//! rebuilds, path queries and actor possession.
//!
//! The world never renders, simulates physics or path-finds itself. Headless
//! implementations for tests and tools live in `backends` and
//! `foliage::instances`.

use serde::{Deserialize, Serialize};
use terragen_procedural::TileMesh;
use terragen_shared::{Aabb, Transform, Vec3};

/// Identity of a hit-testable component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// The streamed terrain mesh.
    pub const TERRAIN: Self = Self(1);
    /// The sea plane.
    pub const SEA: Self = Self(2);
}

/// Physical surface type reported by a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceType(pub u8);

/// Components a trace must pass through.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceFilter {
    /// Ignored components.
    pub ignored: Vec<ComponentId>,
}

impl TraceFilter {
    /// Filter that hits everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component to ignore.
    #[must_use]
    pub fn ignoring(mut self, component: ComponentId) -> Self {
        self.ignored.push(component);
        self
    }

    /// Whether `component` may be hit.
    #[inline]
    #[must_use]
    pub fn accepts(&self, component: ComponentId) -> bool {
        !self.ignored.contains(&component)
    }
}

/// Result of a successful ray cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceHit {
    /// Impact point.
    pub location: Vec3,
    /// Unit surface normal at the impact.
    pub normal: Vec3,
    /// What was hit.
    pub component: ComponentId,
    /// Physical surface, if the backend reports one.
    pub surface: Option<SurfaceType>,
}

impl TraceHit {
    /// Angle between the impact normal and world up, in degrees.
    #[inline]
    #[must_use]
    pub fn slope_degrees(&self) -> f32 {
        self.normal.slope_degrees()
    }
}

/// Physics ray-cast oracle.
pub trait RayCaster {
    /// First blocking hit on the segment `start -> end`.
    fn trace(&self, start: Vec3, end: Vec3, filter: &TraceFilter) -> Option<TraceHit>;
}

/// Mesh-section slot in the rendering backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshSectionId(pub u32);

/// Mesh submission backend.
pub trait MeshBackend {
    /// Uploads `mesh` into section `id`, replacing whatever was there.
    fn create_section(&mut self, id: MeshSectionId, mesh: &TileMesh, collision: bool);

    /// Empties section `id`.
    fn clear_section(&mut self, id: MeshSectionId);

    /// Vertices currently held by section `id`.
    fn section_vertices(&self, id: MeshSectionId) -> Option<&[Vec3]>;
}

/// Handle of one foliage instance inside its species' backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u32);

/// Instanced-rendering backend, one per species.
pub trait InstanceBackend {
    /// Adds an instance.
    fn add_instance(&mut self, transform: Transform) -> InstanceId;

    /// Instances whose position lies inside `bounds`.
    fn instances_overlapping(&self, bounds: &Aabb) -> Vec<InstanceId>;

    /// Removes instances in one batch. Unknown ids are ignored.
    fn remove_instances(&mut self, ids: &[InstanceId]);

    /// Transform of a live instance.
    fn instance_transform(&self, id: InstanceId) -> Option<Transform>;

    /// Replaces a live instance's transform. Returns false for unknown ids.
    fn update_instance_transform(&mut self, id: InstanceId, transform: Transform) -> bool;

    /// All live instance ids.
    fn instance_ids(&self) -> Vec<InstanceId>;

    /// Number of live instances.
    fn instance_count(&self) -> usize;
}

/// Navigation-mesh rebuild service.
pub trait NavigationRebuilder {
    /// Requests a rebuild. Fire and forget.
    fn rebuild(&mut self);
}

/// Path-validity oracle.
pub trait PathOracle {
    /// Whether an agent can walk from `start` to `goal`.
    fn is_reachable(&self, start: Vec3, goal: Vec3) -> bool;
}

/// Handle of a spawned actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActorHandle(pub u64);

/// Player possession.
pub trait Possession {
    /// Hands player control to `actor`.
    fn possess(&mut self, actor: ActorHandle);
}

/// Navigation rebuilder that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNavigation;

impl NavigationRebuilder for NoNavigation {
    fn rebuild(&mut self) {}
}

/// Path oracle that accepts every path.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenTerrain;

impl PathOracle for OpenTerrain {
    fn is_reachable(&self, _start: Vec3, _goal: Vec3) -> bool {
        true
    }
}
