//! # Headless Backends
//!
//! Collaborator implementations that need no engine: an analytic ray
//! caster over the height field and an in-memory mesh-section store. Used
//! by tests, benches and tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use terragen_procedural::{HeightField, TileMesh};
use terragen_shared::{Vec2, Vec3};

use crate::collaborators::{
    ComponentId, MeshBackend, MeshSectionId, RayCaster, SurfaceType, TraceFilter, TraceHit,
};

/// March steps used for non-vertical segments.
const MARCH_STEPS: u32 = 64;

/// Bisection refinements after a march step brackets the surface.
const REFINE_STEPS: u32 = 24;

/// Ray caster that hits the analytic terrain surface and, optionally, a
/// flat sea plane.
#[derive(Clone, Debug)]
pub struct HeightFieldTracer {
    field: Arc<HeightField>,
    surface: Option<SurfaceType>,
    sea_level: Option<f32>,
}

impl HeightFieldTracer {
    /// Tracer over `field` with no sea and no surface type.
    #[must_use]
    pub fn new(field: Arc<HeightField>) -> Self {
        Self {
            field,
            surface: None,
            sea_level: None,
        }
    }

    /// Reports `surface` on terrain hits.
    #[must_use]
    pub fn with_surface(mut self, surface: SurfaceType) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Adds a sea plane at `level`.
    #[must_use]
    pub fn with_sea(mut self, level: f32) -> Self {
        self.sea_level = Some(level);
        self
    }

    /// Underlying height field.
    #[must_use]
    pub fn field(&self) -> &Arc<HeightField> {
        &self.field
    }

    fn terrain_hit(&self, start: Vec3, end: Vec3) -> Option<(f32, Vec3)> {
        let gap = |t: f32| {
            let p = lerp(start, end, t);
            p.z - self.field.height(p.xy())
        };

        if start.x == end.x && start.y == end.y {
            let ground = self.field.height(start.xy());
            let (low, high) = (start.z.min(end.z), start.z.max(end.z));
            if ground < low || ground > high {
                return None;
            }
            let t = if end.z == start.z { 0.0 } else { (ground - start.z) / (end.z - start.z) };
            return Some((t, Vec3::from_xy(start.xy(), ground)));
        }

        let mut prev_t = 0.0;
        let mut prev_gap = gap(0.0);
        if prev_gap == 0.0 {
            return Some((0.0, start));
        }
        for step in 1..=MARCH_STEPS {
            let t = step as f32 / MARCH_STEPS as f32;
            let g = gap(t);
            if g == 0.0 || g.signum() != prev_gap.signum() {
                let (mut lo, mut hi) = (prev_t, t);
                for _ in 0..REFINE_STEPS {
                    let mid = 0.5 * (lo + hi);
                    if gap(mid).signum() == prev_gap.signum() {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                let p = lerp(start, end, hi);
                return Some((hi, Vec3::from_xy(p.xy(), self.field.height(p.xy()))));
            }
            prev_t = t;
            prev_gap = g;
        }
        None
    }

    fn sea_hit(&self, start: Vec3, end: Vec3) -> Option<(f32, Vec3)> {
        let level = self.sea_level?;
        if start.z == end.z {
            return None;
        }
        let t = (level - start.z) / (end.z - start.z);
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        Some((t, lerp(start, end, t)))
    }
}

impl RayCaster for HeightFieldTracer {
    fn trace(&self, start: Vec3, end: Vec3, filter: &TraceFilter) -> Option<TraceHit> {
        let terrain = filter
            .accepts(ComponentId::TERRAIN)
            .then(|| self.terrain_hit(start, end))
            .flatten()
            .map(|(t, location)| {
                (
                    t,
                    TraceHit {
                        location,
                        normal: self.field.normal_at(location.xy()),
                        component: ComponentId::TERRAIN,
                        surface: self.surface,
                    },
                )
            });
        let sea = filter
            .accepts(ComponentId::SEA)
            .then(|| self.sea_hit(start, end))
            .flatten()
            .map(|(t, location)| {
                (
                    t,
                    TraceHit {
                        location,
                        normal: Vec3::UP,
                        component: ComponentId::SEA,
                        surface: None,
                    },
                )
            });

        match (terrain, sea) {
            (Some(a), Some(b)) => Some(if b.0 < a.0 { b.1 } else { a.1 }),
            (a, b) => a.or(b).map(|(_, hit)| hit),
        }
    }
}

fn lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

#[derive(Clone, Debug)]
struct SectionRecord {
    mesh: TileMesh,
    collision: bool,
}

/// In-memory mesh-section store.
#[derive(Clone, Debug, Default)]
pub struct MeshSections {
    sections: BTreeMap<MeshSectionId, SectionRecord>,
    created: u64,
    cleared: u64,
}

impl MeshSections {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh held by section `id`.
    #[must_use]
    pub fn mesh(&self, id: MeshSectionId) -> Option<&TileMesh> {
        self.sections.get(&id).map(|r| &r.mesh)
    }

    /// Whether section `id` has collision enabled.
    #[must_use]
    pub fn has_collision(&self, id: MeshSectionId) -> bool {
        self.sections.get(&id).is_some_and(|r| r.collision)
    }

    /// Non-empty section ids.
    pub fn ids(&self) -> impl Iterator<Item = MeshSectionId> + '_ {
        self.sections.keys().copied()
    }

    /// Number of non-empty sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether every section is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections created so far.
    #[must_use]
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Sections cleared so far.
    #[must_use]
    pub fn cleared(&self) -> u64 {
        self.cleared
    }

    /// First section whose footprint contains `location`.
    #[must_use]
    pub fn footprint_contains(&self, location: Vec2) -> Option<MeshSectionId> {
        self.sections.iter().find_map(|(id, record)| {
            let first = record.mesh.vertices.first()?;
            let last = record.mesh.vertices.last()?;
            let inside = (first.x..=last.x).contains(&location.x) && (first.y..=last.y).contains(&location.y);
            inside.then_some(*id)
        })
    }
}

impl MeshBackend for MeshSections {
    fn create_section(&mut self, id: MeshSectionId, mesh: &TileMesh, collision: bool) {
        self.created += 1;
        self.sections.insert(
            id,
            SectionRecord {
                mesh: mesh.clone(),
                collision,
            },
        );
    }

    fn clear_section(&mut self, id: MeshSectionId) {
        if self.sections.remove(&id).is_some() {
            self.cleared += 1;
        } else {
            tracing::warn!("Cleared empty mesh section {}", id.0);
        }
    }

    fn section_vertices(&self, id: MeshSectionId) -> Option<&[Vec3]> {
        self.sections.get(&id).map(|r| r.mesh.vertices.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terragen_procedural::{FlatZone, HeightFieldParams, TileMeshBuilder};
    use terragen_shared::GridCoord;

    fn field() -> Arc<HeightField> {
        Arc::new(HeightField::new(HeightFieldParams::default(), FlatZone::default()))
    }

    #[test]
    fn test_vertical_trace_hits_surface() {
        let tracer = HeightFieldTracer::new(field());
        let filter = TraceFilter::new();
        let hit = tracer
            .trace(Vec3::new(0.0, 0.0, 1000.0), Vec3::new(0.0, 0.0, -1000.0), &filter)
            .expect("flat zone");
        assert_eq!(hit.location, Vec3::new(0.0, 0.0, 250.0));
        assert_eq!(hit.component, ComponentId::TERRAIN);
        assert!(hit.slope_degrees() < 1e-3);
    }

    #[test]
    fn test_trace_misses_outside_segment() {
        let tracer = HeightFieldTracer::new(field());
        let filter = TraceFilter::new();
        assert!(tracer.trace(Vec3::new(0.0, 0.0, 1500.0), Vec3::new(0.0, 0.0, 500.0), &filter).is_none());
    }

    #[test]
    fn test_sea_above_terrain_wins() {
        let tracer = HeightFieldTracer::new(field()).with_sea(400.0);
        let start = Vec3::new(10.0, 10.0, 1000.0);
        let end = Vec3::new(10.0, 10.0, -1000.0);

        let hit = tracer.trace(start, end, &TraceFilter::new()).expect("hit");
        assert_eq!(hit.component, ComponentId::SEA);
        assert_eq!(hit.location.z, 400.0);

        let filter = TraceFilter::new().ignoring(ComponentId::SEA);
        let hit = tracer.trace(start, end, &filter).expect("hit");
        assert_eq!(hit.component, ComponentId::TERRAIN);
    }

    #[test]
    fn test_slanted_trace_finds_ground() {
        let tracer = HeightFieldTracer::new(field());
        let hit = tracer
            .trace(Vec3::new(-500.0, 0.0, 1000.0), Vec3::new(500.0, 0.0, -1000.0), &TraceFilter::new())
            .expect("hit");
        assert!((hit.location.z - 250.0).abs() < 1e-3);
        assert!((hit.location.x + 125.0).abs() < 1.0);
    }

    #[test]
    fn test_mesh_sections_lifecycle() {
        let builder = TileMeshBuilder::new(6, 6, 100.0).expect("builder");
        let mesh = builder.build(&field(), GridCoord::new(1, 0), 1);
        let mut sections = MeshSections::new();
        let id = MeshSectionId(3);

        sections.create_section(id, &mesh, true);
        assert_eq!(sections.section_vertices(id).map(<[Vec3]>::len), Some(mesh.vertex_count()));
        assert!(sections.has_collision(id));
        assert_eq!(sections.footprint_contains(Vec2::new(750.0, 250.0)), Some(id));
        assert_eq!(sections.footprint_contains(Vec2::new(250.0, 250.0)), None);

        sections.clear_section(id);
        assert!(sections.section_vertices(id).is_none());
        assert_eq!((sections.created(), sections.cleared()), (1, 1));
    }
}
