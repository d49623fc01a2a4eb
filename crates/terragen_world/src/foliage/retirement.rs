//! # Foliage Retirement
//!
//! When a tile leaves the world its foliage must go with it. Removal is
//! split in two:
//!
//! 1. `mark_region`: query every species for instances inside the tile's
//!    box and remember their ids.
//! 2. `flush`: one batch removal per species, once per tick.
//!
//! Several overlapping retirements in one tick collapse into one batch, and
//! an id marked twice is removed once.

use std::collections::{BTreeMap, BTreeSet};

use terragen_shared::{Aabb, Vec3};

use crate::collaborators::{InstanceBackend, InstanceId};

/// Box covering a tile's foliage.
///
/// Spans the first and last vertex on X/Y and `±vertical_extent` on Z.
/// `None` for an empty vertex buffer.
#[must_use]
pub fn tile_retirement_bounds(vertices: &[Vec3], vertical_extent: f32) -> Option<Aabb> {
    let first = vertices.first()?;
    let last = vertices.last()?;
    Some(Aabb::from_corners(
        Vec3::new(first.x, first.y, -vertical_extent),
        Vec3::new(last.x, last.y, vertical_extent),
    ))
}

/// Instance ids pending removal, per species.
#[derive(Debug, Default)]
pub struct RetirementPool {
    pending: BTreeMap<usize, BTreeSet<InstanceId>>,
}

impl RetirementPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every instance inside `bounds`. Returns how many ids were
    /// newly marked.
    pub fn mark_region(&mut self, bounds: &Aabb, pools: &[Box<dyn InstanceBackend>]) -> usize {
        let mut marked = 0;
        for (species, pool) in pools.iter().enumerate() {
            let ids = pool.instances_overlapping(bounds);
            if ids.is_empty() {
                continue;
            }
            let entry = self.pending.entry(species).or_default();
            for id in ids {
                if entry.insert(id) {
                    marked += 1;
                }
            }
        }
        marked
    }

    /// Number of ids waiting for removal.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(BTreeSet::len).sum()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.values().all(BTreeSet::is_empty)
    }

    /// Removes everything marked, one batch per species. Returns the number
    /// of ids submitted for removal.
    pub fn flush(&mut self, pools: &mut [Box<dyn InstanceBackend>]) -> usize {
        let mut removed = 0;
        for (species, ids) in std::mem::take(&mut self.pending) {
            if ids.is_empty() {
                continue;
            }
            let Some(pool) = pools.get_mut(species) else {
                tracing::warn!("Retirement for unknown species {} dropped", species);
                continue;
            };
            let ids: Vec<InstanceId> = ids.into_iter().collect();
            removed += ids.len();
            pool.remove_instances(&ids);
        }
        if removed > 0 {
            tracing::debug!("Retired {} foliage instances", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foliage::instances::InstanceBuffer;
    use std::cell::RefCell;
    use std::rc::Rc;
    use terragen_shared::Transform;

    /// Counts batch removals.
    struct CountingPool {
        inner: InstanceBuffer,
        batches: Rc<RefCell<usize>>,
    }

    impl InstanceBackend for CountingPool {
        fn add_instance(&mut self, transform: Transform) -> InstanceId {
            self.inner.add_instance(transform)
        }
        fn instances_overlapping(&self, bounds: &Aabb) -> Vec<InstanceId> {
            self.inner.instances_overlapping(bounds)
        }
        fn remove_instances(&mut self, ids: &[InstanceId]) {
            *self.batches.borrow_mut() += 1;
            self.inner.remove_instances(ids);
        }
        fn instance_transform(&self, id: InstanceId) -> Option<Transform> {
            self.inner.instance_transform(id)
        }
        fn update_instance_transform(&mut self, id: InstanceId, transform: Transform) -> bool {
            self.inner.update_instance_transform(id, transform)
        }
        fn instance_ids(&self) -> Vec<InstanceId> {
            self.inner.instance_ids()
        }
        fn instance_count(&self) -> usize {
            self.inner.instance_count()
        }
    }

    fn at(x: f32, y: f32, z: f32) -> Transform {
        Transform::from_position(Vec3::new(x, y, z))
    }

    #[test]
    fn test_bounds_from_first_and_last_vertex() {
        let vertices = [Vec3::new(0.0, 0.0, 5.0), Vec3::new(50.0, 0.0, 7.0), Vec3::new(100.0, 100.0, 3.0)];
        let bounds = tile_retirement_bounds(&vertices, 6000.0).expect("non-empty");
        assert_eq!(bounds.min, Vec3::new(0.0, 0.0, -6000.0));
        assert_eq!(bounds.max, Vec3::new(100.0, 100.0, 6000.0));
        assert!(tile_retirement_bounds(&[], 1.0).is_none());
    }

    #[test]
    fn test_retires_exactly_the_box() {
        let mut pools: Vec<Box<dyn InstanceBackend>> = vec![Box::new(InstanceBuffer::new()), Box::new(InstanceBuffer::new())];
        let inside = [at(10.0, 10.0, 0.0), at(99.0, 1.0, 5999.0), at(0.0, 0.0, -6000.0)];
        let outside = [at(101.0, 10.0, 0.0), at(10.0, -1.0, 0.0), at(50.0, 50.0, 6001.0)];
        for t in inside.iter().chain(&outside) {
            pools[0].add_instance(*t);
            pools[1].add_instance(*t);
        }

        let bounds = tile_retirement_bounds(&[Vec3::ZERO, Vec3::new(100.0, 100.0, 0.0)], 6000.0).expect("bounds");
        let mut retirement = RetirementPool::new();
        assert_eq!(retirement.mark_region(&bounds, &pools), 6);
        assert_eq!(pools[0].instance_count(), 6, "marking does not remove");

        assert_eq!(retirement.flush(&mut pools), 6);
        for pool in &pools {
            let mut left: Vec<Vec3> = pool
                .instance_ids()
                .into_iter()
                .filter_map(|id| pool.instance_transform(id))
                .map(|t| t.position)
                .collect();
            left.sort_by(|a, b| a.x.total_cmp(&b.x));
            assert_eq!(left, vec![outside[1].position, outside[2].position, outside[0].position]);
        }
        assert!(retirement.is_empty());
    }

    #[test]
    fn test_overlapping_marks_coalesce() {
        let batches = Rc::new(RefCell::new(0));
        let mut pools: Vec<Box<dyn InstanceBackend>> = vec![Box::new(CountingPool {
            inner: InstanceBuffer::new(),
            batches: Rc::clone(&batches),
        })];
        for i in 0..10 {
            pools[0].add_instance(at(i as f32 * 10.0, 0.0, 0.0));
        }

        let mut retirement = RetirementPool::new();
        let a = Aabb::from_corners(Vec3::new(0.0, -1.0, -1.0), Vec3::new(50.0, 1.0, 1.0));
        let b = Aabb::from_corners(Vec3::new(30.0, -1.0, -1.0), Vec3::new(70.0, 1.0, 1.0));
        assert_eq!(retirement.mark_region(&a, &pools), 6);
        assert_eq!(retirement.mark_region(&b, &pools), 2, "already-marked ids are not counted twice");
        assert_eq!(retirement.pending_count(), 8);

        assert_eq!(retirement.flush(&mut pools), 8);
        assert_eq!(*batches.borrow(), 1, "one batch per species");
        assert_eq!(pools[0].instance_count(), 2);
    }
}
