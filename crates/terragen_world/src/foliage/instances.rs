//! # Instance Buffer
//!
//! Headless instanced-rendering backend: one per species.
//!
//! Instance ids are slot indices and stay valid until the instance is
//! removed; freed slots are reused by later additions.

use terragen_shared::{Aabb, Transform};

use crate::collaborators::{InstanceBackend, InstanceId};

/// Slot storage with a free list.
#[derive(Clone, Debug, Default)]
pub struct InstanceBuffer {
    /// Transform per slot, `None` when free.
    slots: Vec<Option<Transform>>,
    /// Free slot indices.
    free_list: Vec<u32>,
    /// Number of live instances.
    live: usize,
    /// Batch removals performed.
    removal_batches: u64,
}

impl InstanceBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batch removals performed so far.
    #[inline]
    #[must_use]
    pub fn removal_batches(&self) -> u64 {
        self.removal_batches
    }

    /// Iterates live instances.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &Transform)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|t| (InstanceId(index as u32), t)))
    }

    /// Live transforms packed for upload; free slots are skipped.
    #[must_use]
    pub fn packed_transforms(&self) -> Vec<Transform> {
        self.iter().map(|(_, t)| *t).collect()
    }

    /// Packed transforms as raw bytes.
    #[must_use]
    pub fn packed_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.packed_transforms()).to_vec()
    }
}

impl InstanceBackend for InstanceBuffer {
    fn add_instance(&mut self, transform: Transform) -> InstanceId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            self.slots[index as usize] = Some(transform);
            InstanceId(index)
        } else {
            self.slots.push(Some(transform));
            InstanceId(self.slots.len() as u32 - 1)
        }
    }

    fn instances_overlapping(&self, bounds: &Aabb) -> Vec<InstanceId> {
        self.iter()
            .filter(|(_, t)| bounds.contains(t.position))
            .map(|(id, _)| id)
            .collect()
    }

    fn remove_instances(&mut self, ids: &[InstanceId]) {
        for id in ids {
            if let Some(slot) = self.slots.get_mut(id.0 as usize) {
                if slot.take().is_some() {
                    self.free_list.push(id.0);
                    self.live -= 1;
                }
            }
        }
        self.removal_batches += 1;
    }

    fn instance_transform(&self, id: InstanceId) -> Option<Transform> {
        self.slots.get(id.0 as usize).copied().flatten()
    }

    fn update_instance_transform(&mut self, id: InstanceId, transform: Transform) -> bool {
        match self.slots.get_mut(id.0 as usize) {
            Some(Some(slot)) => {
                *slot = transform;
                true
            }
            _ => false,
        }
    }

    fn instance_ids(&self) -> Vec<InstanceId> {
        self.iter().map(|(id, _)| id).collect()
    }

    fn instance_count(&self) -> usize {
        self.live
    }
}
