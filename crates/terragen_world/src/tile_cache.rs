//! # Tile LOD Cache
//!
//! Authoritative table of tracked tiles and the mesh sections they occupy.
//!
//! ## Lifecycle
//!
//! ```text
//! enqueue ──► QUEUED (no section) ──► generating ──► DRAWN (section, lod)
//!                  ▲                                     │
//!                  └──── request_lod_change ◄────────────┤
//!                                                        ▼
//!                                  evict / replaced by a new tile
//! ```
//!
//! ## Invariants
//!
//! - A section id is held by at most one tracked tile, counting the
//!   forced-removal queue.
//! - Sections are taken from, in order: the farthest replaceable tile,
//!   the free list, a fresh counter value.

use std::collections::BTreeMap;

use terragen_shared::{GridCoord, Vec2};

use crate::collaborators::MeshSectionId;

/// Slot of a tracked tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileSlot {
    /// Occupied section, `None` until the tile is first drawn.
    pub section: Option<MeshSectionId>,
    /// LOD factor (>= 1).
    pub lod: u32,
}

impl TileSlot {
    /// Queued slot without a section.
    #[must_use]
    pub const fn unassigned(lod: u32) -> Self {
        Self { section: None, lod }
    }

    /// Whether the tile is drawn.
    #[inline]
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.section.is_some()
    }
}

/// Where the section for a newly drawn tile came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotAllocation {
    /// Taken from a far tile, which is no longer tracked.
    Reused {
        /// Section handed over.
        section: MeshSectionId,
        /// Tile that gave it up.
        replaced: GridCoord,
    },
    /// Taken from the free list.
    Recycled(MeshSectionId),
    /// A never-used id.
    Fresh(MeshSectionId),
}

impl SlotAllocation {
    /// Allocated section.
    #[must_use]
    pub const fn section(&self) -> MeshSectionId {
        match *self {
            Self::Reused { section, .. } | Self::Recycled(section) | Self::Fresh(section) => section,
        }
    }
}

/// Resident-tile table with LOD-aware replacement.
#[derive(Debug)]
pub struct TileCache {
    queued: BTreeMap<GridCoord, TileSlot>,
    remove_lod: BTreeMap<GridCoord, TileSlot>,
    free_sections: Vec<MeshSectionId>,
    next_section: u32,
    tile_span: Vec2,
    replaceable_distance: f32,
}

impl TileCache {
    /// Creates an empty cache for tiles spaced `tile_span` apart. Drawn
    /// tiles whose centre is farther than `replaceable_distance` from the
    /// player may hand their section to a new tile.
    #[must_use]
    pub fn new(tile_span: Vec2, replaceable_distance: f32) -> Self {
        Self {
            queued: BTreeMap::new(),
            remove_lod: BTreeMap::new(),
            free_sections: Vec::new(),
            next_section: 0,
            tile_span,
            replaceable_distance,
        }
    }

    /// Replacement threshold.
    #[inline]
    #[must_use]
    pub fn replaceable_distance(&self) -> f32 {
        self.replaceable_distance
    }

    /// Centre of a tile in world space.
    #[inline]
    #[must_use]
    pub fn tile_center(&self, coord: GridCoord) -> Vec2 {
        Vec2::new(
            coord.x as f32 * self.tile_span.x + self.tile_span.x * 0.5,
            coord.y as f32 * self.tile_span.y + self.tile_span.y * 0.5,
        )
    }

    /// Slot of a tracked tile.
    #[must_use]
    pub fn get(&self, coord: GridCoord) -> Option<TileSlot> {
        self.queued.get(&coord).copied()
    }

    /// Whether the tile is tracked.
    #[must_use]
    pub fn contains(&self, coord: GridCoord) -> bool {
        self.queued.contains_key(&coord)
    }

    /// Tracked tiles in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, TileSlot)> + '_ {
        self.queued.iter().map(|(c, s)| (*c, *s))
    }

    /// Number of tracked tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Number of drawn tiles.
    #[must_use]
    pub fn drawn_count(&self) -> usize {
        self.queued.values().filter(|s| s.is_assigned()).count()
    }

    /// Number of tiles waiting for generation.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queued.values().filter(|s| !s.is_assigned()).count()
    }

    /// Tiles waiting for forced teardown.
    #[must_use]
    pub fn forced_removal_count(&self) -> usize {
        self.remove_lod.len()
    }

    /// Highest section id handed out so far, plus one.
    #[must_use]
    pub fn sections_created(&self) -> u32 {
        self.next_section
    }

    /// Starts tracking `coord` as queued. An already queued tile takes the
    /// new LOD; a drawn tile is left alone. Returns true if the tile was
    /// not tracked before.
    pub fn enqueue(&mut self, coord: GridCoord, lod: u32) -> bool {
        let lod = lod.max(1);
        match self.queued.get_mut(&coord) {
            None => {
                self.queued.insert(coord, TileSlot::unassigned(lod));
                tracing::trace!("Tile ({}, {}) queued at lod {}", coord.x, coord.y, lod);
                true
            }
            Some(slot) if !slot.is_assigned() => {
                slot.lod = lod;
                false
            }
            Some(_) => false,
        }
    }

    /// Re-queues a drawn tile at a new LOD. Its current section keeps
    /// displaying until the replacement is committed. Returns true if a
    /// change was scheduled.
    pub fn request_lod_change(&mut self, coord: GridCoord, lod: u32) -> bool {
        let lod = lod.max(1);
        let Some(slot) = self.queued.get(&coord).copied() else {
            return false;
        };
        if !slot.is_assigned() {
            self.enqueue(coord, lod);
            return slot.lod != lod;
        }
        if slot.lod == lod || self.remove_lod.contains_key(&coord) {
            return false;
        }
        self.remove_lod.insert(coord, slot);
        self.queued.insert(coord, TileSlot::unassigned(lod));
        tracing::debug!("Tile ({}, {}) lod {} -> {}", coord.x, coord.y, slot.lod, lod);
        true
    }

    /// Takes the forced-removal entry for the generation target, if any.
    ///
    /// The caller must retire the section's foliage and clear it before
    /// drawing anything else; the section goes back to the free list.
    pub fn drain_forced_removal(&mut self, target: GridCoord) -> Option<TileSlot> {
        let slot = self.remove_lod.remove(&target)?;
        if let Some(section) = slot.section {
            self.free_sections.push(section);
        }
        Some(slot)
    }

    /// The drawn tile farthest from `player`, among those beyond the
    /// replaceable distance. Ties go to the first tile in coordinate order.
    #[must_use]
    pub fn pick_replacement_candidate(&self, player: Vec2) -> Option<GridCoord> {
        let mut best: Option<(GridCoord, f32)> = None;
        for (coord, slot) in &self.queued {
            if !slot.is_assigned() {
                continue;
            }
            let distance = self.tile_center(*coord).distance(player);
            if distance <= self.replaceable_distance {
                continue;
            }
            if best.map_or(true, |(_, d)| distance > d) {
                best = Some((*coord, distance));
            }
        }
        best.map(|(coord, _)| coord)
    }

    /// The queued tile closest to `player`. Ties go to the first tile in
    /// coordinate order.
    #[must_use]
    pub fn closest_queued(&self, player: Vec2) -> Option<GridCoord> {
        let mut best: Option<(GridCoord, f32)> = None;
        for (coord, slot) in &self.queued {
            if slot.is_assigned() {
                continue;
            }
            let distance = self.tile_center(*coord).distance(player);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((*coord, distance));
            }
        }
        best.map(|(coord, _)| coord)
    }

    /// Assigns a section to `target` and marks it drawn at `lod`.
    ///
    /// When a far tile is replaced it stops being tracked; the caller must
    /// retire its foliage and clear the section before re-creating it.
    pub fn allocate_or_reuse(&mut self, target: GridCoord, lod: u32, player: Vec2) -> SlotAllocation {
        let allocation = if let Some(replaced) = self.pick_replacement_candidate(player) {
            let section = self
                .queued
                .remove(&replaced)
                .and_then(|slot| slot.section)
                .unwrap_or_else(|| self.fresh_section());
            tracing::debug!(
                "Tile ({}, {}) takes section {} from ({}, {})",
                target.x,
                target.y,
                section.0,
                replaced.x,
                replaced.y
            );
            SlotAllocation::Reused { section, replaced }
        } else if let Some(section) = self.free_sections.pop() {
            SlotAllocation::Recycled(section)
        } else {
            SlotAllocation::Fresh(self.fresh_section())
        };

        self.queued.insert(
            target,
            TileSlot {
                section: Some(allocation.section()),
                lod: lod.max(1),
            },
        );
        debug_assert!(self.sections_unique(), "mesh section assigned twice");
        allocation
    }

    /// Stops tracking `coord`. Returns the sections it held (drawn section
    /// and any pending forced removal); they go back to the free list once
    /// the caller has cleared them.
    pub fn evict(&mut self, coord: GridCoord) -> Vec<MeshSectionId> {
        let mut sections = Vec::new();
        if let Some(section) = self.queued.remove(&coord).and_then(|s| s.section) {
            sections.push(section);
        }
        if let Some(section) = self.remove_lod.remove(&coord).and_then(|s| s.section) {
            sections.push(section);
        }
        self.free_sections.extend(sections.iter().copied());
        sections
    }

    fn fresh_section(&mut self) -> MeshSectionId {
        let id = MeshSectionId(self.next_section);
        self.next_section += 1;
        id
    }

    fn sections_unique(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.queued
            .values()
            .chain(self.remove_lod.values())
            .filter_map(|s| s.section)
            .chain(self.free_sections.iter().copied())
            .all(|id| seen.insert(id))
    }
}
