//! # Tile Mesh Builder
//!
//! Turns one grid tile into drawable buffers.
//!
//! ## Layout
//!
//! ```text
//!  m m m m m m      m = margin vertex (sampled, used for normals only)
//!  m i i i i m      i = inner vertex  (submitted)
//!  m i i i i m
//!  m i i i i m
//!  m m m m m m
//! ```
//!
//! Normals and tangents are computed over the oversized grid so that edge
//! vertices see the same neighbourhood as their twins in the next tile.
//! Only the inner grid, with its own index list, is handed to the backend.

use terragen_shared::{GridCoord, Vec2, Vec3};

use crate::error::{ProceduralError, ProceduralResult};
use crate::geometry::compute_normals_and_tangents;
use crate::height_field::HeightField;

/// World units per UV unit.
pub const UV_WORLD_SCALE: f32 = 100.0;

/// Buffers for one generated tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileMesh {
    /// Tile this mesh was built for.
    pub coord: GridCoord,
    /// LOD factor used (>= 1).
    pub lod: u32,
    /// Inner vertices per row.
    pub columns: u32,
    /// Inner rows.
    pub rows: u32,
    /// World-space positions, row-major from the tile origin.
    pub vertices: Vec<Vec3>,
    /// Triangle list over `vertices`.
    pub indices: Vec<u32>,
    /// Per-vertex normals.
    pub normals: Vec<Vec3>,
    /// Per-vertex texture coordinates (world / 100).
    pub uvs: Vec<Vec2>,
    /// Per-vertex tangents.
    pub tangents: Vec<Vec3>,
}

impl TileMesh {
    /// Number of submitted vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex positions as raw bytes for upload.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Vertex at inner grid position `(column, row)`.
    #[must_use]
    pub fn vertex_at(&self, column: u32, row: u32) -> Option<Vec3> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.vertices.get((row * self.columns + column) as usize).copied()
    }
}

/// Builds tile meshes for a fixed grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileMeshBuilder {
    x_vertex_count: u32,
    y_vertex_count: u32,
    cell_size: f32,
}

impl TileMeshBuilder {
    /// Creates a builder for tiles of `x_vertex_count` x `y_vertex_count`
    /// vertices spaced `cell_size` apart at full detail.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if a count is below 2 or the cell size is
    /// not positive.
    pub fn new(x_vertex_count: u32, y_vertex_count: u32, cell_size: f32) -> ProceduralResult<Self> {
        if x_vertex_count < 2 || y_vertex_count < 2 {
            return Err(ProceduralError::InvalidParameter(format!(
                "tile needs at least 2x2 vertices, got {x_vertex_count}x{y_vertex_count}"
            )));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ProceduralError::InvalidParameter(format!(
                "cell size must be positive, got {cell_size}"
            )));
        }
        Ok(Self {
            x_vertex_count,
            y_vertex_count,
            cell_size,
        })
    }

    /// Full-detail vertex spacing.
    #[inline]
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Distance between the origins of neighbouring tiles.
    #[inline]
    #[must_use]
    pub fn tile_span(&self) -> Vec2 {
        Vec2::new(
            (self.x_vertex_count - 1) as f32 * self.cell_size,
            (self.y_vertex_count - 1) as f32 * self.cell_size,
        )
    }

    /// World position of the tile's first vertex.
    #[inline]
    #[must_use]
    pub fn tile_origin(&self, coord: GridCoord) -> Vec2 {
        let span = self.tile_span();
        Vec2::new(coord.x as f32 * span.x, coord.y as f32 * span.y)
    }

    /// World position used for distance ranking of a tile.
    #[inline]
    #[must_use]
    pub fn tile_center(&self, coord: GridCoord) -> Vec2 {
        self.tile_origin(coord) + self.tile_span() * 0.5
    }

    /// Inner vertex counts per axis at `lod`.
    ///
    /// `n = count / lod` plus enough extra columns to cover the
    /// full-detail footprint, plus one.
    #[must_use]
    pub fn inner_dimensions(&self, lod: u32) -> (u32, u32) {
        let lod = lod.max(1);
        (inner_count(self.x_vertex_count, lod), inner_count(self.y_vertex_count, lod))
    }

    /// Builds the mesh for `coord` at `lod` (clamped to >= 1).
    #[must_use]
    pub fn build(&self, field: &HeightField, coord: GridCoord, lod: u32) -> TileMesh {
        let lod = lod.max(1);
        let step = self.cell_size * lod as f32;
        let origin = self.tile_origin(coord);
        let (columns, rows) = self.inner_dimensions(lod);

        // Oversized grid: one margin vertex on every side.
        let stride = columns + 2;
        let total_rows = rows + 2;
        let capacity = (stride * total_rows) as usize;

        let mut positions = Vec::with_capacity(capacity);
        let mut uvs = Vec::with_capacity(capacity);
        for iy in -1..=rows as i32 {
            for ix in -1..=columns as i32 {
                let location = Vec2::new(ix as f32 * step + origin.x, iy as f32 * step + origin.y);
                positions.push(Vec3::from_xy(location, field.height(location)));
                uvs.push(location * (1.0 / UV_WORLD_SCALE));
            }
        }

        let full_indices = grid_indices(stride, total_rows);
        let (full_normals, full_tangents) =
            compute_normals_and_tangents(&positions, &full_indices, &uvs);

        let inner = (columns * rows) as usize;
        let mut mesh = TileMesh {
            coord,
            lod,
            columns,
            rows,
            vertices: Vec::with_capacity(inner),
            indices: grid_indices(columns, rows),
            normals: Vec::with_capacity(inner),
            uvs: Vec::with_capacity(inner),
            tangents: Vec::with_capacity(inner),
        };

        for row in 1..=rows {
            for column in 1..=columns {
                let i = (row * stride + column) as usize;
                mesh.vertices.push(positions[i]);
                mesh.normals.push(full_normals[i]);
                mesh.uvs.push(uvs[i]);
                mesh.tangents.push(full_tangents[i]);
            }
        }

        mesh
    }
}

fn inner_count(count: u32, lod: u32) -> u32 {
    let n = count / lod;
    let gap = if count % lod == 0 { 0 } else { 1 };
    n + gap + 1
}

/// Two triangles per quad over a `columns` x `rows` vertex grid.
fn grid_indices(columns: u32, rows: u32) -> Vec<u32> {
    if columns < 2 || rows < 2 {
        return Vec::new();
    }
    let mut indices = Vec::with_capacity(((columns - 1) * (rows - 1) * 6) as usize);
    for ty in 0..rows - 1 {
        for tx in 0..columns - 1 {
            let i = tx + ty * columns;
            indices.extend_from_slice(&[i, i + columns, i + 1, i + columns, i + columns + 1, i + 1]);
        }
    }
    indices
}
