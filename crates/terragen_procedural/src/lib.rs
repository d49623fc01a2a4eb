//! # TERRAGEN Procedural Generation
//!
//! Deterministic terrain synthesis for an endless, streamed world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same parameters always produce the same terrain
//! 2. **Tiled**: The world is built from fixed-size grid tiles
//! 3. **Seam-free**: Shared tile edges get bit-identical heights
//! 4. **Pure**: No threads, no engine, no hidden state
//!
//! ## Core Components
//!
//! - `GradientNoise`: 2D lattice noise
//! - `HeightField`: Flat spawn zone blended into layered noise
//! - `TileMeshBuilder`: Vertex/index/normal/UV/tangent buffers per tile
//! - `SavedLayout`: Height-field parameters persisted between sessions
//!
//! ## Example
//!
//! ```rust,ignore
//! use terragen_procedural::{FlatZone, HeightField, HeightFieldParams, TileMeshBuilder};
//! use terragen_shared::GridCoord;
//!
//! let field = HeightField::new(HeightFieldParams::default(), FlatZone::default());
//! let builder = TileMeshBuilder::new(20, 20, 2000.0)?;
//!
//! let mesh = builder.build(&field, GridCoord::ORIGIN, 1);
//! assert_eq!(mesh.indices.len(), 20 * 20 * 6);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod geometry;
pub mod height_field;
pub mod layout;
pub mod mesh;
pub mod noise;

pub use error::{ProceduralError, ProceduralResult};
pub use height_field::{FlatZone, HeightField, HeightFieldParams, NoiseLayer};
pub use layout::{
    load_layout, resolve_layout, save_layout, FileLayoutStore, LayoutSource, LayoutStore,
    MemoryLayoutStore, SavedLayout, LAYOUT_SLOT,
};
pub use mesh::{TileMesh, TileMeshBuilder, UV_WORLD_SCALE};
pub use noise::{GradientNoise, NoiseSeed};
