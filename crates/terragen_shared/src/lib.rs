//! # TERRAGEN Shared
//!
//! Common math used by the pure generators and the streaming world.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on an engine, a renderer or a physics
//! backend. Collaborator interfaces live in `terragen_world`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod grid;
pub mod math;

pub use grid::{Aabb, GridCoord};
pub use math::{Quaternion, Transform, Vec2, Vec3};
