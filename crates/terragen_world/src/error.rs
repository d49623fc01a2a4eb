//! # World Error Types
//!
//! Configuration, persistence and pipeline-contract failures.
//!
//! Ray misses, exhausted try budgets and rejected placements are not
//! errors: they show up as `None` or an outcome value plus a log event.

use terragen_procedural::ProceduralError;
use terragen_shared::GridCoord;
use thiserror::Error;

/// Errors that can occur in the streaming world.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure inside terrain generation or layout storage.
    #[error(transparent)]
    Procedural(#[from] ProceduralError),

    /// A tile is already being generated.
    #[error("generator busy with tile ({}, {})", coord.x, coord.y)]
    GeneratorBusy {
        /// Tile currently in flight.
        coord: GridCoord,
    },

    /// The background mesh worker is gone.
    #[error("mesh worker disconnected")]
    WorkerDisconnected,

    /// A foliage species entry is malformed.
    #[error("invalid foliage species '{name}': {reason}")]
    InvalidSpecies {
        /// Species name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
