//! # Procedural Error Types
//!
//! Errors raised while configuring terrain generation or moving a terrain
//! layout in and out of storage. Sampling and tile building never fail.

use thiserror::Error;

/// Errors that can occur in the procedural crate.
#[derive(Error, Debug)]
pub enum ProceduralError {
    /// A generation parameter is outside its valid domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Storage backend failed.
    #[error("layout storage i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The layout could not be encoded.
    #[error("failed to encode terrain layout: {0}")]
    LayoutEncode(String),

    /// A stored layout blob is malformed.
    #[error("failed to decode terrain layout: {0}")]
    LayoutDecode(String),
}

/// Result type for procedural operations.
pub type ProceduralResult<T> = Result<T, ProceduralError>;
