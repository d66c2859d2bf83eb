//! Data module: per-worker tile storage

/// Interior unknowns plus ghost border.
pub mod tile;

pub use tile::LocalTile;
