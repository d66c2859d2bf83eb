//! Process topology: decomposition of the global grid over workers.
//!
//! - [`Direction`]: the four tile edges and their wire encoding
//! - [`ProcessTopology`]: a worker's coordinates, neighbours and tile extents

pub mod direction;
pub mod process_grid;

pub use direction::Direction;
pub use process_grid::{Decomposition, ProcessTopology};
