//! Compass directions of a tile's four edges.
//!
//! North is the ghost row `i = 0` (toward process row 0), west is the ghost
//! column `j = 0`. A message sent *toward* `d` carries the owner's boundary
//! edge `d` and lands in the receiver's ghost edge `d.opposite()`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum Direction {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
}

impl Direction {
    /// Fixed exchange order; every worker walks directions in this order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    #[inline]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decode the wire representation.
    pub fn from_wire(raw: u16) -> Option<Direction> {
        Direction::ALL.get(raw as usize).copied()
    }

    /// True for the edges that are rows of the tile.
    #[inline]
    pub const fn is_horizontal_edge(self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        f.write_str(s)
    }
}
