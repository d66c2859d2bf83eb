//! `ProcessTopology`: where a worker sits in the process grid and who its
//! neighbours are.
//!
//! All rank arithmetic lives here and runs once at startup; the iteration
//! loop only asks [`ProcessTopology::neighbor`].
//!
//! Two decomposition shapes are supported:
//! - [`Decomposition::Strip`]: a `1 x P` row of vertical strips, each `N` rows
//!   tall and `N/P` columns wide. Only east/west neighbours exist.
//! - [`Decomposition::Grid`]: a `√P x √P` grid of square `N/√P` tiles with
//!   row-major rank numbering, `rank = row * √P + col`.

use super::direction::Direction;
use crate::jacobi_error::JacobiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shape of the domain decomposition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decomposition {
    #[default]
    Strip,
    Grid,
}

impl fmt::Display for Decomposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decomposition::Strip => f.write_str("strip"),
            Decomposition::Grid => f.write_str("grid"),
        }
    }
}

impl FromStr for Decomposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strip" | "1d" => Ok(Decomposition::Strip),
            "grid" | "2d" => Ok(Decomposition::Grid),
            other => Err(format!("unknown decomposition `{other}` (expected strip|grid)")),
        }
    }
}

/// Exact integer square root, if `p` is a perfect square.
fn exact_sqrt(p: usize) -> Option<usize> {
    let q = (p as f64).sqrt().round() as usize;
    (q.checked_mul(q) == Some(p)).then_some(q)
}

/// Per-worker view of the process grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTopology {
    rank: usize,
    size: usize,
    decomposition: Decomposition,
    /// `(proc_rows, proc_cols)`
    dims: (usize, usize),
    /// `(row, col)` of this worker
    coords: (usize, usize),
    neighbors: [Option<usize>; 4],
    local_rows: usize,
    local_cols: usize,
}

impl ProcessTopology {
    /// Validate `(n, size, decomposition)` and place `rank` in the grid.
    ///
    /// Every worker calls this with the same `(n, size, decomposition)`, so a
    /// divisibility failure is seen by all of them before any allocation.
    pub fn new(
        rank: usize,
        size: usize,
        n: usize,
        decomposition: Decomposition,
    ) -> Result<Self, JacobiError> {
        if size == 0 || rank >= size {
            return Err(JacobiError::InvalidWorkerCount { rank, size });
        }
        let factor = match decomposition {
            Decomposition::Strip => size,
            Decomposition::Grid => {
                exact_sqrt(size).ok_or(JacobiError::NotSquare { workers: size })?
            }
        };
        if n == 0 || n % factor != 0 {
            return Err(JacobiError::Indivisible {
                n,
                factor,
                decomposition,
            });
        }
        let side = n / factor;

        let (dims, coords, local_rows, local_cols) = match decomposition {
            Decomposition::Strip => ((1, size), (0, rank), n, side),
            Decomposition::Grid => ((factor, factor), (rank / factor, rank % factor), side, side),
        };
        let (row, col) = coords;
        let (proc_rows, proc_cols) = dims;
        let at = |r: usize, c: usize| r * proc_cols + c;

        let mut neighbors = [None; 4];
        neighbors[Direction::North.index()] = (row > 0).then(|| at(row - 1, col));
        neighbors[Direction::South.index()] = (row + 1 < proc_rows).then(|| at(row + 1, col));
        neighbors[Direction::West.index()] = (col > 0).then(|| at(row, col - 1));
        neighbors[Direction::East.index()] = (col + 1 < proc_cols).then(|| at(row, col + 1));

        Ok(Self {
            rank,
            size,
            decomposition,
            dims,
            coords,
            neighbors,
            local_rows,
            local_cols,
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn decomposition(&self) -> Decomposition {
        self.decomposition
    }

    /// `(proc_rows, proc_cols)` of the process grid.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        self.dims
    }

    /// `(row, col)` of this worker in the process grid.
    #[inline]
    pub fn coords(&self) -> (usize, usize) {
        self.coords
    }

    /// Interior rows of this worker's tile.
    #[inline]
    pub fn local_rows(&self) -> usize {
        self.local_rows
    }

    /// Interior columns of this worker's tile.
    #[inline]
    pub fn local_cols(&self) -> usize {
        self.local_cols
    }

    /// Rank of the neighbour across edge `dir`, if any.
    #[inline]
    pub fn neighbor(&self, dir: Direction) -> Option<usize> {
        self.neighbors[dir.index()]
    }

    /// Active `(direction, neighbour)` pairs in exchange order.
    pub fn neighbors(&self) -> impl Iterator<Item = (Direction, usize)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|d| self.neighbor(d).map(|r| (d, r)))
    }

    /// Length of a halo message across edge `dir`.
    #[inline]
    pub fn edge_len(&self, dir: Direction) -> usize {
        if dir.is_horizontal_edge() {
            self.local_cols
        } else {
            self.local_rows
        }
    }

    /// Global `(row, col)` of interior cell `(1, 1)`, zero-based.
    pub fn global_origin(&self) -> (usize, usize) {
        (
            self.coords.0 * self.local_rows,
            self.coords.1 * self.local_cols,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_worker_has_no_neighbors() {
        for shape in [Decomposition::Strip, Decomposition::Grid] {
            let t = ProcessTopology::new(0, 1, 8, shape).unwrap();
            assert_eq!((t.local_rows(), t.local_cols()), (8, 8));
            assert_eq!(t.neighbors().count(), 0);
        }
    }

    #[test]
    fn strip_neighbors_are_linear() {
        let t = ProcessTopology::new(1, 3, 9, Decomposition::Strip).unwrap();
        assert_eq!((t.local_rows(), t.local_cols()), (9, 3));
        assert_eq!(t.neighbor(Direction::West), Some(0));
        assert_eq!(t.neighbor(Direction::East), Some(2));
        assert_eq!(t.neighbor(Direction::North), None);
        assert_eq!(t.neighbor(Direction::South), None);
        assert_eq!(t.global_origin(), (0, 3));
    }

    #[test]
    fn grid_neighbors_are_row_major() {
        // 3x3 grid, center rank 4
        let t = ProcessTopology::new(4, 9, 12, Decomposition::Grid).unwrap();
        assert_eq!(t.coords(), (1, 1));
        assert_eq!(t.neighbor(Direction::North), Some(1));
        assert_eq!(t.neighbor(Direction::South), Some(7));
        assert_eq!(t.neighbor(Direction::West), Some(3));
        assert_eq!(t.neighbor(Direction::East), Some(5));
        assert_eq!(t.global_origin(), (4, 4));

        let corner = ProcessTopology::new(8, 9, 12, Decomposition::Grid).unwrap();
        assert_eq!(corner.neighbor(Direction::South), None);
        assert_eq!(corner.neighbor(Direction::East), None);
        assert_eq!(corner.neighbor(Direction::North), Some(5));
        assert_eq!(corner.neighbor(Direction::West), Some(7));
    }

    #[test]
    fn indivisible_is_rejected() {
        let err = ProcessTopology::new(0, 3, 10, Decomposition::Strip).unwrap_err();
        assert_eq!(
            err,
            JacobiError::Indivisible {
                n: 10,
                factor: 3,
                decomposition: Decomposition::Strip
            }
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn grid_needs_square_worker_count() {
        assert_eq!(
            ProcessTopology::new(0, 3, 12, Decomposition::Grid).unwrap_err(),
            JacobiError::NotSquare { workers: 3 }
        );
    }

    #[test]
    fn rank_out_of_range() {
        assert!(matches!(
            ProcessTopology::new(4, 4, 8, Decomposition::Strip),
            Err(JacobiError::InvalidWorkerCount { rank: 4, size: 4 })
        ));
        assert!(ProcessTopology::new(0, 0, 8, Decomposition::Strip).is_err());
    }

    #[test]
    fn parse_decomposition() {
        assert_eq!("grid".parse::<Decomposition>(), Ok(Decomposition::Grid));
        assert_eq!("1D".parse::<Decomposition>(), Ok(Decomposition::Strip));
        assert!("cube".parse::<Decomposition>().is_err());
    }
}
