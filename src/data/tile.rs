//! `LocalTile`: a worker's unknowns plus a one-cell ghost border.
//!
//! Storage is a single row-major `Vec<f64>` of `(rows + 2) * (cols + 2)`
//! values. Interior cells are `(i, j)` with `i ∈ [1, rows]`, `j ∈ [1, cols]`;
//! row 0, row `rows + 1`, column 0 and column `cols + 1` are ghosts.
//!
//! The tile itself never communicates. Ghost edges are written by the halo
//! exchanger through [`LocalTile::set_ghost_edge`], interior cells by the
//! stencil kernel.

use crate::jacobi_error::JacobiError;
use crate::topology::Direction;
use std::ops::{Index, IndexMut};

#[derive(Clone, Debug, PartialEq)]
pub struct LocalTile {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl LocalTile {
    /// Zero-initialised tile with `rows x cols` interior cells.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; (rows + 2) * (cols + 2)],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row stride of the backing buffer, ghosts included.
    #[inline]
    pub fn stride(&self) -> usize {
        self.cols + 2
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        i * self.stride() + j
    }

    #[inline]
    fn is_interior(&self, i: usize, j: usize) -> bool {
        (1..=self.rows).contains(&i) && (1..=self.cols).contains(&j)
    }

    /// Interior value at `(i, j)`, or `None` outside `[1, rows] x [1, cols]`.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.is_interior(i, j).then(|| self.data[self.offset(i, j)])
    }

    /// Overwrite interior value `(i, j)`.
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> Result<(), JacobiError> {
        if !self.is_interior(i, j) {
            return Err(JacobiError::OutOfBounds {
                i,
                j,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let k = self.offset(i, j);
        self.data[k] = value;
        Ok(())
    }

    /// Number of cells along edge `dir`.
    #[inline]
    pub fn edge_len(&self, dir: Direction) -> usize {
        if dir.is_horizontal_edge() {
            self.cols
        } else {
            self.rows
        }
    }

    /// Outermost computed row/column on side `dir`: the halo payload.
    pub fn boundary_edge(&self, dir: Direction) -> Vec<f64> {
        match dir {
            Direction::North => self.row_slice(1).to_vec(),
            Direction::South => self.row_slice(self.rows).to_vec(),
            Direction::West => self.column(1),
            Direction::East => self.column(self.cols),
        }
    }

    /// Ghost row/column on side `dir`, without corners.
    pub fn ghost_edge(&self, dir: Direction) -> Vec<f64> {
        match dir {
            Direction::North => self.row_slice(0).to_vec(),
            Direction::South => self.row_slice(self.rows + 1).to_vec(),
            Direction::West => self.column(0),
            Direction::East => self.column(self.cols + 1),
        }
    }

    /// Fill the ghost row/column on side `dir` from a neighbour's boundary.
    pub fn set_ghost_edge(&mut self, dir: Direction, values: &[f64]) -> Result<(), JacobiError> {
        let expected = self.edge_len(dir);
        if values.len() != expected {
            return Err(JacobiError::EdgeLength {
                direction: dir,
                expected,
                got: values.len(),
            });
        }
        match dir {
            Direction::North | Direction::South => {
                let i = if dir == Direction::North { 0 } else { self.rows + 1 };
                let start = self.offset(i, 1);
                self.data[start..start + self.cols].copy_from_slice(values);
            }
            Direction::West | Direction::East => {
                let j = if dir == Direction::West { 0 } else { self.cols + 1 };
                for (k, &v) in values.iter().enumerate() {
                    let off = self.offset(k + 1, j);
                    self.data[off] = v;
                }
            }
        }
        Ok(())
    }

    /// Row-major copy of the `rows x cols` unknowns.
    pub fn interior(&self) -> Vec<f64> {
        (1..=self.rows)
            .flat_map(|i| self.row_slice(i).iter().copied())
            .collect()
    }

    /// Interior part of row `i` (columns `1..=cols`).
    #[inline]
    pub(crate) fn row_slice(&self, i: usize) -> &[f64] {
        let start = self.offset(i, 1);
        &self.data[start..start + self.cols]
    }

    fn column(&self, j: usize) -> Vec<f64> {
        (1..=self.rows).map(|i| self.data[self.offset(i, j)]).collect()
    }

    /// Raw backing buffer, ghosts included.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

/// Unchecked-by-contract access used by the kernels; panics outside the
/// padded buffer.
impl Index<(usize, usize)> for LocalTile {
    type Output = f64;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        assert!(i < self.rows + 2 && j < self.cols + 2, "({i}, {j}) outside padded tile");
        &self.data[self.offset(i, j)]
    }
}

impl IndexMut<(usize, usize)> for LocalTile {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        assert!(i < self.rows + 2 && j < self.cols + 2, "({i}, {j}) outside padded tile");
        let k = self.offset(i, j);
        &mut self.data[k]
    }
}
