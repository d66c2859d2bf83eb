//! 5-point Jacobi update for `-Δu = 1`.
//!
//! `dst[i,j] = 0.25 * (h² + src[i,j+1] + src[i,j-1] + src[i-1,j] + src[i+1,j])`
//!
//! The tile interior is split into two disjoint regions:
//! - [`Region::Boundary`]: cells on the outermost interior ring. They read
//!   ghost values, and their new values are what the halo exchange ships to
//!   the neighbours, so they are computed first.
//! - [`Region::Interior`]: the strict interior. It only reads owned cells and
//!   can be swept while the exchange is in flight.
//!
//! `src` is never written. Both regions together cover every interior cell
//! exactly once, also for one- and two-cell-wide tiles.

use crate::data::tile::LocalTile;
use std::ops::Range;

/// Which part of the tile interior to update.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Region {
    /// Outermost ring of interior cells (ghost-dependent).
    Boundary,
    /// Strict interior, `[2, rows-1] x [2, cols-1]`.
    Interior,
    /// Boundary then interior.
    All,
}

/// Apply the Jacobi update to every cell of `region`.
///
/// # Panics
/// If `dst` and `src` have different shapes.
pub fn update(dst: &mut LocalTile, src: &LocalTile, region: Region, hsq: f64) {
    assert_eq!(
        (dst.rows(), dst.cols()),
        (src.rows(), src.cols()),
        "stencil tiles must have the same shape"
    );
    match region {
        Region::Boundary => update_boundary(dst, src, hsq),
        Region::Interior => update_interior(dst, src, hsq),
        Region::All => {
            update_boundary(dst, src, hsq);
            update_interior(dst, src, hsq);
        }
    }
}

#[inline(always)]
fn jacobi_cell(src: &[f64], stride: usize, k: usize, hsq: f64) -> f64 {
    0.25 * (hsq + src[k + 1] + src[k - 1] + src[k - stride] + src[k + stride])
}

/// Sweep columns `js` of padded row `i`; `dst_row` is that whole padded row.
#[inline]
fn sweep_row(dst_row: &mut [f64], src: &[f64], stride: usize, i: usize, js: Range<usize>, hsq: f64) {
    let base = i * stride;
    for j in js {
        dst_row[j] = jacobi_cell(src, stride, base + j, hsq);
    }
}

fn update_boundary(dst: &mut LocalTile, src: &LocalTile, hsq: f64) {
    let (rows, cols, stride) = (src.rows(), src.cols(), src.stride());
    let s = src.as_slice();
    let d = dst.as_mut_slice();

    // full first and last interior rows
    let mut edge_rows = vec![1];
    if rows > 1 {
        edge_rows.push(rows);
    }
    for i in edge_rows {
        sweep_row(&mut d[i * stride..(i + 1) * stride], s, stride, i, 1..cols + 1, hsq);
    }
    // first and last column of the rows in between
    for i in 2..rows {
        let row = &mut d[i * stride..(i + 1) * stride];
        sweep_row(row, s, stride, i, 1..2, hsq);
        if cols > 1 {
            sweep_row(row, s, stride, i, cols..cols + 1, hsq);
        }
    }
}

#[cfg(not(feature = "rayon"))]
fn update_interior(dst: &mut LocalTile, src: &LocalTile, hsq: f64) {
    let (rows, cols, stride) = (src.rows(), src.cols(), src.stride());
    if rows < 3 || cols < 3 {
        return;
    }
    let s = src.as_slice();
    dst.as_mut_slice()
        .chunks_mut(stride)
        .enumerate()
        .take(rows)
        .skip(2)
        .for_each(|(i, row)| sweep_row(row, s, stride, i, 2..cols, hsq));
}

#[cfg(feature = "rayon")]
fn update_interior(dst: &mut LocalTile, src: &LocalTile, hsq: f64) {
    use rayon::prelude::*;
    let (rows, cols, stride) = (src.rows(), src.cols(), src.stride());
    if rows < 3 || cols < 3 {
        return;
    }
    let s = src.as_slice();
    dst.as_mut_slice()
        .par_chunks_mut(stride)
        .enumerate()
        .take(rows)
        .skip(2)
        .for_each(|(i, row)| sweep_row(row, s, stride, i, 2..cols, hsq));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_tile(rows: usize, cols: usize, seed: u64) -> LocalTile {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut t = LocalTile::new(rows, cols);
        for i in 0..rows + 2 {
            for j in 0..cols + 2 {
                t[(i, j)] = rng.r#gen::<f64>();
            }
        }
        t
    }

    fn naive(src: &LocalTile, hsq: f64) -> LocalTile {
        let mut out = LocalTile::new(src.rows(), src.cols());
        for i in 1..=src.rows() {
            for j in 1..=src.cols() {
                out[(i, j)] = 0.25
                    * (hsq + src[(i, j + 1)] + src[(i, j - 1)] + src[(i - 1, j)] + src[(i + 1, j)]);
            }
        }
        out
    }

    #[test]
    fn regions_cover_interior_exactly_once() {
        for &(rows, cols) in &[(1, 1), (1, 5), (2, 2), (2, 7), (3, 3), (6, 4), (9, 9)] {
            let src = random_tile(rows, cols, 7);
            let mut split = LocalTile::new(rows, cols);
            update(&mut split, &src, Region::Boundary, 0.01);
            update(&mut split, &src, Region::Interior, 0.01);
            assert_eq!(split, naive(&src, 0.01), "shape {rows}x{cols}");
        }
    }

    #[test]
    fn boundary_leaves_strict_interior_alone() {
        let src = random_tile(5, 5, 3);
        let mut dst = LocalTile::new(5, 5);
        dst[(3, 3)] = -1.0;
        update(&mut dst, &src, Region::Boundary, 0.0);
        assert_eq!(dst[(3, 3)], -1.0);
        assert_ne!(dst[(1, 3)], 0.0);
        assert_ne!(dst[(3, 5)], 0.0);
    }

    #[test]
    fn interior_leaves_ring_and_ghosts_alone() {
        let src = random_tile(4, 4, 11);
        let mut dst = LocalTile::new(4, 4);
        update(&mut dst, &src, Region::Interior, 0.5);
        for i in 0..6 {
            for j in 0..6 {
                let strict = (2..=3).contains(&i) && (2..=3).contains(&j);
                assert_eq!(dst[(i, j)] != 0.0, strict, "cell ({i}, {j})");
            }
        }
    }

    #[test]
    fn zero_tile_gets_forcing_only() {
        let src = LocalTile::new(3, 3);
        let mut dst = LocalTile::new(3, 3);
        update(&mut dst, &src, Region::All, 0.04);
        assert!(dst.interior().iter().all(|&v| v == 0.01));
    }
}
