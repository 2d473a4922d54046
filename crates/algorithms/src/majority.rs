//! 3x3 majority filtering of binary masks
//!
//! Radar-derived water masks are speckled; a few rounds of neighborhood
//! voting removes isolated wet pixels and fills pinholes without moving
//! the water boundary much.

use ndarray::Array2;

use hydrospan_core::{Error, Raster, Result};

use crate::maybe_rayon::*;

/// Iteratively smooth a binary mask with 3x3-neighborhood voting.
///
/// Each iteration pads the mask by one cell with edge replication, sums
/// the full 3x3 window (the center cell counts as one of the nine), and
/// keeps a cell wet iff the sum reaches `min_neighbors`. Iterations chain,
/// each consuming the previous output; `iterations < 1` is normalized
/// to a single pass.
///
/// `min_neighbors <= 0` is a no-op; values above 9 are rejected because a
/// 3x3 window has at most 9 cells.
pub fn majority_filter(
    mask: &Raster<u8>,
    min_neighbors: i32,
    iterations: i32,
) -> Result<Raster<u8>> {
    if min_neighbors <= 0 {
        return Ok(mask.clone());
    }
    if min_neighbors > 9 {
        return Err(Error::invalid_parameter(
            "min_neighbors",
            min_neighbors,
            "must be between 1 and 9 for a 3x3 neighborhood",
        ));
    }

    let (rows, cols) = mask.shape();
    let mut current = mask.clone();

    for _ in 0..iterations.max(1) {
        let voted: Vec<u8> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![0u8; cols];
                for (col, out) in row_data.iter_mut().enumerate() {
                    let mut sum: u32 = 0;
                    for dr in -1i64..=1 {
                        for dc in -1i64..=1 {
                            // Edge replication: out-of-bounds neighbors
                            // clamp to the nearest interior cell
                            let nr = (row as i64 + dr).clamp(0, rows as i64 - 1) as usize;
                            let nc = (col as i64 + dc).clamp(0, cols as i64 - 1) as usize;
                            sum += unsafe { current.get_unchecked(nr, nc) } as u32;
                        }
                    }
                    *out = u8::from(sum >= min_neighbors as u32);
                }
                row_data
            })
            .collect();

        let mut next = current.like(0);
        *next.data_mut() = Array2::from_shape_vec((rows, cols), voted)
            .map_err(|e| Error::Other(e.to_string()))?;
        current = next;
    }

    Ok(current)
}
