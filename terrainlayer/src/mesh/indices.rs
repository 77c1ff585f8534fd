//! Index buffers for regular vertex grids.

use crate::error::{TerrainError, TerrainResult};

/// Largest vertex count a 16-bit index buffer can address.
pub const MAX_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

/// Fails if a `width × height` vertex grid cannot be indexed with `u16`.
pub fn check_index_range(width: u32, height: u32) -> TerrainResult<()> {
    if width as usize * height as usize > MAX_INDEXED_VERTICES {
        return Err(TerrainError::Transform(format!(
            "{}x{} vertex grid exceeds 16-bit indices",
            width, height
        )));
    }
    Ok(())
}

/// Triangle indices for a `width × height` grid of vertices in row-major order.
///
/// Every cell is split into two counter-clockwise triangles sharing the
/// diagonal from the lower-left to the upper-right vertex.
///
/// # Errors
///
/// Returns [`TerrainError::Transform`] if the grid has more vertices than
/// `u16` can index.
pub fn regular_grid_indices(width: u32, height: u32) -> TerrainResult<Vec<u16>> {
    check_index_range(width, height)?;
    if width < 2 || height < 2 {
        return Ok(Vec::new());
    }

    let mut indices = Vec::with_capacity(6 * (width as usize - 1) * (height as usize - 1));
    let mut index: u32 = 0;
    for _ in 0..height - 1 {
        for _ in 0..width - 1 {
            let upper_left = index;
            let lower_left = upper_left + width;
            let lower_right = lower_left + 1;
            let upper_right = upper_left + 1;

            indices.extend(
                [
                    upper_left,
                    lower_left,
                    upper_right,
                    upper_right,
                    lower_left,
                    lower_right,
                ]
                .map(|i| i as u16),
            );
            index += 1;
        }
        index += 1;
    }
    Ok(indices)
}
