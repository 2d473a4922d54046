//! Affine placement of a raster grid

use serde::{Deserialize, Serialize};

/// Affine placement for a north-up raster grid.
///
/// Monthly backscatter frames arrive on axis-aligned lon/lat grids, so the
/// rotation terms of a full affine transform are always zero here:
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
/// `origin_x`/`origin_y` locate the upper-left corner of the grid and
/// `pixel_height` is negative for north-up data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X direction
    pub pixel_width: f64,
    /// Cell size in Y direction (negative for north-up)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Coordinates of the center of pixel (col, row).
    ///
    /// Centroid math uses cell centers, not corners.
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Coordinates of the top-left corner of pixel (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + col as f64 * self.pixel_width,
            self.origin_y + row as f64 * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates of a geographic point
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
            return (f64::NAN, f64::NAN);
        }
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Cell size (assumes square pixels)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Bounding box (min_x, min_y, max_x, max_y) for a grid of given size
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(cols, rows);
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_center() {
        let gt = GeoTransform::new(-64.0, -13.0, 0.001, -0.001);
        let (x, y) = gt.pixel_to_geo(0, 0);
        assert_relative_eq!(x, -64.0 + 0.0005, epsilon = 1e-12);
        assert_relative_eq!(y, -13.0 - 0.0005, epsilon = 1e-12);
    }

    #[test]
    fn test_geo_to_pixel_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);
        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);
        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }
}
