//! Water-body centroid tracking
//!
//! Reduces each monthly wet mask to the mean position of its wet cell
//! centers and measures how far that position moved between months.

use hydrospan_core::{Centroid, ClassifiedMask};

/// Mean Earth radius in kilometers (IUGG R1).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Tracks the month-to-month drift of a water body's centroid.
///
/// Frames with fewer wet pixels than `min_wet_pixels` are skipped: they
/// yield no centroid and, crucially, do not replace the remembered
/// position, so the next qualifying frame measures its shift against
/// the last qualifying one rather than against noise.
#[derive(Debug, Clone)]
pub struct CentroidTracker {
    previous: Option<(f64, f64)>,
    min_wet_pixels: usize,
}

impl CentroidTracker {
    pub fn new(min_wet_pixels: usize) -> Self {
        Self {
            previous: None,
            min_wet_pixels,
        }
    }

    /// Compute the wet centroid of `mask`, or `None` when the frame is
    /// below the pixel floor. The first qualifying frame has no shift.
    pub fn track(&mut self, mask: &ClassifiedMask) -> Option<Centroid> {
        let (rows, cols) = mask.wet.shape();
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut count = 0usize;
        for row in 0..rows {
            for col in 0..cols {
                if unsafe { mask.wet.get_unchecked(row, col) } == 1 {
                    let (x, y) = mask.wet.pixel_to_geo(col, row);
                    sum_x += x;
                    sum_y += y;
                    count += 1;
                }
            }
        }

        if count < self.min_wet_pixels.max(1) {
            return None;
        }

        let lon = sum_x / count as f64;
        let lat = sum_y / count as f64;
        let shift_km = self
            .previous
            .map(|(plon, plat)| haversine_km(plon, plat, lon, lat));
        self.previous = Some((lon, lat));

        Some(Centroid {
            date: mask.date,
            lon,
            lat,
            shift_km,
        })
    }
}

/// Great-circle distance between two lon/lat points in kilometers.
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
