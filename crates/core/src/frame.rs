//! Water time-series data model
//!
//! One run works over a chronological sequence of monthly backscatter
//! frames. Each frame is classified into a wet/dry mask, consecutive masks
//! are diffed into change rasters, and the whole sequence folds into
//! frequency/permanence products. All entities here are created once while
//! iterating the sequence and never mutated afterwards.

use chrono::NaiveDate;

use crate::raster::Raster;

/// Change code: dry in the previous frame, wet in the current one
pub const CHANGE_GAIN: i8 = 1;
/// Change code: wet in the previous frame, dry in the current one
pub const CHANGE_LOSS: i8 = -1;
/// Change code: no wet-flag transition
pub const CHANGE_STABLE: i8 = 0;

/// One month of radar backscatter over the fixed grid.
///
/// Validity is not stored separately: a sample is meaningful exactly where
/// it is finite. Non-finite cells are missing data, never zero.
#[derive(Debug, Clone)]
pub struct RasterFrame {
    /// Acquisition date (first day of the month for monthly composites)
    pub date: NaiveDate,
    /// Backscatter samples in dB; NaN where the composite has no data
    pub samples: Raster<f64>,
}

impl RasterFrame {
    pub fn new(date: NaiveDate, samples: Raster<f64>) -> Self {
        Self { date, samples }
    }

    /// Binary validity mask: 1 where the sample is finite
    pub fn valid_mask(&self) -> Raster<u8> {
        let mut valid: Raster<u8> = self.samples.with_same_meta();
        for (out, &v) in valid.data_mut().iter_mut().zip(self.samples.data().iter()) {
            *out = u8::from(v.is_finite());
        }
        valid
    }

    /// All finite samples, in row-major order
    pub fn finite_samples(&self) -> Vec<f64> {
        self.samples
            .data()
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect()
    }
}

/// One frame's wet/dry classification.
///
/// Invariant: `wet[i,j] == 1` implies `valid[i,j] == 1`. `threshold` is
/// `None` for a frame with zero finite samples; such a mask is all-dry.
#[derive(Debug, Clone)]
pub struct ClassifiedMask {
    pub date: NaiveDate,
    /// 1 = water, 0 = dry/unknown
    pub wet: Raster<u8>,
    /// 1 = finite sample present
    pub valid: Raster<u8>,
    /// Scalar cutoff used for this frame (shared across frames in global mode)
    pub threshold: Option<f64>,
}

impl ClassifiedMask {
    pub fn wet_pixels(&self) -> usize {
        self.wet.count_where(|v| v == 1)
    }

    pub fn valid_pixels(&self) -> usize {
        self.valid.count_where(|v| v == 1)
    }

    /// Wet share of the valid area; `None` when the frame has no valid cells
    pub fn wet_fraction(&self) -> Option<f64> {
        let valid = self.valid_pixels();
        if valid == 0 {
            return None;
        }
        Some(self.wet_pixels() as f64 / valid as f64)
    }
}

/// Signed wet-flag transition relative to the immediately preceding frame.
///
/// The first frame of a run has no change raster. Codes are derived from
/// the wet flags alone: a cell that is invalid in one of the two frames can
/// still register as gain or loss.
#[derive(Debug, Clone)]
pub struct ChangeRaster {
    pub date: NaiveDate,
    /// +1 gain, -1 loss, 0 stable
    pub code: Raster<i8>,
}

impl ChangeRaster {
    /// Binary gain mask (dry -> wet)
    pub fn gain_mask(&self) -> Raster<u8> {
        self.binary(CHANGE_GAIN)
    }

    /// Binary loss mask (wet -> dry)
    pub fn loss_mask(&self) -> Raster<u8> {
        self.binary(CHANGE_LOSS)
    }

    pub fn gain_pixels(&self) -> usize {
        self.code.count_where(|v| v == CHANGE_GAIN)
    }

    pub fn loss_pixels(&self) -> usize {
        self.code.count_where(|v| v == CHANGE_LOSS)
    }

    fn binary(&self, which: i8) -> Raster<u8> {
        let mut out: Raster<u8> = self.code.with_same_meta();
        for (o, &c) in out.data_mut().iter_mut().zip(self.code.data().iter()) {
            *o = u8::from(c == which);
        }
        out
    }
}

/// Run-level temporal aggregate over all classified frames.
#[derive(Debug, Clone)]
pub struct FrequencyProduct {
    /// Count of frames in which each cell was wet
    pub months_wet: Raster<i32>,
    /// Count of frames in which each cell had a valid sample
    pub valid_months: Raster<i32>,
    /// `months_wet / valid_months`; NaN where no frame was ever valid
    pub fraction: Raster<f64>,
    /// 1 where `months_wet >= permanence_threshold` and at least one valid month
    pub permanent: Raster<u8>,
    /// Median of the defined per-frame thresholds (diagnostic)
    pub median_threshold: Option<f64>,
    /// Permanence cutoff the product was built with
    pub permanence_threshold: i32,
}

impl FrequencyProduct {
    pub fn permanent_pixels(&self) -> usize {
        self.permanent.count_where(|v| v == 1)
    }
}

/// Wet-area centroid for one frame.
///
/// Omitted entirely (the tracker returns `None`) when the frame's wet-pixel
/// count is under the configured floor, so near-empty masks never produce a
/// noise-driven centroid. `shift_km` needs a preceding defined centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub date: NaiveDate,
    pub lon: f64,
    pub lat: f64,
    /// Great-circle distance from the last defined centroid
    pub shift_km: Option<f64>,
}

/// Per-frame digest for the tabular run summary.
#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub date: NaiveDate,
    pub threshold: Option<f64>,
    pub wet_pixels: usize,
    pub valid_pixels: usize,
    pub wet_fraction: Option<f64>,
    pub centroid: Option<Centroid>,
    /// Where the mask raster was persisted, when it was
    pub mask_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn test_valid_mask_tracks_finiteness() {
        let samples =
            Raster::from_vec(vec![1.0, f64::NAN, -3.5, f64::INFINITY], 2, 2).unwrap();
        let frame = RasterFrame::new(date(2025, 1), samples);
        let valid = frame.valid_mask();
        assert_eq!(valid.get(0, 0).unwrap(), 1);
        assert_eq!(valid.get(0, 1).unwrap(), 0);
        assert_eq!(valid.get(1, 0).unwrap(), 1);
        assert_eq!(valid.get(1, 1).unwrap(), 0);
        assert_eq!(frame.finite_samples(), vec![1.0, -3.5]);
    }

    #[test]
    fn test_wet_fraction() {
        let mut wet: Raster<u8> = Raster::new(2, 2);
        let mut valid: Raster<u8> = Raster::new(2, 2);
        wet.set(0, 0, 1).unwrap();
        valid.set(0, 0, 1).unwrap();
        valid.set(0, 1, 1).unwrap();
        let mask = ClassifiedMask {
            date: date(2025, 1),
            wet,
            valid,
            threshold: Some(-16.0),
        };
        assert_eq!(mask.wet_pixels(), 1);
        assert_eq!(mask.valid_pixels(), 2);
        assert_eq!(mask.wet_fraction(), Some(0.5));
    }

    #[test]
    fn test_change_masks() {
        let code = Raster::from_vec(vec![1, -1, 0, 1], 2, 2).unwrap();
        let change = ChangeRaster {
            date: date(2025, 2),
            code,
        };
        assert_eq!(change.gain_pixels(), 2);
        assert_eq!(change.loss_pixels(), 1);
        assert_eq!(change.gain_mask().get(0, 0).unwrap(), 1);
        assert_eq!(change.loss_mask().get(0, 1).unwrap(), 1);
        assert_eq!(change.gain_mask().get(1, 0).unwrap(), 0);
    }
}
