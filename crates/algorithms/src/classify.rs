//! Per-frame water classification
//!
//! Turns one monthly backscatter frame into a binary wet/dry mask:
//! pick a threshold from the frame's finite samples, mark every valid
//! pixel at or below it as wet, then optionally smooth the mask with
//! majority voting.

use hydrospan_core::{ClassifiedMask, Raster, RasterFrame, Result};

use crate::majority::majority_filter;
use crate::threshold::{select_threshold, ThresholdMethod};

/// Settings for a single classification run.
#[derive(Debug, Clone)]
pub struct ClassifyParams {
    /// How the wet/dry cut is chosen per frame.
    pub method: ThresholdMethod,
    /// When set, every frame uses this value instead of a per-frame
    /// selection. Used to classify a whole stack against the median of
    /// the per-frame thresholds.
    pub global_threshold: Option<f64>,
    /// Minimum 3x3 votes for the majority filter; `<= 0` disables it.
    pub min_neighbors: i32,
    /// Majority filter passes.
    pub neighbor_iterations: i32,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::Otsu,
            global_threshold: None,
            min_neighbors: 0,
            neighbor_iterations: 1,
        }
    }
}

/// Classify one frame into a wet mask.
///
/// Water is dark in radar backscatter, so wet means valid AND at or
/// below the threshold. A frame with no finite samples yields an
/// all-dry mask and `threshold: None`.
pub fn classify_frame(frame: &RasterFrame, params: &ClassifyParams) -> Result<ClassifiedMask> {
    let valid = frame.valid_mask();

    let threshold = match params.global_threshold {
        Some(t) => {
            // Even in global mode an all-nodata frame carries no threshold
            if frame.finite_samples().is_empty() {
                None
            } else {
                Some(t)
            }
        }
        None => select_threshold(&frame.finite_samples(), &params.method)?,
    };

    let wet = match threshold {
        Some(t) => {
            let (rows, cols) = frame.samples.shape();
            let mut mask: Raster<u8> = valid.like(0);
            for row in 0..rows {
                for col in 0..cols {
                    let v = unsafe { frame.samples.get_unchecked(row, col) };
                    if unsafe { valid.get_unchecked(row, col) } == 1 && v <= t {
                        unsafe { mask.set_unchecked(row, col, 1) };
                    }
                }
            }
            majority_filter(&mask, params.min_neighbors, params.neighbor_iterations)?
        }
        None => valid.like(0),
    };

    Ok(ClassifiedMask {
        date: frame.date,
        wet,
        valid,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn frame_from(rows: usize, cols: usize, values: Vec<f64>) -> RasterFrame {
        RasterFrame {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            samples: Raster::from_vec(values, rows, cols).unwrap(),
        }
    }

    #[test]
    fn test_fixed_threshold_classification() {
        let frame = frame_from(
            4,
            4,
            vec![
                -20.0, -20.0, -20.0, -20.0, //
                -20.0, 5.0, 5.0, -20.0, //
                -20.0, 5.0, 5.0, -20.0, //
                -20.0, -20.0, -20.0, -20.0,
            ],
        );
        let params = ClassifyParams {
            method: ThresholdMethod::Fixed(0.0),
            ..ClassifyParams::default()
        };
        let mask = classify_frame(&frame, &params).unwrap();
        assert_eq!(mask.threshold, Some(0.0));
        assert_eq!(mask.wet_pixels(), 12);
        assert_eq!(mask.valid_pixels(), 16);
        for (r, c) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            assert_eq!(mask.wet.get(r, c).unwrap(), 0);
        }
    }

    #[test]
    fn test_nodata_pixels_never_wet() {
        let frame = frame_from(2, 2, vec![-20.0, f64::NAN, f64::NAN, -18.0]);
        let params = ClassifyParams {
            method: ThresholdMethod::Fixed(0.0),
            ..ClassifyParams::default()
        };
        let mask = classify_frame(&frame, &params).unwrap();
        assert_eq!(mask.wet_pixels(), 2);
        assert_eq!(mask.valid_pixels(), 2);
        assert_eq!(mask.wet.get(0, 1).unwrap(), 0);
        assert_eq!(mask.wet.get(1, 0).unwrap(), 0);
    }

    #[test]
    fn test_all_nodata_frame_has_no_threshold() {
        let frame = frame_from(2, 2, vec![f64::NAN; 4]);
        for params in [
            ClassifyParams {
                method: ThresholdMethod::Fixed(-16.0),
                ..ClassifyParams::default()
            },
            ClassifyParams {
                global_threshold: Some(-16.0),
                ..ClassifyParams::default()
            },
        ] {
            let mask = classify_frame(&frame, &params).unwrap();
            assert_eq!(mask.threshold, None);
            assert_eq!(mask.wet_pixels(), 0);
            assert_eq!(mask.wet_fraction(), None);
        }
    }

    #[test]
    fn test_global_threshold_overrides_method() {
        let frame = frame_from(2, 2, vec![-20.0, -20.0, 5.0, 5.0]);
        let params = ClassifyParams {
            method: ThresholdMethod::Fixed(-30.0),
            global_threshold: Some(0.0),
            ..ClassifyParams::default()
        };
        let mask = classify_frame(&frame, &params).unwrap();
        assert_eq!(mask.threshold, Some(0.0));
        assert_eq!(mask.wet_pixels(), 2);
    }

    #[test]
    fn test_majority_filter_applied_after_thresholding() {
        // A single wet speckle surrounded by dry land disappears
        let mut values = vec![5.0; 25];
        values[12] = -20.0;
        let frame = frame_from(5, 5, values);
        let params = ClassifyParams {
            method: ThresholdMethod::Fixed(0.0),
            min_neighbors: 3,
            neighbor_iterations: 1,
            ..ClassifyParams::default()
        };
        let mask = classify_frame(&frame, &params).unwrap();
        assert_eq!(mask.wet_pixels(), 0);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let frame = frame_from(1, 3, vec![-16.0, -15.999, -17.0]);
        let params = ClassifyParams {
            method: ThresholdMethod::Fixed(-16.0),
            ..ClassifyParams::default()
        };
        let mask = classify_frame(&frame, &params).unwrap();
        assert_eq!(mask.wet.get(0, 0).unwrap(), 1);
        assert_eq!(mask.wet.get(0, 1).unwrap(), 0);
        assert_eq!(mask.wet.get(0, 2).unwrap(), 1);
    }
}
