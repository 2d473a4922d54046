//! Temporal aggregation of monthly water masks
//!
//! Stacks classified masks into per-pixel wet counts and a permanence
//! product: how often each cell was wet across the record, and which
//! cells were wet often enough to call permanent water.

use hydrospan_core::{ClassifiedMask, Error, FrequencyProduct, Raster, Result};

/// Aggregate a chronologically sorted mask sequence into a frequency
/// product.
///
/// Frames must share one grid shape and must be strictly ascending by
/// date; an unsorted or duplicated date fails rather than silently
/// producing counts from a shuffled record. A pixel is permanent when
/// it was observed at least once and wet in at least
/// `permanence_threshold` months. Frames whose threshold selection
/// failed still contribute their (all-dry, all-invalid) masks; the
/// product's `median_threshold` is the median of the thresholds that
/// were defined, or `None` if none were.
pub fn aggregate_masks(
    masks: &[ClassifiedMask],
    permanence_threshold: i32,
) -> Result<FrequencyProduct> {
    let first = masks.first().ok_or(Error::EmptyTimeSeries)?;
    if permanence_threshold < 1 {
        return Err(Error::invalid_parameter(
            "permanence_threshold",
            permanence_threshold,
            "must be at least 1 month",
        ));
    }

    let (rows, cols) = first.wet.shape();
    let mut months_wet: Raster<i32> = first.wet.with_same_meta();
    let mut valid_months: Raster<i32> = first.wet.with_same_meta();

    let mut prev_date = None;
    for mask in masks {
        if let Some(prev) = prev_date {
            if mask.date <= prev {
                return Err(Error::SequenceOrderViolation {
                    prev,
                    next: mask.date,
                });
            }
        }
        prev_date = Some(mask.date);
        months_wet.check_same_shape(&mask.wet)?;

        for row in 0..rows {
            for col in 0..cols {
                unsafe {
                    if mask.wet.get_unchecked(row, col) == 1 {
                        let n = months_wet.get_unchecked(row, col);
                        months_wet.set_unchecked(row, col, n + 1);
                    }
                    if mask.valid.get_unchecked(row, col) == 1 {
                        let n = valid_months.get_unchecked(row, col);
                        valid_months.set_unchecked(row, col, n + 1);
                    }
                }
            }
        }
    }

    let mut fraction: Raster<f64> = months_wet.with_same_meta();
    fraction.set_nodata(Some(f64::NAN));
    let mut permanent: Raster<u8> = months_wet.with_same_meta();
    for row in 0..rows {
        for col in 0..cols {
            unsafe {
                let wet = months_wet.get_unchecked(row, col);
                let valid = valid_months.get_unchecked(row, col);
                if valid > 0 {
                    fraction.set_unchecked(row, col, wet as f64 / valid as f64);
                    if wet >= permanence_threshold {
                        permanent.set_unchecked(row, col, 1);
                    }
                } else {
                    // Never-observed cells stay undefined rather than 0
                    fraction.set_unchecked(row, col, f64::NAN);
                }
            }
        }
    }

    let mut thresholds: Vec<f64> = masks.iter().filter_map(|m| m.threshold).collect();
    let median_threshold = median(&mut thresholds);

    Ok(FrequencyProduct {
        months_wet,
        valid_months,
        fraction,
        permanent,
        median_threshold,
        permanence_threshold,
    })
}

/// Cells wet this month but outside the permanent water body. These are
/// the flood/overflow pixels of interest in a seasonal record.
pub fn overflow_mask(mask: &ClassifiedMask, product: &FrequencyProduct) -> Result<Raster<u8>> {
    mask.wet.check_same_shape(&product.permanent)?;
    let (rows, cols) = mask.wet.shape();
    let mut out: Raster<u8> = mask.wet.with_same_meta();
    for row in 0..rows {
        for col in 0..cols {
            unsafe {
                if mask.wet.get_unchecked(row, col) == 1
                    && product.permanent.get_unchecked(row, col) == 0
                {
                    out.set_unchecked(row, col, 1);
                }
            }
        }
    }
    Ok(out)
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn mask(
        year: i32,
        month: u32,
        wet: &[u8],
        valid: &[u8],
        threshold: Option<f64>,
    ) -> ClassifiedMask {
        ClassifiedMask {
            date: NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
            wet: Raster::from_vec(wet.to_vec(), 2, 2).unwrap(),
            valid: Raster::from_vec(valid.to_vec(), 2, 2).unwrap(),
            threshold,
        }
    }

    #[test]
    fn test_counts_and_fraction() {
        let masks = vec![
            mask(2024, 1, &[1, 1, 0, 0], &[1, 1, 1, 0], Some(-16.0)),
            mask(2024, 2, &[1, 0, 0, 0], &[1, 1, 1, 0], Some(-17.0)),
            mask(2024, 3, &[1, 0, 1, 0], &[1, 1, 1, 0], Some(-15.0)),
        ];
        let product = aggregate_masks(&masks, 3).unwrap();
        assert_eq!(product.months_wet.get(0, 0).unwrap(), 3);
        assert_eq!(product.months_wet.get(0, 1).unwrap(), 1);
        assert_eq!(product.valid_months.get(1, 1).unwrap(), 0);
        assert!((product.fraction.get(0, 0).unwrap() - 1.0).abs() < 1e-12);
        assert!((product.fraction.get(0, 1).unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!(product.fraction.get(1, 1).unwrap().is_nan());
        assert_eq!(product.median_threshold, Some(-16.0));
    }

    #[test]
    fn test_permanence_threshold() {
        let masks = vec![
            mask(2024, 1, &[1, 1, 0, 0], &[1, 1, 1, 1], Some(-16.0)),
            mask(2024, 2, &[1, 0, 0, 0], &[1, 1, 1, 1], Some(-16.0)),
        ];
        let product = aggregate_masks(&masks, 2).unwrap();
        assert_eq!(product.permanent.get(0, 0).unwrap(), 1);
        assert_eq!(product.permanent.get(0, 1).unwrap(), 0);
        assert_eq!(product.permanent_pixels(), 1);
    }

    #[test]
    fn test_raising_permanence_threshold_never_adds_pixels() {
        let masks: Vec<_> = (1..=6)
            .map(|m| mask(2024, m, &[1, (m % 2) as u8, 0, 1], &[1, 1, 1, 1], Some(-16.0)))
            .collect();
        let mut prev = usize::MAX;
        for t in 1..=6 {
            let count = aggregate_masks(&masks, t).unwrap().permanent_pixels();
            assert!(count <= prev);
            prev = count;
        }
    }

    #[test]
    fn test_never_observed_pixel_never_permanent() {
        // Wet flags without valid observations must not create permanence
        let masks = vec![
            mask(2024, 1, &[1, 0, 0, 0], &[0, 1, 1, 1], Some(-16.0)),
            mask(2024, 2, &[1, 0, 0, 0], &[0, 1, 1, 1], Some(-16.0)),
        ];
        let product = aggregate_masks(&masks, 1).unwrap();
        assert_eq!(product.permanent.get(0, 0).unwrap(), 0);
        assert!(product.fraction.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_unsorted_dates_rejected() {
        let masks = vec![
            mask(2024, 3, &[0; 4], &[1; 4], None),
            mask(2024, 1, &[0; 4], &[1; 4], None),
        ];
        assert!(matches!(
            aggregate_masks(&masks, 1),
            Err(Error::SequenceOrderViolation { .. })
        ));
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let masks = vec![
            mask(2024, 1, &[0; 4], &[1; 4], None),
            mask(2024, 1, &[0; 4], &[1; 4], None),
        ];
        assert!(matches!(
            aggregate_masks(&masks, 1),
            Err(Error::SequenceOrderViolation { .. })
        ));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        assert!(matches!(
            aggregate_masks(&[], 1),
            Err(Error::EmptyTimeSeries)
        ));
    }

    #[test]
    fn test_median_of_even_count_interpolates() {
        let masks = vec![
            mask(2024, 1, &[0; 4], &[1; 4], Some(-18.0)),
            mask(2024, 2, &[0; 4], &[1; 4], None),
            mask(2024, 3, &[0; 4], &[1; 4], Some(-14.0)),
        ];
        let product = aggregate_masks(&masks, 1).unwrap();
        assert_eq!(product.median_threshold, Some(-16.0));
    }

    #[test]
    fn test_overflow_excludes_permanent_water() {
        let masks = vec![
            mask(2024, 1, &[1, 1, 0, 0], &[1, 1, 1, 1], Some(-16.0)),
            mask(2024, 2, &[1, 0, 1, 0], &[1, 1, 1, 1], Some(-16.0)),
        ];
        let product = aggregate_masks(&masks, 2).unwrap();
        let overflow = overflow_mask(&masks[1], &product).unwrap();
        assert_eq!(overflow.get(0, 0).unwrap(), 0); // permanent
        assert_eq!(overflow.get(1, 0).unwrap(), 1); // seasonal
        assert_eq!(overflow.get(0, 1).unwrap(), 0); // dry this month
    }
}
