//! Month-over-month change coding
//!
//! Compares consecutive wet masks and codes every pixel as gained
//! water, lost water, or stable.

use hydrospan_core::{
    ChangeRaster, ClassifiedMask, Error, Raster, Result, CHANGE_GAIN, CHANGE_LOSS, CHANGE_STABLE,
};

/// Code the transition from `previous` to `current`.
///
/// Gain is dry-to-wet, loss is wet-to-dry, everything else is stable.
/// Only the wet flags are compared; a pixel that dropped out of
/// observation reads as dry, so a wet pixel going nodata codes as loss.
/// The result carries the current frame's date.
pub fn change_vs_previous(
    previous: &ClassifiedMask,
    current: &ClassifiedMask,
) -> Result<ChangeRaster> {
    previous.wet.check_same_shape(&current.wet)?;
    if current.date <= previous.date {
        return Err(Error::SequenceOrderViolation {
            prev: previous.date,
            next: current.date,
        });
    }

    let (rows, cols) = current.wet.shape();
    let mut code: Raster<i8> = current.wet.with_same_meta();
    for row in 0..rows {
        for col in 0..cols {
            unsafe {
                let before = previous.wet.get_unchecked(row, col) == 1;
                let after = current.wet.get_unchecked(row, col) == 1;
                let c = match (before, after) {
                    (false, true) => CHANGE_GAIN,
                    (true, false) => CHANGE_LOSS,
                    _ => CHANGE_STABLE,
                };
                code.set_unchecked(row, col, c);
            }
        }
    }

    Ok(ChangeRaster {
        date: current.date,
        code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn mask(month: u32, wet: &[u8], valid: &[u8]) -> ClassifiedMask {
        ClassifiedMask {
            date: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
            wet: Raster::from_vec(wet.to_vec(), 2, 2).unwrap(),
            valid: Raster::from_vec(valid.to_vec(), 2, 2).unwrap(),
            threshold: Some(-16.0),
        }
    }

    #[test]
    fn test_gain_loss_stable_codes() {
        let prev = mask(1, &[1, 0, 1, 0], &[1; 4]);
        let curr = mask(2, &[1, 1, 0, 0], &[1; 4]);
        let change = change_vs_previous(&prev, &curr).unwrap();
        assert_eq!(change.code.get(0, 0).unwrap(), CHANGE_STABLE);
        assert_eq!(change.code.get(0, 1).unwrap(), CHANGE_GAIN);
        assert_eq!(change.code.get(1, 0).unwrap(), CHANGE_LOSS);
        assert_eq!(change.code.get(1, 1).unwrap(), CHANGE_STABLE);
        assert_eq!(change.gain_pixels(), 1);
        assert_eq!(change.loss_pixels(), 1);
        assert_eq!(change.date, curr.date);
    }

    #[test]
    fn test_validity_does_not_mask_changes() {
        // A wet pixel that became unobserved counts as loss: only the
        // wet flags are compared
        let prev = mask(1, &[1, 0, 0, 0], &[1; 4]);
        let curr = mask(2, &[0, 0, 0, 0], &[0, 1, 1, 1]);
        let change = change_vs_previous(&prev, &curr).unwrap();
        assert_eq!(change.code.get(0, 0).unwrap(), CHANGE_LOSS);
    }

    #[test]
    fn test_gain_and_loss_masks() {
        let prev = mask(1, &[1, 1, 0, 0], &[1; 4]);
        let curr = mask(2, &[0, 1, 1, 0], &[1; 4]);
        let change = change_vs_previous(&prev, &curr).unwrap();
        let gain = change.gain_mask();
        let loss = change.loss_mask();
        assert_eq!(gain.get(1, 0).unwrap(), 1);
        assert_eq!(gain.count_where(|v| v == 1), 1);
        assert_eq!(loss.get(0, 0).unwrap(), 1);
        assert_eq!(loss.count_where(|v| v == 1), 1);
    }

    #[test]
    fn test_out_of_order_frames_rejected() {
        let prev = mask(2, &[0; 4], &[1; 4]);
        let curr = mask(1, &[0; 4], &[1; 4]);
        assert!(matches!(
            change_vs_previous(&prev, &curr),
            Err(Error::SequenceOrderViolation { .. })
        ));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let prev = mask(1, &[0; 4], &[1; 4]);
        let curr = ClassifiedMask {
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            wet: Raster::from_vec(vec![0; 4], 1, 4).unwrap(),
            valid: Raster::from_vec(vec![1; 4], 1, 4).unwrap(),
            threshold: None,
        };
        assert!(matches!(
            change_vs_previous(&prev, &curr),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
