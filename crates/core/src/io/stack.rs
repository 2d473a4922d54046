//! Date-keyed GeoTIFF frame stacks
//!
//! Monthly backscatter frames are exchanged as directories of GeoTIFFs with
//! a date-suffixed stem, e.g. `backscatter_2025-03-01.tif`. Month-level
//! stems (`..._2025-03.tif`) map to the first day of that month.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::frame::RasterFrame;
use crate::io::native::read_geotiff;

/// Parse the trailing date key of a file stem.
///
/// Accepts `*_YYYY-MM-DD` and `*_YYYY-MM`; returns `None` for stems that
/// carry no recognizable date.
pub fn parse_date_key(stem: &str) -> Option<NaiveDate> {
    let tail = stem.rsplit('_').next()?;
    if tail.len() == 10 {
        return NaiveDate::parse_from_str(tail, "%Y-%m-%d").ok();
    }
    if tail.len() == 7 {
        return NaiveDate::parse_from_str(&format!("{}-01", tail), "%Y-%m-%d").ok();
    }
    None
}

/// Read every date-keyed GeoTIFF under `dir` into a chronological frame
/// sequence.
///
/// Files without a parsable date suffix are skipped. Fails with
/// [`Error::EmptyTimeSeries`] when no frame is found.
pub fn read_frame_stack<P: AsRef<Path>>(dir: P) -> Result<Vec<RasterFrame>> {
    let dir = dir.as_ref();
    let mut dated: Vec<(NaiveDate, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("tif") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(date) = parse_date_key(stem) {
            dated.push((date, path));
        }
    }

    if dated.is_empty() {
        return Err(Error::EmptyTimeSeries);
    }
    dated.sort_by_key(|(date, _)| *date);

    let mut frames = Vec::with_capacity(dated.len());
    for (date, path) in dated {
        let samples = read_geotiff::<f64, _>(&path)?;
        frames.push(RasterFrame::new(date, samples));
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::native::{write_geotiff, GeoTiffOptions};
    use crate::raster::Raster;
    use chrono::Datelike;

    #[test]
    fn test_parse_date_key() {
        assert_eq!(
            parse_date_key("backscatter_2025-03-01"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
        assert_eq!(
            parse_date_key("s1_vv_2024-11"),
            NaiveDate::from_ymd_opt(2024, 11, 1)
        );
        assert_eq!(parse_date_key("readme"), None);
        assert_eq!(parse_date_key("mask_2025-13-01"), None);
    }

    #[test]
    fn test_stack_reads_in_chronological_order() {
        let dir = tempfile::tempdir().unwrap();
        // Deliberately created out of order
        for name in [
            "backscatter_2025-03-01.tif",
            "backscatter_2025-01-01.tif",
            "backscatter_2025-02-01.tif",
        ] {
            let raster: Raster<f64> = Raster::filled(2, 2, -15.0);
            write_geotiff(&raster, dir.path().join(name), &GeoTiffOptions::default()).unwrap();
        }
        // A stray non-dated file must be ignored
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let frames = read_frame_stack(dir.path()).unwrap();
        assert_eq!(frames.len(), 3);
        let dates: Vec<u32> = frames.iter().map(|f| f.date.month0() + 1).collect();
        assert_eq!(dates, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_stack_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_frame_stack(dir.path()),
            Err(Error::EmptyTimeSeries)
        ));
    }
}
