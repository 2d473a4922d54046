//! Tabular run summary
//!
//! Append-only CSV writer producing one row per classified frame, matching
//! the layout downstream timeline tooling expects. Undefined values
//! (no-data threshold, skipped centroid) are written as empty fields.

use std::fs::File;
use std::path::Path;

use crate::error::Result;
use crate::frame::FrameSummary;

const HEADERS: [&str; 9] = [
    "date",
    "threshold",
    "wet_pixels",
    "valid_pixels",
    "wet_fraction",
    "centroid_lon",
    "centroid_lat",
    "centroid_shift_km",
    "mask_path",
];

/// Append-only CSV writer for per-frame summaries
pub struct SummaryWriter {
    inner: csv::Writer<File>,
}

impl SummaryWriter {
    /// Create the file and write the header row
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut inner = csv::Writer::from_path(path.as_ref()).map_err(csv_err)?;
        inner.write_record(HEADERS).map_err(csv_err)?;
        Ok(Self { inner })
    }

    /// Append one frame's row
    pub fn append(&mut self, row: &FrameSummary) -> Result<()> {
        let threshold = row
            .threshold
            .filter(|t| t.is_finite())
            .map(|t| format!("{:.6}", t))
            .unwrap_or_default();
        let fraction = row
            .wet_fraction
            .map(|f| format!("{:.6}", f))
            .unwrap_or_default();
        let (lon, lat, shift) = match &row.centroid {
            Some(c) => (
                format!("{:.8}", c.lon),
                format!("{:.8}", c.lat),
                c.shift_km.map(|d| format!("{:.3}", d)).unwrap_or_default(),
            ),
            None => (String::new(), String::new(), String::new()),
        };

        self.inner
            .write_record([
                row.date.format("%Y-%m-%d").to_string(),
                threshold,
                row.wet_pixels.to_string(),
                row.valid_pixels.to_string(),
                fraction,
                lon,
                lat,
                shift,
                row.mask_path.clone().unwrap_or_default(),
            ])
            .map_err(csv_err)?;
        Ok(())
    }

    /// Flush buffered rows to disk
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

fn csv_err(e: csv::Error) -> crate::error::Error {
    crate::error::Error::Csv(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Centroid;
    use chrono::NaiveDate;

    #[test]
    fn test_rows_match_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("derived/water_monthly_summary.csv");
        let date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();

        let mut writer = SummaryWriter::create(&path).unwrap();
        writer
            .append(&FrameSummary {
                date,
                threshold: Some(-16.25),
                wet_pixels: 40,
                valid_pixels: 100,
                wet_fraction: Some(0.4),
                centroid: Some(Centroid {
                    date,
                    lon: -63.9,
                    lat: -13.7,
                    shift_km: Some(1.234),
                }),
                mask_path: Some("masks/water_mask_2025-04-01.tif".into()),
            })
            .unwrap();
        writer
            .append(&FrameSummary {
                date,
                threshold: None,
                wet_pixels: 0,
                valid_pixels: 0,
                wet_fraction: None,
                centroid: None,
                mask_path: None,
            })
            .unwrap();
        writer.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,threshold,wet_pixels,valid_pixels,wet_fraction,\
             centroid_lon,centroid_lat,centroid_shift_km,mask_path"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("2025-04-01,-16.250000,40,100,0.400000,"));
        assert!(first.contains(",1.234,"));
        // Undefined fields stay empty rather than becoming NaN text
        assert_eq!(lines.next().unwrap(), "2025-04-01,,0,0,,,,,");
    }
}
