//! End-to-end monthly water run
//!
//! Drives a whole time series through classification, change coding,
//! centroid tracking and temporal aggregation, handing every derived
//! product to a caller-supplied sink. Persistence lives behind the
//! sink so the run itself stays testable in memory.

use chrono::NaiveDate;
use hydrospan_core::{
    ChangeRaster, ClassifiedMask, Error, FrameSummary, FrequencyProduct, Raster, RasterFrame,
    Result,
};

use crate::centroid::CentroidTracker;
use crate::change::change_vs_previous;
use crate::classify::{classify_frame, ClassifyParams};
use crate::temporal::{aggregate_masks, overflow_mask};
use crate::threshold::select_threshold;

/// Receives the products of a run as they are produced.
///
/// Methods are called in run order: one `mask` per frame, one `change`
/// per frame after the first, one `summary` per frame, then a single
/// `frequency`, then one `overflow` per frame when overflow masks are
/// requested. `mask` may return a path to echo into the frame's summary
/// row.
pub trait ProductSink {
    fn mask(&mut self, mask: &ClassifiedMask) -> Result<Option<String>>;
    fn change(&mut self, change: &ChangeRaster) -> Result<()>;
    fn summary(&mut self, row: &FrameSummary) -> Result<()>;
    fn frequency(&mut self, product: &FrequencyProduct) -> Result<()>;
    fn overflow(&mut self, date: NaiveDate, mask: &Raster<u8>) -> Result<()>;
}

/// Full configuration of one run.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub classify: ClassifyParams,
    /// Minimum wet months for a cell to count as permanent water
    pub permanence_threshold: i32,
    /// Centroid floor: frames with fewer wet pixels get no centroid
    pub min_wet_pixels: usize,
    /// Keep only frames dated on or after this
    pub start: Option<NaiveDate>,
    /// Keep only frames dated on or before this
    pub end: Option<NaiveDate>,
    /// Classify every frame against one threshold selected from the
    /// pooled samples of the whole subset
    pub global_threshold: bool,
    /// Also derive a per-frame overflow mask (wet outside the permanent
    /// water body) after aggregation
    pub write_overflow_masks: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            classify: ClassifyParams::default(),
            permanence_threshold: 10,
            min_wet_pixels: 25,
            start: None,
            end: None,
            global_threshold: false,
            write_overflow_masks: false,
        }
    }
}

/// What a finished run amounts to.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames: usize,
    pub rows: Vec<FrameSummary>,
    pub median_threshold: Option<f64>,
    pub permanent_pixels: usize,
}

/// Run the full water pipeline over `frames`.
///
/// Frames must arrive strictly ascending by date; the run fails on the
/// first violation instead of aggregating a shuffled record. An empty
/// input, or a date window that excludes everything, is an error.
pub fn run_water_pipeline<S: ProductSink>(
    frames: &[RasterFrame],
    params: &PipelineParams,
    sink: &mut S,
) -> Result<RunSummary> {
    let mut prev_date: Option<NaiveDate> = None;
    for frame in frames {
        if let Some(prev) = prev_date {
            if frame.date <= prev {
                return Err(Error::SequenceOrderViolation {
                    prev,
                    next: frame.date,
                });
            }
        }
        prev_date = Some(frame.date);
    }

    // The window subset relies on the order just verified
    let frames = subset(frames, params.start, params.end)?;

    let classify = effective_classify_params(frames, params)?;

    let mut tracker = CentroidTracker::new(params.min_wet_pixels);
    let mut masks: Vec<ClassifiedMask> = Vec::with_capacity(frames.len());
    let mut rows: Vec<FrameSummary> = Vec::with_capacity(frames.len());

    for frame in frames {
        let mask = classify_frame(frame, &classify)?;
        let mask_path = sink.mask(&mask)?;

        if let Some(previous) = masks.last() {
            let change = change_vs_previous(previous, &mask)?;
            sink.change(&change)?;
        }

        let centroid = tracker.track(&mask);
        let row = FrameSummary {
            date: mask.date,
            threshold: mask.threshold,
            wet_pixels: mask.wet_pixels(),
            valid_pixels: mask.valid_pixels(),
            wet_fraction: mask.wet_fraction(),
            centroid,
            mask_path,
        };
        sink.summary(&row)?;
        rows.push(row);
        masks.push(mask);
    }

    let product = aggregate_masks(&masks, params.permanence_threshold)?;
    sink.frequency(&product)?;

    if params.write_overflow_masks {
        for mask in &masks {
            let overflow = overflow_mask(mask, &product)?;
            sink.overflow(mask.date, &overflow)?;
        }
    }

    Ok(RunSummary {
        frames: masks.len(),
        rows,
        median_threshold: product.median_threshold,
        permanent_pixels: product.permanent_pixels(),
    })
}

/// In global mode, pool every finite sample across the subset and select
/// one threshold for the whole run.
fn effective_classify_params(
    frames: &[RasterFrame],
    params: &PipelineParams,
) -> Result<ClassifyParams> {
    let mut classify = params.classify.clone();
    if !params.global_threshold || classify.global_threshold.is_some() {
        return Ok(classify);
    }

    let mut pooled = Vec::new();
    for frame in frames {
        pooled.extend(frame.finite_samples());
    }
    classify.global_threshold = select_threshold(&pooled, &classify.method)?;
    Ok(classify)
}

fn subset(
    frames: &[RasterFrame],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<&[RasterFrame]> {
    if frames.is_empty() {
        return Err(Error::EmptyTimeSeries);
    }
    let lo = match start {
        Some(s) => frames.partition_point(|f| f.date < s),
        None => 0,
    };
    let hi = match end {
        Some(e) => frames.partition_point(|f| f.date <= e),
        None => frames.len(),
    };
    if lo >= hi {
        return Err(Error::EmptyTimeSeries);
    }
    Ok(&frames[lo..hi])
}
