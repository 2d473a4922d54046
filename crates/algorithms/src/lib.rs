//! # Hydrospan Algorithms
//!
//! Water classification and temporal change analysis over radar
//! backscatter time series.
//!
//! ## Stages
//!
//! - **threshold**: per-frame wet/dry cutoff selection (Otsu, quantile, fixed)
//! - **classify**: threshold application and mask construction
//! - **majority**: 3x3 neighborhood voting to despeckle masks
//! - **change**: month-over-month gain/loss coding
//! - **temporal**: wet-frequency and permanence aggregation
//! - **centroid**: water-body centroid drift tracking
//! - **pipeline**: the full run, products delivered through a sink

pub mod centroid;
pub mod change;
pub mod classify;
pub mod majority;
pub(crate) mod maybe_rayon;
pub mod pipeline;
pub mod temporal;
pub mod threshold;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::centroid::{haversine_km, CentroidTracker, EARTH_RADIUS_KM};
    pub use crate::change::change_vs_previous;
    pub use crate::classify::{classify_frame, ClassifyParams};
    pub use crate::majority::majority_filter;
    pub use crate::pipeline::{run_water_pipeline, PipelineParams, ProductSink, RunSummary};
    pub use crate::temporal::{aggregate_masks, overflow_mask};
    pub use crate::threshold::{select_threshold, ThresholdMethod};
    pub use hydrospan_core::prelude::*;
}
