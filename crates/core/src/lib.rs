//! # Hydrospan Core
//!
//! Core types and I/O for the hydrospan surface-water dynamics library.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid type
//! - `GeoTransform` / `Crs`: raster placement metadata
//! - The water time-series model: `RasterFrame`, `ClassifiedMask`,
//!   `ChangeRaster`, `FrequencyProduct`, `Centroid`
//! - Native GeoTIFF and CSV-summary I/O collaborators

pub mod crs;
pub mod error;
pub mod frame;
pub mod io;
pub mod raster;

pub use crs::Crs;
pub use error::{Error, Result};
pub use frame::{
    Centroid, ChangeRaster, ClassifiedMask, FrameSummary, FrequencyProduct, RasterFrame,
    CHANGE_GAIN, CHANGE_LOSS, CHANGE_STABLE,
};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::Crs;
    pub use crate::error::{Error, Result};
    pub use crate::frame::{
        Centroid, ChangeRaster, ClassifiedMask, FrameSummary, FrequencyProduct, RasterFrame,
    };
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
}
