//! I/O collaborators: native GeoTIFF codec, frame stacks, CSV summaries

mod native;
mod stack;
mod summary;

pub use native::{read_geotiff, write_geotiff, write_geotiff_u8, GeoTiffOptions};
pub use stack::{parse_date_key, read_frame_stack};
pub use summary::SummaryWriter;
