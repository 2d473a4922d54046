//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate directly; no GDAL dependency. Float grids are
//! written as 32-bit float, masks as 8-bit gray. Georeferencing goes
//! through the ModelPixelScale/ModelTiepoint tag pair.

use std::fs::File;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray8};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKindStandard};
use tiff::tags::Tag;

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// No-data value recorded for the band. NaN is only valid for float
    /// grids; requesting a NaN no-data for an integer grid is rejected.
    pub nodata: Option<f64>,
    /// Compression name, recorded for parity with the GDAL path ("NONE"
    /// in the native encoder)
    pub compression: String,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            nodata: None,
            compression: "NONE".to_string(),
        }
    }
}

impl GeoTiffOptions {
    pub fn with_nodata(nodata: f64) -> Self {
        Self {
            nodata: Some(nodata),
            ..Self::default()
        }
    }

    fn validate_for<T: RasterElement>(&self) -> Result<()> {
        if let Some(nd) = self.nodata {
            if !T::is_float() && !nd.is_finite() {
                return Err(Error::invalid_parameter(
                    "nodata",
                    nd,
                    "non-finite no-data is only valid for float grids",
                ));
            }
        }
        Ok(())
    }
}

/// Read a GeoTIFF file into a Raster.
///
/// Values are cast into `T`; cells that do not fit become `T`'s default
/// no-data. Geotransform tags are honored when present.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoder =
        Decoder::new(file).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I8(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::Other(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(Some(Crs::wgs84()));
    Ok(raster)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

/// Attempt to read a GeoTransform from TIFF tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// Write a float raster to a GeoTIFF file as 32-bit float samples
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    options.validate_for::<T>()?;

    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(file)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;
    write_geo_tags(image.encoder(), raster)?;
    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    Ok(())
}

/// Write a binary/categorical mask to a GeoTIFF file as 8-bit gray
pub fn write_geotiff_u8<P>(
    raster: &Raster<u8>,
    path: P,
    options: &GeoTiffOptions,
) -> Result<()>
where
    P: AsRef<Path>,
{
    options.validate_for::<u8>()?;

    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(file)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let data: Vec<u8> = raster.data().iter().copied().collect();

    let mut image = encoder
        .new_image::<Gray8>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;
    write_geo_tags(image.encoder(), raster)?;
    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    Ok(())
}

fn write_geo_tags<W, T>(
    dir: &mut DirectoryEncoder<'_, W, TiffKindStandard>,
    raster: &Raster<T>,
) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
    T: RasterElement,
{
    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    dir.write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), scale.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    // GTModelTypeGeoKey=2 (Geographic) + GeographicTypeGeoKey=4326 for
    // lon/lat grids; RasterPixelIsArea either way.
    let geographic = raster.crs().map(Crs::is_geographic).unwrap_or(true);
    let geokeys: Vec<u16> = if geographic {
        vec![
            1, 1, 0, 3, // version 1.1.0, 3 keys
            1024, 0, 1, 2, // GTModelTypeGeoKey = ModelTypeGeographic
            1025, 0, 1, 1, // GTRasterTypeGeoKey = RasterPixelIsArea
            2048, 0, 1, 4326, // GeographicTypeGeoKey = WGS84
        ]
    } else {
        vec![
            1, 1, 0, 2, //
            1024, 0, 1, 1, // GTModelTypeGeoKey = ModelTypeProjected
            1025, 0, 1, 1, // GTRasterTypeGeoKey = RasterPixelIsArea
        ]
    };
    dir.write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    Ok(())
}
