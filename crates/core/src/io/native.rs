//! GeoTIFF reading and writing with the `tiff` crate
//!
//! Surfaces are stored as single-band Float32 with the georeferencing kept in
//! the ModelPixelScale / ModelTiepoint / GeoKeyDirectory tags and the null
//! marker in GDAL_NODATA, which is what GDAL-based readers expect.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::{Compression as TiffCompression, Deflate, DeflateLevel, Lzw, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Compression applied to the image strips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Lzw,
    Deflate,
    None,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub compression: Compression,
    /// Stored in the ImageDescription tag (the band/attribute name)
    pub description: Option<String>,
}

impl GeoTiffOptions {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Read a GeoTIFF file into a Raster
///
/// Restores the transform, the EPSG code from the GeoKeyDirectory and the
/// GDAL_NODATA marker when present.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::Tiff("unsupported TIFF sample format".into())),
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    match read_geotransform(&mut decoder)? {
        Some(transform) => raster.set_transform(transform),
        None => debug!("GeoTIFF has no ModelPixelScale/ModelTiepoint, using identity transform"),
    }
    raster.set_crs(read_crs(&mut decoder)?);
    raster.set_nodata(read_nodata(&mut decoder)?);

    Ok(raster)
}

fn cast_all<S: num_traits::NumCast + Copy, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::null_value))
        .collect()
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<GeoTransform>> {
    let (Some(scale), Some(tiepoint)) = (
        decoder.find_tag(Tag::ModelPixelScaleTag)?,
        decoder.find_tag(Tag::ModelTiepointTag)?,
    ) else {
        return Ok(None);
    };
    let scale = scale.into_f64_vec()?;
    let tiepoint = tiepoint.into_f64_vec()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(Error::Tiff(format!(
            "malformed georeferencing: {} scale and {} tiepoint values",
            scale.len(),
            tiepoint.len()
        )));
    }

    // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1])))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<CRS>> {
    let Some(keys) = decoder.find_tag(Tag::GeoKeyDirectoryTag)? else {
        return Ok(None);
    };
    let keys = keys.into_u16_vec()?;
    // Header [version, revision, minor, count], then entries of
    // [key, tag_location, count, value]; only inline values are read.
    Ok(keys
        .get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .find(|entry| {
            (entry[0] == GEOGRAPHIC_TYPE || entry[0] == PROJECTED_CS_TYPE) && entry[1] == 0
        })
        .map(|entry| CRS::from_epsg(u32::from(entry[3]))))
}

fn read_nodata<T: RasterElement, R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<T>> {
    let Some(text) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = text.into_string()?;
    let text = text.trim_matches(char::from(0)).trim();
    let value: f64 = text
        .parse()
        .map_err(|_| Error::Tiff(format!("invalid GDAL_NODATA value '{}'", text)))?;
    Ok(num_traits::cast(value))
}

/// Write a Raster to a GeoTIFF file.
///
/// Cells are written as Float32; null cells become NaN.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, &options.unwrap_or_default())?;
    writer.flush()?;
    debug!(path = %path.as_ref().display(), rows = raster.rows(), cols = raster.cols(), "wrote GeoTIFF");
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    match options.compression {
        Compression::Lzw => encode_with(raster, writer, options, Lzw),
        Compression::Deflate => encode_with(raster, writer, options, Deflate::with_level(DeflateLevel::Balanced)),
        Compression::None => encode_with(raster, writer, options, Uncompressed),
    }
}

fn encode_with<T, W, D>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions, compression: D) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
    D: TiffCompression,
{
    let (rows, cols) = raster.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut encoder = TiffEncoder::new(writer)?;
    let mut image =
        encoder.new_image_with_compression::<Gray32Float, D>(cols as u32, rows as u32, compression)?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())?;

    image.encoder().write_tag(Tag::GdalNodata, "nan")?;

    if let Some(description) = &options.description {
        image
            .encoder()
            .write_tag(Tag::ImageDescription, description.as_str())?;
    }

    image.write_data(&data)?;
    Ok(())
}

/// GeoKeyDirectory for the raster CRS; geographic WGS84 when unknown.
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs.and_then(|c| c.epsg()).unwrap_or(4326);
    let code16 = u16::try_from(code).unwrap_or(32767);

    let (model_type, crs_key) = if code == 4326 {
        (2, GEOGRAPHIC_TYPE)
    } else {
        (1, PROJECTED_CS_TYPE)
    };

    vec![
        1, 1, 0, 3, // version 1.1.0, 3 keys
        GT_MODEL_TYPE, 0, 1, model_type,
        GT_RASTER_TYPE, 0, 1, 1, // RasterPixelIsArea
        crs_key, 0, 1, code16,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_surface() -> Raster<f64> {
        let mut raster: Raster<f64> = Raster::new(4, 6);
        for row in 0..4 {
            for col in 0..6 {
                raster.set(row, col, (row * 6 + col) as f64 * 0.5).unwrap();
            }
        }
        raster.set(1, 2, f64::NAN).unwrap();
        raster.georeferenced(GeoTransform::new(-51.95, -22.25, 0.001, -0.001), Some(CRS::wgs84()))
    }

    #[test]
    fn lzw_roundtrip_keeps_georeferencing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.tif");
        let raster = sample_surface();

        write_geotiff(&raster, &path, Some(GeoTiffOptions::default().with_description("P"))).unwrap();
        let back: Raster<f64> = read_geotiff(&path).unwrap();

        assert_eq!(back.shape(), (4, 6));
        assert_relative_eq!(back.get(3, 5).unwrap(), 11.5, epsilon = 1e-6);
        assert!(back.get(1, 2).unwrap().is_nan());
        assert!(back.nodata().is_some_and(|nd| nd.is_nan()));
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(4326));

        let gt = back.transform();
        assert_relative_eq!(gt.origin_x, -51.95, epsilon = 1e-12);
        assert_relative_eq!(gt.origin_y, -22.25, epsilon = 1e-12);
        assert_relative_eq!(gt.pixel_height, -0.001, epsilon = 1e-12);
    }

    #[test]
    fn every_compression_decodes() {
        let raster = sample_surface();
        for compression in [Compression::Lzw, Compression::Deflate, Compression::None] {
            let options = GeoTiffOptions {
                compression,
                description: None,
            };
            let buf = write_geotiff_to_buffer(&raster, Some(options)).unwrap();
            let back: Raster<f32> = read_geotiff_from_buffer(&buf).unwrap();
            assert_relative_eq!(back.get(2, 0).unwrap(), 6.0);
        }
    }

    #[test]
    fn projected_crs_is_preserved() {
        let mut raster = sample_surface();
        raster.set_crs(Some(CRS::from_epsg(32722)));
        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32722));
    }

    #[test]
    fn geo_tags_use_registered_codes() {
        assert_eq!(Tag::ModelPixelScaleTag.to_u16(), 33550);
        assert_eq!(Tag::ModelTiepointTag.to_u16(), 33922);
        assert_eq!(Tag::GeoKeyDirectoryTag.to_u16(), 34735);
        assert_eq!(Tag::GdalNodata.to_u16(), 42113);

        let buf = write_geotiff_to_buffer(&sample_surface(), None).unwrap();
        let mut decoder = Decoder::new(Cursor::new(&buf)).unwrap();
        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap();
        assert_eq!(scale, vec![0.001, 0.001, 0.0]);
        let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).unwrap();
        assert_eq!(keys[3], 3);
    }

    fn plain_tiff(nodata: Option<&str>) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
            let mut image = encoder.new_image::<Gray32Float>(2, 2).unwrap();
            if let Some(text) = nodata {
                image.encoder().write_tag(Tag::GdalNodata, text).unwrap();
            }
            image.write_data(&[1.0_f32, 2.0, 3.0, 4.0]).unwrap();
        }
        buf
    }

    #[test]
    fn plain_tiff_has_no_georeferencing() {
        let back: Raster<f64> = read_geotiff_from_buffer(&plain_tiff(None)).unwrap();
        assert_eq!(back.get(1, 1).unwrap(), 4.0);
        assert_eq!(*back.transform(), GeoTransform::default());
        assert!(back.crs().is_none());
        assert!(back.nodata().is_none());
    }

    #[test]
    fn unparsable_nodata_is_an_error() {
        let err = read_geotiff_from_buffer::<f64>(&plain_tiff(Some("none"))).unwrap_err();
        assert!(matches!(err, Error::Tiff(_)));

        let back: Raster<f64> = read_geotiff_from_buffer(&plain_tiff(Some("-9999"))).unwrap();
        assert_eq!(back.nodata(), Some(-9999.0));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_geotiff::<f64, _>("/nonexistent/surface.tif").unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn empty_raster_is_rejected() {
        let raster: Raster<f64> = Raster::new(0, 0);
        assert!(write_geotiff_to_buffer(&raster, None).is_err());
    }
}
