//! GeoTIFF decoding and encoding.
//!
//! Only the geo tags needed for north-up rasters are handled:
//! - `ModelPixelScale` (33550) and `ModelTiepoint` (33922), or
//!   `ModelTransformation` (34264) without rotation
//! - `GeoKeyDirectory` (34735) for the EPSG code
//! - `GDAL_NODATA` (42113) for the no-data value

use crate::{Band, RasterError, Result};
use mangroves_grid::{GeoBox, GeoTransform};
use std::io::{Cursor, Read, Seek, Write};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::GrayI16;
use tiff::encoder::compression::Deflate;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const GEOKEY_MODEL_TYPE: u16 = 1024;
const GEOKEY_RASTER_TYPE: u16 = 1025;
const GEOKEY_GEOGRAPHIC_TYPE: u16 = 2048;
const GEOKEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Rows per strip when encoding. Keeps strips around 1 MB for 10 m tiles.
const ROWS_PER_STRIP: u32 = 64;

/// Decode a single-band GeoTIFF held in memory.
pub fn decode_band(bytes: &[u8]) -> Result<Band> {
    decode(Cursor::new(bytes))
}

/// Decode a single-band GeoTIFF from any seekable reader.
pub fn decode<R: Read + Seek>(reader: R) -> Result<Band> {
    let mut decoder = Decoder::new(reader)?;

    // Allow full 10 m tiles: 9600 x 9600 samples, up to 8 bytes each
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 64 * 1024 * 1024;
    decoder = decoder.with_limits(limits);

    let (width, height) = decoder.dimensions()?;
    let transform = read_transform(&mut decoder)?;
    let epsg = read_epsg(&mut decoder)?;
    let nodata = read_nodata(&mut decoder);

    let mut data = decode_samples(&mut decoder)?;
    let expected = width as usize * height as usize;
    if data.len() != expected {
        return Err(RasterError::ShapeMismatch {
            expected,
            actual: data.len(),
        });
    }

    if let Some(nodata) = nodata {
        for v in data.iter_mut() {
            if *v == nodata {
                *v = f32::NAN;
            }
        }
    }

    Band::new(GeoBox::new(width, height, transform, epsg), data)
}

/// Read the affine transform from the geo tags.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT));
    let pixel_scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE));

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 {
            // Tiepoint format: [i, j, k, x, y, z] ties pixel (i, j) to (x, y)
            let (i, j) = (tiepoint[0], tiepoint[1]);
            let (x, y) = (tiepoint[3], tiepoint[4]);
            return Ok(GeoTransform::new(
                x - i * scale[0],
                y + j * scale[1],
                scale[0],
                -scale[1],
            ));
        }
    }

    if let Ok(m) = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TRANSFORMATION)) {
        if m.len() >= 8 {
            if m[1] != 0.0 || m[4] != 0.0 {
                return Err(RasterError::InvalidGeoTiff(
                    "rotated ModelTransformation is not supported".to_string(),
                ));
            }
            return Ok(GeoTransform::new(m[3], m[7], m[0], m[5]));
        }
    }

    Err(RasterError::InvalidGeoTiff(
        "missing ModelTiepoint/ModelPixelScale or ModelTransformation".to_string(),
    ))
}

/// Read the EPSG code from the GeoKey directory.
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<u32> {
    let keys = decoder
        .get_tag_u32_vec(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY))
        .map_err(|_| RasterError::InvalidGeoTiff("missing GeoKeyDirectory".to_string()))?;

    epsg_from_geokeys(&keys)
        .ok_or_else(|| RasterError::InvalidGeoTiff("no EPSG code in GeoKeyDirectory".to_string()))
}

/// Find the projected (preferred) or geographic CRS code in a GeoKey directory.
fn epsg_from_geokeys(keys: &[u32]) -> Option<u32> {
    // Header: [version, revision, minor, count], then entries of
    // [key, location, count, value]; location 0 means the value is inline
    let count = *keys.get(3)? as usize;
    let mut projected = None;
    let mut geographic = None;

    for entry in keys.get(4..)?.chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match u16::try_from(key).ok()? {
            GEOKEY_PROJECTED_CS_TYPE => projected = Some(value),
            GEOKEY_GEOGRAPHIC_TYPE => geographic = Some(value),
            _ => {}
        }
    }

    // 32767 is "user-defined"
    projected
        .filter(|&c| c != 32767)
        .or(geographic.filter(|&c| c != 32767))
}

/// Read the GDAL_NODATA tag.
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok())
}

/// Decode the first image's samples as `f32`.
fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
    let result = decoder.read_image()?;

    match result {
        DecodingResult::F32(data) => Ok(data),
        DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
    }
}

/// Encode an `int16` band as a deflate-compressed GeoTIFF.
pub fn encode_i16<W: Write + Seek>(
    writer: W,
    geobox: &GeoBox,
    data: &[i16],
    nodata: i16,
) -> Result<()> {
    if data.len() != geobox.len() {
        return Err(RasterError::ShapeMismatch {
            expected: geobox.len(),
            actual: data.len(),
        });
    }

    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image_with_compression::<GrayI16, _>(
        geobox.width,
        geobox.height,
        Deflate::default(),
    )?;
    image.rows_per_strip(ROWS_PER_STRIP.min(geobox.height.max(1)))?;

    let t = &geobox.transform;
    let scale = [t.pixel_width, t.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE), scale.as_slice())?;

    let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT), tiepoint.as_slice())?;

    let geokeys = geokey_directory(geobox.epsg);
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY), geokeys.as_slice())?;

    let nodata = nodata.to_string();
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA), nodata.as_str())?;

    image.write_data(data)?;
    Ok(())
}

/// Encode an `int16` band into an in-memory GeoTIFF.
pub fn encode_i16_to_vec(geobox: &GeoBox, data: &[i16], nodata: i16) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_i16(Cursor::new(&mut buf), geobox, data, nodata)?;
    Ok(buf)
}

/// Minimal GeoKey directory declaring the model type and EPSG code.
#[rustfmt::skip]
fn geokey_directory(epsg: u32) -> Vec<u16> {
    let code = u16::try_from(epsg).unwrap_or(32767);
    let (model_type, crs_key) = if epsg == mangroves_grid::WGS84_EPSG {
        (MODEL_TYPE_GEOGRAPHIC, GEOKEY_GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, GEOKEY_PROJECTED_CS_TYPE)
    };

    vec![
        1, 1, 0, 3, // Version 1.1.0, 3 keys
        GEOKEY_MODEL_TYPE, 0, 1, model_type,
        GEOKEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, code,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangroves_grid::{TileIndex, PACIFIC_EPSG, PACIFIC_GRID_10};

    #[test]
    fn test_epsg_from_geokeys() {
        let keys: Vec<u32> = geokey_directory(PACIFIC_EPSG).into_iter().map(u32::from).collect();
        assert_eq!(epsg_from_geokeys(&keys), Some(PACIFIC_EPSG));

        let keys: Vec<u32> = geokey_directory(4326).into_iter().map(u32::from).collect();
        assert_eq!(epsg_from_geokeys(&keys), Some(4326));

        assert_eq!(epsg_from_geokeys(&[1, 1, 0]), None);
    }

    #[test]
    fn test_encoded_tiff_decodes_with_geotags() {
        let tile = PACIFIC_GRID_10.tile_geobox(TileIndex::new(63, 20));
        let geobox = GeoBox::new(4, 3, tile.transform, tile.epsg);
        let data: Vec<i16> = vec![0, 1, 2, -32767, 2, 1, 0, -32767, 1, 1, 1, 1];

        let bytes = encode_i16_to_vec(&geobox, &data, -32767).expect("Should encode");
        let band = decode_band(&bytes).expect("Should decode");

        assert_eq!(band.geobox(), &geobox);
        assert_eq!(band.get(1, 0), Some(1.0));
        assert!(band.get(3, 0).is_some_and(f32::is_nan), "nodata should decode as NaN");
        assert_eq!(band.get(3, 2), Some(1.0));
    }

    #[test]
    fn test_encode_rejects_wrong_length() {
        let geobox = PACIFIC_GRID_10.tile_geobox(TileIndex::new(0, 0));
        let geobox = GeoBox::new(2, 2, geobox.transform, geobox.epsg);
        assert!(encode_i16_to_vec(&geobox, &[0, 1, 2], -32767).is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_band(b"not a tiff").is_err());
    }
}
