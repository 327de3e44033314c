//! Single band GeoTIFF reader and writer built on the `tiff` crate.
//!
//! Georeferencing is taken from ModelPixelScale + ModelTiepoint, honouring
//! the raster type GeoKey: for PixelIsPoint files the tiepoint marks a cell
//! centre. The GeoKey directory and its parameter tags are carried through
//! so that a written buffer describes the same coordinate system as its
//! dataset, with the raster type set to PixelIsArea to match the corner
//! tiepoint that is written. Rasters are always written as 32-bit floats.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::warn;

use crate::error::{HrdsError, Result};
use crate::grid::Grid;
use crate::io::Projection;

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GEO_DOUBLE_PARAMS: Tag = Tag::GeoDoubleParamsTag;
const GEO_ASCII_PARAMS: Tag = Tag::GeoAsciiParamsTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

const GT_RASTER_TYPE_KEY: u16 = 1025;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Written when the projection has no GeoKeys of its own:
/// raster-is-area and nothing else.
const MINIMAL_GEO_KEYS: [u16; 8] = [1, 1, 0, 1, GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA];

/// Read a GeoTIFF.
///
/// Files without georeferencing tags are read with a unit cell size and
/// the origin at (0, 0), with a warning.
pub fn read(path: &Path) -> Result<(Grid, Projection)> {
    let file = File::open(path).map_err(|e| HrdsError::load(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| HrdsError::load(path, format!("TIFF decode error: {}", e)))?;

    match decoder.colortype() {
        Ok(ColorType::Gray(_)) => {}
        Ok(other) => {
            return Err(HrdsError::load(
                path,
                format!("only single band rasters are supported, found {:?}", other),
            ))
        }
        Err(e) => return Err(HrdsError::load(path, e)),
    }

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| HrdsError::load(path, format!("cannot read dimensions: {}", e)))?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<f64> = match decoder
        .read_image()
        .map_err(|e| HrdsError::load(path, format!("cannot read image data: {}", e)))?
    {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => return Err(HrdsError::load(path, "unsupported TIFF sample format")),
    };

    let projection = Projection {
        wkt: None,
        geo_keys: decoder.get_tag_u16_vec(GEO_KEY_DIRECTORY).ok(),
        geo_doubles: decoder.get_tag_f64_vec(GEO_DOUBLE_PARAMS).ok(),
        geo_ascii: decoder.get_tag_ascii_string(GEO_ASCII_PARAMS).ok(),
    };

    let scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE).ok();
    let tiepoint = decoder.get_tag_f64_vec(MODEL_TIEPOINT).ok();
    let (origin, cell_size) = match (scale, tiepoint) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            // Tiepoint maps raster (I, J) to world (X, Y); J counts down
            // from the top edge.
            let (dx, dy) = (scale[0], scale[1]);
            let mut left = tie[3] - tie[0] * dx;
            let mut top = tie[4] + tie[1] * dy;
            if projection.geo_key(GT_RASTER_TYPE_KEY) == Some(RASTER_PIXEL_IS_POINT) {
                // (0, 0) is the centre of the upper-left cell.
                left -= dx / 2.0;
                top += dy / 2.0;
            }
            ((left, top - dy * rows as f64), (dx, dy))
        }
        _ => {
            warn!(path = %path.display(), "GeoTIFF has no georeferencing, assuming unit cells");
            ((0.0, 0.0), (1.0, 1.0))
        }
    };

    let no_data = decoder
        .get_tag_ascii_string(GDAL_NODATA)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let grid = Grid::from_north_up(origin, cell_size, rows, cols, data, no_data)
        .map_err(|e| HrdsError::load(path, e))?;
    Ok((grid, projection))
}

/// Write a grid as a 32-bit float GeoTIFF.
///
/// Missing cells are written as the grid's no-data sentinel when it has
/// one (recorded in the GDAL_NODATA tag), NaN otherwise.
pub fn write(path: &Path, grid: &Grid, projection: &Projection) -> Result<()> {
    let file = File::create(path).map_err(|e| HrdsError::write(path, e))?;
    let err = |e: tiff::TiffError| HrdsError::write(path, e);

    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(err)?;
    let (rows, cols) = grid.shape();
    let fill = grid.no_data().map(|v| v as f32).unwrap_or(f32::NAN);
    let data: Vec<f32> = grid
        .rows_north_up()
        .flat_map(|row| row.iter())
        .map(|&v| if v.is_nan() { fill } else { v as f32 })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(err)?;

    let (ox, oy) = grid.origin();
    let (dx, dy) = grid.cell_size();
    let top = oy + dy * rows as f64;
    let scale = [dx, dy, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, ox, top, 0.0];

    let tags = image.encoder();
    tags.write_tag(MODEL_PIXEL_SCALE, &scale[..]).map_err(err)?;
    tags.write_tag(MODEL_TIEPOINT, &tiepoint[..]).map_err(err)?;
    let keys = match &projection.geo_keys {
        Some(keys) => area_raster_type(keys),
        None => MINIMAL_GEO_KEYS.to_vec(),
    };
    tags.write_tag(GEO_KEY_DIRECTORY, keys.as_slice())
        .map_err(err)?;
    if let Some(doubles) = &projection.geo_doubles {
        tags.write_tag(GEO_DOUBLE_PARAMS, doubles.as_slice())
            .map_err(err)?;
    }
    if let Some(ascii) = &projection.geo_ascii {
        tags.write_tag(GEO_ASCII_PARAMS, ascii.as_str()).map_err(err)?;
    }
    if let Some(no_data) = grid.no_data() {
        tags.write_tag(GDAL_NODATA, no_data.to_string().as_str())
            .map_err(err)?;
    }

    image.write_data(&data).map_err(err)?;
    Ok(())
}

/// Copy of a GeoKey directory with an inline raster type set to
/// PixelIsArea.
fn area_raster_type(keys: &[u16]) -> Vec<u16> {
    let mut keys = keys.to_vec();
    let count = keys.get(3).copied().unwrap_or(0) as usize;
    if let Some(entries) = keys.get_mut(4..) {
        for entry in entries.chunks_exact_mut(4).take(count) {
            if entry[0] == GT_RASTER_TYPE_KEY && entry[1] == 0 {
                entry[3] = RASTER_PIXEL_IS_AREA;
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_georeferencing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layer.tif");
        let values: Vec<f64> = (0..12).map(|v| v as f64 * 0.5).collect();
        let grid = Grid::new((300.0, 5000.0), (25.0, 12.5), 3, 4, values, None).unwrap();

        write(&path, &grid, &Projection::default()).unwrap();
        let (read_back, projection) = read(&path).unwrap();

        assert_eq!(read_back.shape(), (3, 4));
        assert_eq!(read_back.origin(), (300.0, 5000.0));
        assert_eq!(read_back.cell_size(), (25.0, 12.5));
        assert_eq!(read_back.values(), grid.values());
        assert_eq!(projection.geo_keys, Some(MINIMAL_GEO_KEYS.to_vec()));
    }

    #[test]
    fn test_projection_is_carried_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("utm.tif");
        let grid = Grid::filled((0.0, 0.0), (1.0, 1.0), 2, 2, 7.0).unwrap();
        let projection = Projection {
            wkt: None,
            geo_keys: Some(vec![1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32630]),
            geo_doubles: Some(vec![6378137.0, 298.257223563]),
            geo_ascii: Some("WGS 84 / UTM zone 30N|".to_string()),
        };

        write(&path, &grid, &projection).unwrap();
        let (_, read_projection) = read(&path).unwrap();

        assert_eq!(read_projection.epsg(), Some(32630));
        assert_eq!(read_projection.geo_doubles, projection.geo_doubles);
        assert!(read_projection
            .geo_ascii
            .as_deref()
            .unwrap_or_default()
            .starts_with("WGS 84 / UTM zone 30N"));
    }

    #[test]
    fn test_missing_cells_use_no_data_sentinel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("holes.tif");
        let grid = Grid::new(
            (0.0, 0.0),
            (1.0, 1.0),
            1,
            3,
            vec![1.0, -9999.0, 3.0],
            Some(-9999.0),
        )
        .unwrap();

        write(&path, &grid, &Projection::default()).unwrap();
        let (read_back, _) = read(&path).unwrap();

        assert_eq!(read_back.no_data(), Some(-9999.0));
        assert!(read_back.is_missing(0, 1));
        assert_eq!(read_back.get(0, 2), Some(3.0));
    }

    #[test]
    fn test_nan_cells_survive_without_sentinel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nan.tif");
        let grid = Grid::new((0.0, 0.0), (1.0, 1.0), 1, 2, vec![f64::NAN, 2.0], None).unwrap();

        write(&path, &grid, &Projection::default()).unwrap();
        let (read_back, _) = read(&path).unwrap();
        assert!(read_back.is_missing(0, 0));
        assert_eq!(read_back.no_data(), None);
    }

    /// Write a 2x2 PixelIsPoint GeoTIFF by hand, tiepoint on the centre of
    /// the upper-left cell at (100, 200), 10 unit cells.
    fn write_pixel_is_point(path: &Path) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
        let mut image = encoder.new_image::<Gray32Float>(2, 2).unwrap();
        let tags = image.encoder();
        tags.write_tag(MODEL_PIXEL_SCALE, &[10.0, 10.0, 0.0][..])
            .unwrap();
        tags.write_tag(MODEL_TIEPOINT, &[0.0, 0.0, 0.0, 100.0, 200.0, 0.0][..])
            .unwrap();
        tags.write_tag(
            GEO_KEY_DIRECTORY,
            &[1u16, 1, 0, 2, 1025, 0, 1, 2, 3072, 0, 1, 32630][..],
        )
        .unwrap();
        image.write_data(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
    }

    #[test]
    fn test_pixel_is_point_origin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dem.tif");
        write_pixel_is_point(&path);

        let (grid, projection) = read(&path).unwrap();
        // Upper-left cell spans (95, 195)-(105, 205).
        assert_eq!(grid.origin(), (95.0, 185.0));
        assert_eq!(grid.cell_center(1, 0), (100.0, 200.0));
        assert_eq!(projection.epsg(), Some(32630));

        // Written back as PixelIsArea with a corner tiepoint.
        let copy = dir.path().join("copy.tif");
        write(&copy, &grid, &projection).unwrap();
        let (read_back, copy_projection) = read(&copy).unwrap();
        assert_eq!(read_back.origin(), (95.0, 185.0));
        assert_eq!(copy_projection.geo_key(1025), Some(RASTER_PIXEL_IS_AREA));
        assert_eq!(copy_projection.epsg(), Some(32630));
    }

    #[test]
    fn test_area_raster_type() {
        assert_eq!(
            area_raster_type(&[1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 2]),
            vec![1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1]
        );
        assert_eq!(area_raster_type(&[1, 1, 0]), vec![1, 1, 0]);
    }

    #[test]
    fn test_read_rejects_non_tiff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogus.tif");
        std::fs::write(&path, b"not a tiff").unwrap();
        assert!(matches!(read(&path), Err(HrdsError::DatasetLoad { .. })));
    }
}
