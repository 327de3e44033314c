//! Reading and writing raster files.
//!
//! Three formats are supported, chosen by file extension:
//!
//! | Extension       | Format                         | Read | Write |
//! |-----------------|--------------------------------|------|-------|
//! | `.asc`          | ESRI ASCII grid (+ `.prj`)     | yes  | yes   |
//! | `.tif`, `.tiff` | single band GeoTIFF            | yes  | yes   |
//! | `.hgt`          | SRTM height tile               | yes  | no    |
//!
//! Every reader produces a south-first [`Grid`] with no-data cells set to
//! NaN, plus whatever [`Projection`] metadata the file carried so that
//! derived rasters (buffers) can be written back co-registered.

pub mod ascii;
pub mod geotiff;
pub mod hgt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{HrdsError, Result};
use crate::grid::Grid;
use crate::interpolator::Interpolator;

/// GeoKey identifying a projected coordinate system.
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
/// GeoKey identifying a geographic coordinate system.
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;

/// Coordinate reference metadata carried alongside a grid.
///
/// HRDS never reprojects: all layers of a stack must share one coordinate
/// system. This is only kept so written rasters describe the same system as
/// the ones they were derived from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Well-known text, as found in an ASCII grid's `.prj` sidecar.
    pub wkt: Option<String>,
    /// Raw GeoTIFF GeoKeyDirectory.
    pub geo_keys: Option<Vec<u16>>,
    /// Raw GeoTIFF GeoDoubleParams.
    pub geo_doubles: Option<Vec<f64>>,
    /// Raw GeoTIFF GeoAsciiParams.
    pub geo_ascii: Option<String>,
}

impl Projection {
    /// A projection carrying only well-known text.
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            ..Default::default()
        }
    }

    /// True if no coordinate system information is known.
    pub fn is_empty(&self) -> bool {
        self.wkt.is_none()
            && self.geo_keys.is_none()
            && self.geo_doubles.is_none()
            && self.geo_ascii.is_none()
    }

    /// EPSG code from the GeoKey directory, if one is stored inline.
    pub fn epsg(&self) -> Option<u16> {
        self.geo_key(PROJECTED_CS_TYPE_KEY)
            .or_else(|| self.geo_key(GEOGRAPHIC_TYPE_KEY))
    }

    /// Inline value of a GeoKey.
    pub fn geo_key(&self, key: u16) -> Option<u16> {
        let keys = self.geo_keys.as_ref()?;
        // Header is [version, revision, minor, count], then 4-tuples of
        // [key, location, count, value]. Location 0 means the value is inline.
        let count = *keys.get(3)? as usize;
        keys.get(4..)?
            .chunks_exact(4)
            .take(count)
            .find(|entry| entry[0] == key && entry[1] == 0)
            .map(|entry| entry[3])
    }
}

/// Raster file formats known to the readers and writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    AsciiGrid,
    GeoTiff,
    Hgt,
}

impl RasterFormat {
    /// Choose a format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("asc") => Ok(RasterFormat::AsciiGrid),
            Some("tif") | Some("tiff") => Ok(RasterFormat::GeoTiff),
            Some("hgt") => Ok(RasterFormat::Hgt),
            _ => Err(HrdsError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RasterFormat::AsciiGrid => "ESRI ASCII grid",
            RasterFormat::GeoTiff => "GeoTIFF",
            RasterFormat::Hgt => "SRTM HGT",
        }
    }
}

/// A raster loaded from disk (or built in memory): one band plus metadata.
#[derive(Debug, Clone)]
pub struct Raster {
    path: Option<PathBuf>,
    grid: Arc<Grid>,
    projection: Projection,
}

impl Raster {
    /// Wrap an in-memory grid.
    pub fn new(grid: impl Into<Arc<Grid>>, projection: Projection) -> Self {
        Self {
            path: None,
            grid: grid.into(),
            projection,
        }
    }

    /// The file this raster was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_arc(&self) -> Arc<Grid> {
        Arc::clone(&self.grid)
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Number of bands available. Only single band rasters are read.
    pub fn band_count(&self) -> usize {
        1
    }

    /// Build an interpolator over band `band` (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`HrdsError::Interpolation`] if the band does not exist.
    pub fn interpolator(&self, band: usize) -> Result<Interpolator> {
        if band == 0 || band > self.band_count() {
            return Err(HrdsError::interpolation(format!(
                "band {} requested but raster has {} band(s)",
                band,
                self.band_count()
            )));
        }
        Ok(Interpolator::new(self.grid_arc()))
    }
}

/// Read the raster at `path`, choosing the reader by extension.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    let format = RasterFormat::from_path(path)?;
    let (grid, projection) = match format {
        RasterFormat::AsciiGrid => ascii::read(path)?,
        RasterFormat::GeoTiff => geotiff::read(path)?,
        RasterFormat::Hgt => hgt::read(path)?,
    };
    debug!(
        path = %path.display(),
        format = format.name(),
        rows = grid.rows(),
        cols = grid.cols(),
        "Loaded raster"
    );
    Ok(Raster {
        path: Some(path.to_path_buf()),
        grid: Arc::new(grid),
        projection,
    })
}

/// Write `grid` to `path`, choosing the writer by extension.
///
/// # Errors
///
/// Returns [`HrdsError::UnsupportedFormat`] for formats that are read-only
/// (`.hgt`) or unknown.
pub fn write<P: AsRef<Path>>(path: P, grid: &Grid, projection: &Projection) -> Result<()> {
    let path = path.as_ref();
    match RasterFormat::from_path(path)? {
        RasterFormat::AsciiGrid => ascii::write(path, grid, projection),
        RasterFormat::GeoTiff => geotiff::write(path, grid, projection),
        RasterFormat::Hgt => Err(HrdsError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}
