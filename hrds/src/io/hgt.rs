//! SRTM `.hgt` height tiles.
//!
//! A tile is a square block of big-endian `i16` samples covering one degree,
//! north row first. The tile size is detected from the file length and the
//! south-west corner is parsed from the file name (`N35E138.hgt`). Samples
//! sit on whole arc-second posts, so the first sample is the tile's
//! north-west corner.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{HrdsError, Result};
use crate::grid::Grid;
use crate::io::Projection;

/// Samples per row/column for SRTM1 (1 arc-second).
const SRTM1_SAMPLES: usize = 3601;

/// Samples per row/column for SRTM3 (3 arc-second).
const SRTM3_SAMPLES: usize = 1201;

/// Value marking a void sample.
pub const VOID_VALUE: i16 = -32768;

/// GeoKeys for WGS 84 geographic coordinates, so buffers derived from a
/// tile are written in the same system.
const WGS84_GEO_KEYS: [u16; 16] = [
    1, 1, 0, 3, // header, 3 keys
    1024, 0, 1, 2, // model type: geographic
    1025, 0, 1, 1, // raster type: pixel is area
    2048, 0, 1, 4326, // geographic CS: WGS 84
];

/// Resolution of an SRTM tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtmResolution {
    /// 1 arc-second (~30m).
    Srtm1,
    /// 3 arc-second (~90m).
    Srtm3,
}

impl SrtmResolution {
    /// Detect the resolution from a file length in bytes.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            l if l == SRTM1_SAMPLES * SRTM1_SAMPLES * 2 => Some(SrtmResolution::Srtm1),
            l if l == SRTM3_SAMPLES * SRTM3_SAMPLES * 2 => Some(SrtmResolution::Srtm3),
            _ => None,
        }
    }

    /// Samples per row/column.
    pub fn samples(&self) -> usize {
        match self {
            SrtmResolution::Srtm1 => SRTM1_SAMPLES,
            SrtmResolution::Srtm3 => SRTM3_SAMPLES,
        }
    }

    /// Spacing between samples, in degrees.
    pub fn spacing(&self) -> f64 {
        1.0 / (self.samples() - 1) as f64
    }
}

/// Parse the south-west corner `(lat, lon)` from a tile name such as
/// `N35E138.hgt` or `S12W077`.
pub fn filename_to_lat_lon(path: &Path) -> Option<(i32, i32)> {
    let name = path.file_stem()?.to_str()?;
    if name.len() != 7 || !name.is_ascii() {
        return None;
    }
    let bytes = name.as_bytes();

    let lat_sign = match bytes[0] {
        b'N' | b'n' => 1,
        b'S' | b's' => -1,
        _ => return None,
    };
    let lon_sign = match bytes[3] {
        b'E' | b'e' => 1,
        b'W' | b'w' => -1,
        _ => return None,
    };
    let lat: i32 = name[1..3].parse().ok()?;
    let lon: i32 = name[4..7].parse().ok()?;
    Some((lat * lat_sign, lon * lon_sign))
}

/// Read a tile, taking its position from the file name.
pub fn read(path: &Path) -> Result<(Grid, Projection)> {
    let (lat, lon) = filename_to_lat_lon(path).ok_or_else(|| {
        HrdsError::load(path, "tile name must look like N35E138.hgt")
    })?;
    read_with_coords(path, lat, lon)
}

/// Read a tile whose south-west corner is `(lat, lon)`.
pub fn read_with_coords(path: &Path, lat: i32, lon: i32) -> Result<(Grid, Projection)> {
    let file = File::open(path).map_err(|e| HrdsError::load(path, e))?;

    // SAFETY: the file is opened read-only and the mapping does not outlive
    // this function.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| HrdsError::load(path, e))?;

    let resolution = SrtmResolution::from_len(mmap.len()).ok_or_else(|| {
        HrdsError::load(
            path,
            format!("invalid file size {} for an SRTM tile", mmap.len()),
        )
    })?;
    let n = resolution.samples();
    let cell = resolution.spacing();

    let values: Vec<f64> = mmap
        .chunks_exact(2)
        .map(|b| f64::from(i16::from_be_bytes([b[0], b[1]])))
        .collect();

    // Posts lie on whole degrees, so cells extend half a spacing beyond.
    let origin = (lon as f64 - cell / 2.0, lat as f64 - cell / 2.0);
    let grid = Grid::from_north_up(
        origin,
        (cell, cell),
        n,
        n,
        values,
        Some(f64::from(VOID_VALUE)),
    )?;

    let projection = Projection {
        geo_keys: Some(WGS84_GEO_KEYS.to_vec()),
        ..Default::default()
    };
    Ok((grid, projection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolator::Interpolator;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const SRTM3_SIZE: usize = SRTM3_SAMPLES * SRTM3_SAMPLES * 2;

    fn put(data: &mut [u8], row: usize, col: usize, value: i16) {
        let offset = (row * SRTM3_SAMPLES + col) * 2;
        data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// An SRTM3 tile named `N35E138.hgt` with a few known samples.
    fn create_test_tile(dir: &TempDir) -> std::path::PathBuf {
        let mut data = vec![0u8; SRTM3_SIZE];
        put(&mut data, 0, 0, 1000); // north-west
        put(&mut data, 600, 600, 500); // centre
        put(&mut data, 1200, 1200, 100); // south-east
        put(&mut data, 10, 10, VOID_VALUE);

        let path = dir.path().join("N35E138.hgt");
        let mut file = File::create(&path).unwrap();
        file.write_all(&data).unwrap();
        path
    }

    #[test]
    fn test_filename_to_lat_lon() {
        assert_eq!(filename_to_lat_lon(Path::new("N35E138.hgt")), Some((35, 138)));
        assert_eq!(filename_to_lat_lon(Path::new("S12W077.hgt")), Some((-12, -77)));
        assert_eq!(
            filename_to_lat_lon(Path::new("/path/to/n00e000.hgt")),
            Some((0, 0))
        );
        assert_eq!(filename_to_lat_lon(Path::new("invalid.hgt")), None);
        assert_eq!(filename_to_lat_lon(Path::new("X35E138.hgt")), None);
    }

    #[test]
    fn test_read_tile_geometry() {
        let dir = TempDir::new().unwrap();
        let path = create_test_tile(&dir);
        let (grid, projection) = read(&path).unwrap();

        assert_eq!(grid.shape(), (1201, 1201));
        assert_eq!(projection.epsg(), Some(4326));

        // North-west post sits on the tile corner.
        let (x, y) = grid.cell_center(1200, 0);
        assert!((x - 138.0).abs() < 1e-9);
        assert!((y - 36.0).abs() < 1e-9);
        assert_eq!(grid.get(1200, 0), Some(1000.0));
        assert_eq!(grid.get(0, 1200), Some(100.0));
        assert!(grid.is_missing(1190, 10));
    }

    #[test]
    fn test_interpolate_tile() {
        let dir = TempDir::new().unwrap();
        let (grid, _) = read(&create_test_tile(&dir)).unwrap();
        let interp = Interpolator::new(grid);

        let centre = interp.get_value(138.5, 35.5).unwrap();
        assert!((centre - 500.0).abs() < 1e-3);
        assert!(interp.point_in(138.0001, 35.0001));
        assert!(!interp.point_in(137.99, 35.5));
    }

    #[test]
    fn test_invalid_file_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("N35E138.hgt");
        std::fs::write(&path, vec![0u8; 1000]).unwrap();

        let err = read(&path).unwrap_err();
        assert!(err.to_string().contains("invalid file size 1000"));
    }

    #[test]
    fn test_unparseable_name_needs_coords() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; SRTM3_SIZE]).unwrap();

        assert!(read(file.path()).is_err());
        let (grid, _) = read_with_coords(file.path(), -12, -77).unwrap();
        assert!((grid.extent().min_x - (-77.0 - SrtmResolution::Srtm3.spacing() / 2.0)).abs() < 1e-12);
    }
}
