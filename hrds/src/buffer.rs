//! Distance buffers: 0 at a raster's edge, rising to 1 at a set distance
//! inside it.
//!
//! A buffer controls how a high priority raster is blended into the layers
//! beneath it. Generating one runs a full distance transform over the grid,
//! so it is done once per dataset (and usually saved next to it), never per
//! query.
//!
//! ```
//! use hrds::{BufferBuilder, Grid};
//!
//! let dataset = Grid::filled((0.0, 0.0), (0.25, 0.25), 16, 16, -20.0).unwrap();
//! let buffer = BufferBuilder::new(1.5).generate(&dataset).unwrap();
//!
//! assert_eq!(buffer.shape(), dataset.shape());
//! assert_eq!(buffer.get(0, 8), Some(0.0));
//! assert_eq!(buffer.get(8, 8), Some(1.0));
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::edt;
use crate::error::{HrdsError, Result};
use crate::grid::Grid;
use crate::io::{self, Raster};

/// How many cells the zero region is grown around missing data.
pub const MISSING_DATA_DILATION: usize = 1;

/// Generates normalised distance-to-edge grids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferBuilder {
    /// Distance (in raster units) over which the buffer rises from 0 to 1.
    distance: f64,
    /// Buffer cells per `distance`, if the buffer should not reuse the
    /// dataset's resolution.
    oversample: Option<f64>,
}

impl BufferBuilder {
    /// A buffer rising to 1 at `distance` from the edge, at the dataset's
    /// own resolution.
    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            oversample: None,
        }
    }

    /// Resolve the buffer with `over` cells across `distance` instead of the
    /// dataset's own cells.
    ///
    /// The number of rows and columns is rounded up to cover the dataset, so
    /// the buffer's extent may end up slightly larger than the dataset's.
    /// Missing data in the dataset is ignored in this mode.
    pub fn oversample(mut self, over: f64) -> Self {
        self.oversample = Some(over);
        self
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn oversample_factor(&self) -> Option<f64> {
        self.oversample
    }

    fn validate(&self) -> Result<()> {
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(HrdsError::InvalidBuffer {
                message: format!("distance must be positive, got {}", self.distance),
            });
        }
        if let Some(over) = self.oversample {
            if !(over.is_finite() && over > 0.0) {
                return Err(HrdsError::InvalidBuffer {
                    message: format!("oversample must be positive, got {}", over),
                });
            }
        }
        Ok(())
    }

    /// Generate the buffer grid for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`HrdsError::InvalidBuffer`] for a non-positive distance or
    /// oversample factor.
    pub fn generate(&self, source: &Grid) -> Result<Grid> {
        self.validate()?;
        let start = Instant::now();

        let (cell_size, rows, cols) = match self.oversample {
            None => (source.cell_size(), source.rows(), source.cols()),
            Some(over) => {
                let d = self.distance / over;
                let extent = source.extent();
                let cols = ((extent.width() / d).ceil() as usize).max(1);
                let rows = ((extent.height() / d).ceil() as usize).max(1);
                ((d, d), rows, cols)
            }
        };

        let len = rows.checked_mul(cols).ok_or_else(|| HrdsError::InvalidBuffer {
            message: format!("{}x{} buffer grid is too large", rows, cols),
        })?;

        // true = full confidence, false = zero. The outer ring is zero.
        let mut seed = vec![false; len];
        for r in 1..rows.saturating_sub(1) {
            for c in 1..cols.saturating_sub(1) {
                seed[r * cols + c] = true;
            }
        }

        if self.oversample.is_none() {
            let mut any_missing = false;
            for (cell, value) in seed.iter_mut().zip(source.values()) {
                if value.is_nan() {
                    *cell = false;
                    any_missing = true;
                }
            }
            if any_missing {
                let zero: Vec<bool> = seed.iter().map(|s| !s).collect();
                let grown = extend_mask(&zero, rows, cols, MISSING_DATA_DILATION);
                for (cell, masked) in seed.iter_mut().zip(grown) {
                    if masked {
                        *cell = false;
                    }
                }
                debug!(
                    missing = source.missing_count(),
                    "Carved missing data out of buffer"
                );
            }
        }

        let values: Vec<f64> = edt::distance_to_zero(&seed, rows, cols, cell_size)
            .into_iter()
            .map(|d| (d / self.distance).min(1.0))
            .collect();

        info!(
            rows,
            cols,
            distance = self.distance,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generated distance buffer"
        );

        Grid::new(source.origin(), cell_size, rows, cols, values, None)
    }

    /// Generate the buffer for `source` and write it to `output`,
    /// co-registered with the source through its projection.
    pub fn make_buffer<P: AsRef<Path>>(&self, source: &Raster, output: P) -> Result<Grid> {
        let buffer = self.generate(source.grid())?;
        io::write(output.as_ref(), &buffer, source.projection())?;
        info!(path = %output.as_ref().display(), "Wrote buffer raster");
        Ok(buffer)
    }
}

/// Default file name for the buffer of `dataset`: `<stem>_buffer.tif`,
/// next to the dataset or inside `dir`.
pub fn buffer_path_for(dataset: &Path, dir: Option<&Path>) -> PathBuf {
    let stem = dataset
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string());
    let name = format!("{}_buffer.tif", stem);
    match dir {
        Some(dir) => dir.join(name),
        None => dataset.with_file_name(name),
    }
}

/// Grow a boolean mask by `iterations` cells using 4-connected adjacency.
pub fn extend_mask(mask: &[bool], rows: usize, cols: usize, iterations: usize) -> Vec<bool> {
    let mut current = mask.to_vec();
    for _ in 0..iterations {
        let mut next = current.clone();
        for r in 0..rows {
            for c in 0..cols {
                let i = r * cols + c;
                if current[i] {
                    continue;
                }
                next[i] = (r > 0 && current[i - cols])
                    || (r + 1 < rows && current[i + cols])
                    || (c > 0 && current[i - 1])
                    || (c + 1 < cols && current[i + 1]);
            }
        }
        current = next;
    }
    current
}
