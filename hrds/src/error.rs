//! Error types for the HRDS library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading, buffering or querying rasters.
#[derive(Error, Debug)]
pub enum HrdsError {
    /// IO error when reading or writing files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A raster could not be opened or parsed.
    #[error("Could not load raster {path}: {message}")]
    DatasetLoad { path: PathBuf, message: String },

    /// A raster could not be written.
    #[error("Could not write raster {path}: {message}")]
    DatasetWrite { path: PathBuf, message: String },

    /// The file extension does not name a supported raster format.
    #[error("Unsupported raster format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// The point lies outside the interpolable region of a grid.
    #[error("Coordinate out of range: x={x}, y={y} indexed at row={row}, col={col}")]
    CoordinateOutOfRange { x: f64, y: f64, row: i64, col: i64 },

    /// Every interpolation weight around the point is masked out.
    #[error("Probing point inside land mask: x={x}, y={y} indexed at row={row}, col={col}")]
    MaskExhaustion { x: f64, y: f64, row: i64, col: i64 },

    /// A query coordinate is malformed.
    #[error("Invalid coordinate: {message}")]
    InvalidCoordinate { message: String },

    /// A structural precondition of the interpolator was violated.
    #[error("Interpolation error: {message}")]
    Interpolation { message: String },

    /// Buffer generation was asked for an impossible distance or resolution.
    #[error("Invalid buffer parameters: {message}")]
    InvalidBuffer { message: String },

    /// Overlay datasets and buffers were supplied in different numbers.
    #[error("Stack mismatch: {datasets} datasets but {buffers} buffers or distances")]
    StackMismatch { datasets: usize, buffers: usize },

    /// An overlay reaches outside the area covered by the base raster.
    #[error("Base raster does not cover layer {layer}")]
    BaseCoverage { layer: String },

    /// A required configuration value is missing or malformed.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl HrdsError {
    /// True for errors caused by probing a point a grid cannot answer for,
    /// including the fully masked case.
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            HrdsError::CoordinateOutOfRange { .. } | HrdsError::MaskExhaustion { .. }
        )
    }

    pub(crate) fn interpolation(message: impl Into<String>) -> Self {
        HrdsError::Interpolation {
            message: message.into(),
        }
    }

    pub(crate) fn load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        HrdsError::DatasetLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        HrdsError::DatasetWrite {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias using [`HrdsError`].
pub type Result<T> = std::result::Result<T, HrdsError>;
