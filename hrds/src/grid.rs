//! Georeferenced scalar grids.
//!
//! A [`Grid`] is the in-memory form of a single raster band: a rectangular
//! block of `f64` values, the world position of its lower-left corner and the
//! size of one cell. Values represent cell centres, so cell `(0, 0)` is centred
//! at `origin + cell_size / 2`.
//!
//! Rows are stored south to north (row 0 is the southern-most row), which is
//! the reverse of the north-up order most raster files use. The readers in
//! [`crate::io`] flip rows on the way in and the writers flip them back.

use crate::error::{HrdsError, Result};

/// Optional lower and upper bounds applied to interpolated values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClampRange {
    /// Values below this are raised to it.
    pub min: Option<f64>,
    /// Values above this are lowered to it.
    pub max: Option<f64>,
}

impl ClampRange {
    /// Create a clamp range; either bound may be absent.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Clip `value` into the range. NaN passes through untouched.
    pub fn apply(&self, value: f64) -> f64 {
        let mut value = value;
        if let Some(min) = self.min {
            if value < min {
                value = min;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                value = max;
            }
        }
        value
    }
}

/// Axis-aligned rectangle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create an extent from its lower-left and upper-right corners.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The four corners, counter-clockwise from the lower-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ]
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Shrink the extent by `dx` on the left and right and `dy` on the
    /// bottom and top.
    pub fn inset(&self, dx: f64, dy: f64) -> Extent {
        Extent::new(
            self.min_x + dx,
            self.min_y + dy,
            self.max_x - dx,
            self.max_y - dy,
        )
    }

    /// Inclusive containment test.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// True if `other` lies entirely inside this extent.
    pub fn contains_extent(&self, other: &Extent) -> bool {
        self.contains(other.min_x, other.min_y) && self.contains(other.max_x, other.max_y)
    }
}

/// A single band of raster data.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Lower-left corner of the lower-left cell.
    origin: (f64, f64),
    /// Cell width and height, both strictly positive.
    cell_size: (f64, f64),
    rows: usize,
    cols: usize,
    /// Row-major, south-first. Missing cells hold NaN.
    values: Vec<f64>,
    /// Sentinel the source used for missing cells, kept for writing back.
    no_data: Option<f64>,
}

impl Grid {
    /// Build a grid from south-first, row-major values.
    ///
    /// Cells equal to `no_data` are stored as NaN so that "no data" and NaN
    /// are indistinguishable afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`HrdsError::Interpolation`] if `values` is not a
    /// `rows × cols` field or the cell size is not strictly positive.
    pub fn new(
        origin: (f64, f64),
        cell_size: (f64, f64),
        rows: usize,
        cols: usize,
        values: Vec<f64>,
        no_data: Option<f64>,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 || rows.checked_mul(cols) != Some(values.len()) {
            return Err(HrdsError::interpolation(format!(
                "field to interpolate should have 2 dimensions: got {} values for {}x{}",
                values.len(),
                rows,
                cols
            )));
        }
        let (dx, dy) = cell_size;
        if !(dx.is_finite() && dy.is_finite() && dx > 0.0 && dy > 0.0) {
            return Err(HrdsError::interpolation(format!(
                "cell size must be positive, got ({}, {})",
                dx, dy
            )));
        }

        let mut values = values;
        if let Some(nd) = no_data {
            for v in values.iter_mut().filter(|v| **v == nd) {
                *v = f64::NAN;
            }
        }

        Ok(Self {
            origin,
            cell_size,
            rows,
            cols,
            values,
            no_data,
        })
    }

    /// Build a grid from north-first rows, the order raster files store them in.
    pub fn from_north_up(
        origin: (f64, f64),
        cell_size: (f64, f64),
        rows: usize,
        cols: usize,
        values: Vec<f64>,
        no_data: Option<f64>,
    ) -> Result<Self> {
        if cols == 0 || rows.checked_mul(cols) != Some(values.len()) {
            // Let `new` produce the shape error.
            return Self::new(origin, cell_size, rows, cols, values, no_data);
        }
        let flipped: Vec<f64> = values
            .chunks_exact(cols)
            .rev()
            .flat_map(|row| row.iter().copied())
            .collect();
        Self::new(origin, cell_size, rows, cols, flipped, no_data)
    }

    /// A grid holding the same value in every cell.
    pub fn filled(
        origin: (f64, f64),
        cell_size: (f64, f64),
        rows: usize,
        cols: usize,
        value: f64,
    ) -> Result<Self> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            HrdsError::interpolation(format!("{}x{} grid is too large", rows, cols))
        })?;
        Self::new(origin, cell_size, rows, cols, vec![value; len], None)
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn cell_size(&self) -> (f64, f64) {
        self.cell_size
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn no_data(&self) -> Option<f64> {
        self.no_data
    }

    /// South-first, row-major values. Missing cells are NaN.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `(row, col)`, `None` outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.values[row * self.cols + col])
    }

    /// True if the cell holds no data.
    pub fn is_missing(&self, row: usize, col: usize) -> bool {
        self.get(row, col).map(f64::is_nan).unwrap_or(false)
    }

    /// Number of cells holding no data.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Smallest and largest valid values, `None` if every cell is missing.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Outer boundary of the grid in world coordinates.
    pub fn extent(&self) -> Extent {
        let (ox, oy) = self.origin;
        let (dx, dy) = self.cell_size;
        Extent::new(
            ox,
            oy,
            ox + dx * self.cols as f64,
            oy + dy * self.rows as f64,
        )
    }

    /// World coordinate of the centre of cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let (ox, oy) = self.origin;
        let (dx, dy) = self.cell_size;
        (
            ox + (col as f64 + 0.5) * dx,
            oy + (row as f64 + 0.5) * dy,
        )
    }

    /// Rows in north-first order, for writers.
    pub fn rows_north_up(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.cols).rev()
    }
}
