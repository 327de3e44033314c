//! Bilinear point sampling over a single [`Grid`].
//!
//! An [`Interpolator`] is immutable once built: it is bound to one grid (one
//! band of one raster) and can be shared freely between threads. Switching
//! band means building a new interpolator, never mutating an existing one.

use std::sync::Arc;

use crate::error::{HrdsError, Result};
use crate::grid::{ClampRange, Extent, Grid};

/// Continuous grid coordinates closer than this to a whole number are
/// snapped onto it, so that cell centres and the containment boundary are
/// hit exactly despite floating point noise in the world coordinates.
const SNAP_TOLERANCE: f64 = 1e-9;

/// The 2×2 neighbourhood used to interpolate one point.
#[derive(Debug, Clone, Copy)]
struct Stencil {
    row: usize,
    col: usize,
    row_next: usize,
    col_next: usize,
    /// Weight of the next column.
    tx: f64,
    /// Weight of the next row.
    ty: f64,
}

/// Bilinear interpolator over one grid.
///
/// # Example
///
/// ```
/// use hrds::{Grid, Interpolator};
///
/// let values: Vec<f64> = (1..=16).map(f64::from).collect();
/// let grid = Grid::from_north_up((0.0, 0.0), (1.0, 1.0), 4, 4, values, None).unwrap();
/// let interp = Interpolator::new(grid);
///
/// assert_eq!(interp.get_value(1.5, 2.0).unwrap(), 8.0);
/// assert!(interp.point_in(2.0, 2.0));
/// assert!(interp.get_value(0.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Interpolator {
    grid: Arc<Grid>,
    /// Land mask weights, same shape and row order as the grid.
    mask: Option<Arc<[f64]>>,
    clamp: Option<ClampRange>,
}

impl Interpolator {
    /// Bind an interpolator to a grid.
    pub fn new(grid: impl Into<Arc<Grid>>) -> Self {
        Self {
            grid: grid.into(),
            mask: None,
            clamp: None,
        }
    }

    /// Clip every interpolated value into `clamp`.
    pub fn with_clamp(mut self, clamp: ClampRange) -> Self {
        self.clamp = Some(clamp);
        self
    }

    /// Weight the four neighbours of every query by a land mask.
    ///
    /// The mask is an extension point: weights are multiplied into the
    /// bilinear weights and the sum renormalised. `weights` must be laid out
    /// like [`Grid::values`].
    ///
    /// # Errors
    ///
    /// Returns [`HrdsError::Interpolation`] if the mask shape differs from
    /// the grid's.
    pub fn with_mask(mut self, weights: Vec<f64>) -> Result<Self> {
        let expected = self.grid.rows() * self.grid.cols();
        if weights.len() != expected {
            return Err(HrdsError::interpolation(format!(
                "land mask has {} cells, grid has {}",
                weights.len(),
                expected
            )));
        }
        self.mask = Some(weights.into());
        Ok(self)
    }

    /// The grid this interpolator samples.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Shared handle to the grid.
    pub fn grid_arc(&self) -> Arc<Grid> {
        Arc::clone(&self.grid)
    }

    pub fn clamp(&self) -> Option<ClampRange> {
        self.clamp
    }

    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    /// Outer boundary of the grid.
    pub fn extent(&self) -> Extent {
        self.grid.extent()
    }

    /// The region in which [`Self::get_value`] succeeds: the extent inset by
    /// half a cell on every side, i.e. the rectangle spanned by the outermost
    /// cell centres.
    pub fn interpolable_extent(&self) -> Extent {
        let (dx, dy) = self.grid.cell_size();
        self.grid.extent().inset(dx / 2.0, dy / 2.0)
    }

    /// Does the point lie where this grid can be interpolated?
    ///
    /// Inclusive of the boundary on both axes.
    pub fn point_in(&self, x: f64, y: f64) -> bool {
        self.interpolable_extent().contains(x, y)
    }

    /// Interpolate the grid at `(x, y)`.
    ///
    /// # Errors
    ///
    /// - [`HrdsError::CoordinateOutOfRange`] if the point lies outside
    ///   [`Self::interpolable_extent`]
    /// - [`HrdsError::MaskExhaustion`] if a land mask zeroes every neighbour
    pub fn get_value(&self, x: f64, y: f64) -> Result<f64> {
        let s = self.stencil(x, y)?;
        let g = &*self.grid;
        let cols = g.cols();

        let idx = [
            s.row * cols + s.col,
            s.row * cols + s.col_next,
            s.row_next * cols + s.col,
            s.row_next * cols + s.col_next,
        ];
        let weights = [
            (1.0 - s.tx) * (1.0 - s.ty),
            s.tx * (1.0 - s.ty),
            (1.0 - s.tx) * s.ty,
            s.tx * s.ty,
        ];
        let values = g.values();

        let value = match &self.mask {
            None => {
                let v00 = values[idx[0]];
                if idx.iter().all(|&i| values[i] == v00) {
                    // Flat neighbourhood.
                    v00
                } else {
                    weighted_sum(values, &idx, &weights)
                }
            }
            Some(mask) => {
                let masked = [
                    weights[0] * mask[idx[0]],
                    weights[1] * mask[idx[1]],
                    weights[2] * mask[idx[2]],
                    weights[3] * mask[idx[3]],
                ];
                let total: f64 = masked.iter().sum();
                if total.is_nan() || total <= 0.0 {
                    return Err(HrdsError::MaskExhaustion {
                        x,
                        y,
                        row: s.row as i64,
                        col: s.col as i64,
                    });
                }
                weighted_sum(values, &idx, &masked) / total
            }
        };

        Ok(match self.clamp {
            Some(clamp) => clamp.apply(value),
            None => value,
        })
    }

    fn stencil(&self, x: f64, y: f64) -> Result<Stencil> {
        let out_of_range = |row: i64, col: i64| HrdsError::CoordinateOutOfRange { x, y, row, col };

        if !x.is_finite() || !y.is_finite() {
            return Err(out_of_range(-1, -1));
        }

        let (ox, oy) = self.grid.origin();
        let (dx, dy) = self.grid.cell_size();
        let (col, tx) = locate(x, ox, dx);
        let (row, ty) = locate(y, oy, dy);

        // Must be caught explicitly: a negative index would otherwise wrap.
        if row < 0 || col < 0 {
            return Err(out_of_range(row, col));
        }

        let (rows, cols) = self.grid.shape();
        let (r, c) = (row as usize, col as usize);
        match (next_index(r, ty, rows), next_index(c, tx, cols)) {
            (Some(row_next), Some(col_next)) => Ok(Stencil {
                row: r,
                col: c,
                row_next,
                col_next,
                tx,
                ty,
            }),
            _ => Err(out_of_range(row, col)),
        }
    }
}

/// Index of the lower stencil cell along one axis and the weight of the
/// upper one.
fn locate(coord: f64, origin: f64, delta: f64) -> (i64, f64) {
    // Stored values sit at cell centres, hence the half-cell shift.
    let mut hat = (coord + delta / 2.0 - origin) / delta;
    let nearest = hat.round();
    if (hat - nearest).abs() < SNAP_TOLERANCE {
        hat = nearest;
    }
    let floor = hat.floor();
    // The cast saturates for coordinates far outside the grid.
    ((floor as i64).saturating_sub(1), hat - floor)
}

/// The upper neighbour of `index`, allowing the last cell when its partner
/// would carry no weight.
fn next_index(index: usize, weight: f64, len: usize) -> Option<usize> {
    if index + 1 < len {
        Some(index + 1)
    } else if index + 1 == len && weight == 0.0 {
        Some(index)
    } else {
        None
    }
}

/// Sum of `w * v` over the neighbours that carry weight, so a missing
/// neighbour with zero weight does not poison the result.
fn weighted_sum(values: &[f64], idx: &[usize; 4], weights: &[f64; 4]) -> f64 {
    idx.iter()
        .zip(weights)
        .filter(|(_, &w)| w != 0.0)
        .map(|(&i, &w)| w * values[i])
        .sum()
}
