//! Euclidean Distance Transform (EDT) on anisotropic grids.
//!
//! Based on the Felzenszwalb-Huttenlocher algorithm: exact Euclidean
//! distances computed separably with one 1D lower-envelope pass along each
//! axis. Distances are measured in world units, so cells that are not square
//! are handled exactly.

/// Computes the 1D squared-distance transform of `f` for samples spaced
/// `spacing` apart, writing into `output`.
///
/// `v` and `z` are scratch buffers of at least `n` and `n + 1` elements.
fn edt_1d(f: &[f64], spacing: f64, output: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    debug_assert_eq!(n, output.len(), "Input and output must have same length");

    let pos = |i: usize| i as f64 * spacing;
    // Where the parabolas rooted at q and p intersect.
    let intersection =
        |q: usize, p: usize| ((f[q] + pos(q) * pos(q)) - (f[p] + pos(p) * pos(p))) / (2.0 * (pos(q) - pos(p)));

    let mut k = 0;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    // Compute lower envelope
    for q in 1..n {
        let mut s = intersection(q, v[k]);
        while s <= z[k] {
            k -= 1;
            s = intersection(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    // Fill output with minimum values
    k = 0;
    for (q, out) in output.iter_mut().enumerate() {
        while z[k + 1] < pos(q) {
            k += 1;
        }
        let d = pos(q) - pos(v[k]);
        *out = d * d + f[v[k]];
    }
}

/// Distance from every non-zero cell of a `rows × cols` row-major mask to
/// the nearest zero cell, in world units. Zero cells get 0.
///
/// `spacing` is `(dx, dy)`: the distance between neighbouring columns and
/// between neighbouring rows.
///
/// If the mask has no zero cell at all, every cell gets a distance larger
/// than the grid's diagonal.
pub fn distance_to_zero(mask: &[bool], rows: usize, cols: usize, spacing: (f64, f64)) -> Vec<f64> {
    debug_assert_eq!(mask.len(), rows * cols, "Mask size must match dimensions");
    let (dx, dy) = spacing;

    // A finite stand-in for infinity keeps the envelope intersections finite.
    let width = cols as f64 * dx;
    let height = rows as f64 * dy;
    let far = 4.0 * (width * width + height * height) + 1.0;

    let mut f: Vec<f64> = mask.iter().map(|&m| if m { far } else { 0.0 }).collect();

    let longest = rows.max(cols);
    let mut v = vec![0usize; longest];
    let mut z = vec![0.0; longest + 1];

    // First pass: along each row
    let mut row_out = vec![0.0; cols];
    for r in 0..rows {
        let row = &mut f[r * cols..(r + 1) * cols];
        edt_1d(row, dx, &mut row_out, &mut v, &mut z);
        row.copy_from_slice(&row_out);
    }

    // Second pass: along each column
    let mut col_in = vec![0.0; rows];
    let mut col_out = vec![0.0; rows];
    for c in 0..cols {
        for r in 0..rows {
            col_in[r] = f[r * cols + c];
        }
        edt_1d(&col_in, dy, &mut col_out, &mut v, &mut z);
        for r in 0..rows {
            f[r * cols + c] = col_out[r];
        }
    }

    for val in &mut f {
        *val = val.sqrt();
    }
    f
}
