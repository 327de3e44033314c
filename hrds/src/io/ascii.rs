//! ESRI ASCII grid reader and writer.
//!
//! ```text
//! ncols         4
//! nrows         3
//! xllcorner     0.0
//! yllcorner     0.0
//! cellsize      1.0
//! NODATA_value  -9999
//! 1 2 3 4
//! ...
//! ```
//!
//! Rows are listed north first. `xllcenter`/`yllcenter` are accepted in
//! place of the corner keys, and `dx`/`dy` in place of `cellsize` for
//! rectangular cells. Coordinate system WKT lives in a `.prj` file next to
//! the grid.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{HrdsError, Result};
use crate::grid::Grid;
use crate::io::Projection;

/// Sentinel written for missing cells when the grid has no sentinel of its
/// own.
pub const DEFAULT_NO_DATA: f64 = -9999.0;

#[derive(Debug, Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    no_data: Option<f64>,
}

/// Read an ASCII grid and its optional `.prj` sidecar.
pub fn read(path: &Path) -> Result<(Grid, Projection)> {
    let text = fs::read_to_string(path).map_err(|e| HrdsError::load(path, e))?;
    let grid = parse(&text).map_err(|msg| HrdsError::load(path, msg))?;

    let prj = path.with_extension("prj");
    let projection = if prj.is_file() {
        let wkt = fs::read_to_string(&prj).map_err(|e| HrdsError::load(&prj, e))?;
        Projection::from_wkt(wkt.trim())
    } else {
        Projection::default()
    };
    Ok((grid, projection))
}

/// Parse the text of an ASCII grid.
pub fn parse(text: &str) -> std::result::Result<Grid, String> {
    let mut header = Header::default();
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.peek() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            lines.next();
            continue;
        };
        // The first line starting with a number begins the data block.
        if key.parse::<f64>().is_ok() {
            break;
        }
        let value = tokens
            .next()
            .ok_or_else(|| format!("header key {} has no value", key))?;
        let number: f64 = value
            .parse()
            .map_err(|_| format!("header key {} has non-numeric value {}", key, value))?;

        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(count(key, number)?),
            "nrows" => header.nrows = Some(count(key, number)?),
            "xllcorner" => header.xll = Some((number, false)),
            "xllcenter" => header.xll = Some((number, true)),
            "yllcorner" => header.yll = Some((number, false)),
            "yllcenter" => header.yll = Some((number, true)),
            "cellsize" => header.cellsize = Some(number),
            "dx" => header.dx = Some(number),
            "dy" => header.dy = Some(number),
            "nodata_value" => header.no_data = Some(number),
            _ => return Err(format!("unknown header key {}", key)),
        }
        lines.next();
    }

    let cols = header.ncols.ok_or("missing ncols")?;
    let rows = header.nrows.ok_or("missing nrows")?;
    let (dx, dy) = match (header.cellsize, header.dx, header.dy) {
        (Some(size), _, _) => (size, size),
        (None, Some(dx), Some(dy)) => (dx, dy),
        _ => return Err("missing cellsize".to_string()),
    };
    let (xll, x_centre) = header.xll.ok_or("missing xllcorner")?;
    let (yll, y_centre) = header.yll.ok_or("missing yllcorner")?;
    let origin = (
        if x_centre { xll - dx / 2.0 } else { xll },
        if y_centre { yll - dy / 2.0 } else { yll },
    );

    let expected = rows
        .checked_mul(cols)
        .ok_or_else(|| format!("{}x{} grid is too large", rows, cols))?;

    // Grows with the data rather than trusting the header's size.
    let mut values = Vec::new();
    for line in lines {
        for token in line.split_whitespace() {
            let v: f64 = token
                .parse()
                .map_err(|_| format!("invalid value {}", token))?;
            if values.len() == expected {
                return Err(format!(
                    "more than {} values for {}x{} grid",
                    expected, rows, cols
                ));
            }
            values.push(v);
        }
    }
    if values.len() != expected {
        return Err(format!(
            "expected {} values for {}x{} grid, found {}",
            expected,
            rows,
            cols,
            values.len()
        ));
    }

    Grid::from_north_up(origin, (dx, dy), rows, cols, values, header.no_data)
        .map_err(|e| e.to_string())
}

fn count(key: &str, number: f64) -> std::result::Result<usize, String> {
    if number >= 1.0 && number.fract() == 0.0 {
        Ok(number as usize)
    } else {
        Err(format!("{} must be a positive integer, got {}", key, number))
    }
}

/// Render a grid as ASCII grid text.
pub fn to_string(grid: &Grid) -> String {
    let (ox, oy) = grid.origin();
    let (dx, dy) = grid.cell_size();
    let no_data = grid.no_data().unwrap_or(DEFAULT_NO_DATA);

    let mut out = String::new();
    let _ = writeln!(out, "ncols {}", grid.cols());
    let _ = writeln!(out, "nrows {}", grid.rows());
    let _ = writeln!(out, "xllcorner {}", ox);
    let _ = writeln!(out, "yllcorner {}", oy);
    if dx == dy {
        let _ = writeln!(out, "cellsize {}", dx);
    } else {
        let _ = writeln!(out, "dx {}", dx);
        let _ = writeln!(out, "dy {}", dy);
    }
    if grid.no_data().is_some() || grid.missing_count() > 0 {
        let _ = writeln!(out, "NODATA_value {}", no_data);
    }

    for row in grid.rows_north_up() {
        let line: Vec<String> = row
            .iter()
            .map(|v| if v.is_nan() { no_data } else { *v })
            .map(|v| v.to_string())
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// Write a grid, plus a `.prj` sidecar if the projection has WKT.
pub fn write(path: &Path, grid: &Grid, projection: &Projection) -> Result<()> {
    fs::write(path, to_string(grid)).map_err(|e| HrdsError::write(path, e))?;
    if let Some(wkt) = &projection.wkt {
        let prj = path.with_extension("prj");
        fs::write(&prj, wkt).map_err(|e| HrdsError::write(&prj, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SIXTEEN: &str = "\
ncols 4
nrows 4
xllcorner 0
yllcorner 0
cellsize 1
1 2 3 4
5 6 7 8
9 10 11 12
13 14 15 16
";

    #[test]
    fn test_parse_is_south_first() {
        let grid = parse(SIXTEEN).unwrap();
        assert_eq!(grid.shape(), (4, 4));
        assert_eq!(grid.origin(), (0.0, 0.0));
        assert_eq!(grid.cell_size(), (1.0, 1.0));
        assert_eq!(grid.get(0, 0), Some(13.0));
        assert_eq!(grid.get(3, 3), Some(4.0));
        assert_eq!(grid.no_data(), None);
    }

    #[test]
    fn test_parse_centre_origin_and_rectangular_cells() {
        let text = "NCOLS 2\nNROWS 1\nXLLCENTER 10\nYLLCENTER 20\nDX 2\nDY 4\nNODATA_VALUE -1\n5 -1\n";
        let grid = parse(text).unwrap();
        assert_eq!(grid.origin(), (9.0, 18.0));
        assert_eq!(grid.cell_size(), (2.0, 4.0));
        assert!(grid.is_missing(0, 1));
        assert_eq!(grid.no_data(), Some(-1.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n")
            .unwrap_err()
            .contains("expected 4 values"));
        assert!(parse("ncols 2\nnrows 1\nyllcorner 0\ncellsize 1\n1 2\n")
            .unwrap_err()
            .contains("xllcorner"));
        assert!(parse("ncols 2.5\n").is_err());
        assert!(parse("colour blue\n").is_err());
        assert!(parse("ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\nfoo\n").is_err());
    }

    #[test]
    fn test_parse_oversized_header() {
        let err = parse(
            "ncols 4294967296\nnrows 4294967296\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n",
        )
        .unwrap_err();
        assert!(err.contains("too large"), "{}", err);

        // Large but representable: fails on the data, not on allocation.
        let err = parse("ncols 100000\nnrows 100000\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n")
            .unwrap_err();
        assert!(err.contains("found 2"), "{}", err);

        let err = parse("ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n")
            .unwrap_err();
        assert!(err.contains("more than 2 values"), "{}", err);
    }

    #[test]
    fn test_write_round_trips_values_and_projection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layer.asc");
        let mut values: Vec<f64> = (0..6).map(|v| v as f64 * 0.1).collect();
        values[4] = f64::NAN;
        let grid = Grid::new((5.5, -3.0), (0.5, 0.25), 2, 3, values, None).unwrap();
        let projection = Projection::from_wkt("PROJCS[\"UTM 30N\"]");

        write(&path, &grid, &projection).unwrap();
        assert!(dir.path().join("layer.prj").exists());

        let (read_back, read_projection) = read(&path).unwrap();
        assert_eq!(read_projection, projection);
        assert_eq!(read_back.shape(), grid.shape());
        assert_eq!(read_back.origin(), grid.origin());
        assert_eq!(read_back.cell_size(), grid.cell_size());
        assert_eq!(read_back.no_data(), Some(DEFAULT_NO_DATA));
        assert!(read_back.is_missing(1, 1));
        assert_eq!(read_back.get(0, 1), grid.get(0, 1));
        assert_eq!(read_back.get(1, 2), grid.get(1, 2));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read(Path::new("/nonexistent/layer.asc")).unwrap_err();
        assert!(matches!(err, HrdsError::DatasetLoad { .. }));
    }
}
