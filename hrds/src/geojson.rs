//! GeoJSON enrichment.
//!
//! This module sets the resolved value as the Z coordinate of GeoJSON
//! geometries. Enable the `geojson` feature to use this module.
//!
//! # Example
//!
//! ```ignore
//! use hrds::Hrds;
//! use hrds::geojson::add_values_to_geometry;
//! use geojson::Geometry;
//!
//! let hrds = Hrds::builder("gebco_uk.tif").layer("emod_utm.tif", 700.0).build()?;
//!
//! let geometry: Geometry = r#"{"type": "Point", "coordinates": [324567.9, 6500000.0]}"#
//!     .parse()
//!     .unwrap();
//!
//! let enriched = add_values_to_geometry(&hrds, geometry)?;
//! // Result: {"type": "Point", "coordinates": [324567.9, 6500000.0, -42.7]}
//! ```

use geojson::{Geometry, Value as GeoJsonValue};

use crate::error::{HrdsError, Result};
use crate::resolver::Hrds;

/// Set the resolved value as the Z coordinate of every position in a
/// geometry.
///
/// Positions are `[x, y]` or `[x, y, z]` in the stack's coordinate system;
/// an existing Z is replaced. All geometry types are supported, including
/// nested collections.
///
/// # Errors
///
/// Returns an error if a position has fewer than 2 elements or cannot be
/// resolved.
pub fn add_values_to_geometry(hrds: &Hrds, geometry: Geometry) -> Result<Geometry> {
    let new_value = match geometry.value {
        GeoJsonValue::Point(coord) => GeoJsonValue::Point(add_value_to_coord(hrds, &coord)?),
        GeoJsonValue::MultiPoint(coords) => {
            GeoJsonValue::MultiPoint(add_values_to_coords(hrds, &coords)?)
        }
        GeoJsonValue::LineString(coords) => {
            GeoJsonValue::LineString(add_values_to_coords(hrds, &coords)?)
        }
        GeoJsonValue::MultiLineString(lines) => {
            let lines: Result<Vec<_>> = lines
                .iter()
                .map(|line| add_values_to_coords(hrds, line))
                .collect();
            GeoJsonValue::MultiLineString(lines?)
        }
        GeoJsonValue::Polygon(rings) => {
            let rings: Result<Vec<_>> = rings
                .iter()
                .map(|ring| add_values_to_coords(hrds, ring))
                .collect();
            GeoJsonValue::Polygon(rings?)
        }
        GeoJsonValue::MultiPolygon(polygons) => {
            let polygons: Result<Vec<_>> = polygons
                .iter()
                .map(|polygon| {
                    polygon
                        .iter()
                        .map(|ring| add_values_to_coords(hrds, ring))
                        .collect::<Result<Vec<_>>>()
                })
                .collect();
            GeoJsonValue::MultiPolygon(polygons?)
        }
        GeoJsonValue::GeometryCollection(geometries) => {
            let geometries: Result<Vec<_>> = geometries
                .into_iter()
                .map(|g| add_values_to_geometry(hrds, g))
                .collect();
            GeoJsonValue::GeometryCollection(geometries?)
        }
    };

    Ok(Geometry::new(new_value))
}

/// Resolve one position `[x, y, ...]` into `[x, y, value]`.
pub fn add_value_to_coord(hrds: &Hrds, coord: &[f64]) -> Result<Vec<f64>> {
    if coord.len() < 2 {
        return Err(HrdsError::InvalidCoordinate {
            message: "Coordinate must have at least 2 elements (x, y)".to_string(),
        });
    }
    let (x, y) = (coord[0], coord[1]);
    Ok(vec![x, y, hrds.get_value(x, y)?])
}

/// Resolve a list of positions.
pub fn add_values_to_coords(hrds: &Hrds, coords: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    coords
        .iter()
        .map(|coord| add_value_to_coord(hrds, coord))
        .collect()
}
