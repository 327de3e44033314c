//! # HRDS - Hierarchical Raster Data Sets
//!
//! Query a point value (typically bathymetry or topography) from a stack of
//! rasters of different resolution and extent, blending smoothly between them
//! where they overlap.
//!
//! ## Features
//!
//! - **Bilinear sampling**: values are interpolated between cell centres
//! - **Priority stack**: the highest priority raster containing a point wins
//! - **Smooth transitions**: each overlay is blended into the layers below it
//!   through a distance buffer that rises from 0 at its edge to 1 inside it
//! - **Formats**: ESRI ASCII grids, GeoTIFF and SRTM `.hgt` tiles
//!
//! ## Quick Start
//!
//! ```ignore
//! use hrds::Hrds;
//!
//! // Layers are listed in increasing priority.
//! let hrds = Hrds::builder("gebco_uk.tif")
//!     .layer("emod_utm.tif", 700.0)
//!     .layer("inspire_data.tif", 200.0)
//!     .build()?;
//!
//! let depth = hrds.get_value(324_567.89, 6_500_000.0)?;
//! println!("Depth: {}m", depth);
//! ```
//!
//! ## Coordinate Systems
//!
//! No reprojection is done. Every raster in a stack, and every query point,
//! must be in the same coordinate system.

pub mod buffer;
pub mod edt;
pub mod error;
pub mod grid;
pub mod interpolator;
pub mod io;
pub mod loader;
pub mod resolver;

#[cfg(feature = "geojson")]
pub mod geojson;

// Re-export main types at crate root for convenience
pub use buffer::BufferBuilder;
pub use error::{HrdsError, Result};
pub use grid::{ClampRange, Extent, Grid};
pub use interpolator::Interpolator;
pub use io::{Projection, Raster, RasterFormat};
pub use loader::{CacheStats, RasterLoader};
pub use resolver::{BufferSource, Hrds, HrdsBuilder, Layer};
