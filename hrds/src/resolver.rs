//! Hierarchical resolution over a stack of rasters.
//!
//! This module provides [`Hrds`], which answers point queries from a base
//! raster overlaid by any number of higher resolution rasters, and
//! [`HrdsBuilder`], which loads the rasters and prepares their buffers.
//!
//! Each overlay ("layer") is paired with a buffer: a grid that is 0 at the
//! layer's edge and rises to 1 some distance inside it. A query takes the
//! highest priority layer containing the point and blends it with the next
//! layer down (or the base) using the buffer as weight, so the transition
//! between datasets is smooth.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::buffer::{buffer_path_for, BufferBuilder};
use crate::error::{HrdsError, Result};
use crate::grid::{ClampRange, Extent};
use crate::interpolator::Interpolator;
use crate::loader::{RasterLoader, DEFAULT_CACHE_SIZE};

/// One overlay: a dataset and the buffer that weights it.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    dataset: Interpolator,
    buffer: Interpolator,
}

impl Layer {
    pub fn new(name: impl Into<String>, dataset: Interpolator, buffer: Interpolator) -> Self {
        Self {
            name: name.into(),
            dataset,
            buffer,
        }
    }

    /// Name of the layer, the file stem of its dataset when loaded from disk.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset(&self) -> &Interpolator {
        &self.dataset
    }

    pub fn buffer(&self) -> &Interpolator {
        &self.buffer
    }

    /// Buffer weight at the point. A buffer that does not reach the point
    /// gives no confidence.
    fn weight(&self, x: f64, y: f64) -> Result<f64> {
        if !self.buffer.point_in(x, y) {
            return Ok(0.0);
        }
        self.buffer.get_value(x, y)
    }
}

/// A base raster overlaid by prioritised layers.
///
/// Immutable after construction, so it can be shared across threads and
/// queried concurrently.
///
/// # Example
///
/// ```ignore
/// use hrds::Hrds;
///
/// let hrds = Hrds::builder("gebco_uk.tif")
///     .layer("emod_utm.tif", 700.0)
///     .layer("inspire_data.tif", 200.0)
///     .build()?;
///
/// let depth = hrds.get_value(324_567.89, 6_500_000.0)?;
/// ```
#[derive(Debug, Clone)]
pub struct Hrds {
    base: Interpolator,
    /// Highest priority first.
    layers: Vec<Layer>,
}

impl Hrds {
    /// Assemble a stack from layers given in increasing priority: the last
    /// layer wins wherever it has data.
    pub fn new(base: Interpolator, layers: Vec<Layer>) -> Self {
        let mut layers = layers;
        layers.reverse();
        Self { base, layers }
    }

    /// Create a builder loading the base raster from `base`.
    pub fn builder<P: AsRef<Path>>(base: P) -> HrdsBuilder {
        HrdsBuilder::new(base)
    }

    /// Resolve the value at `(x, y)`.
    ///
    /// The highest priority layer containing the point is blended with the
    /// next layer down (or the base) by its buffer weight. Where that layer
    /// cannot be interpolated because a neighbouring cell is missing, the
    /// layer below is used on its own. Generated buffers are zero on missing
    /// cells and their four neighbours, but a cell diagonal to a hole keeps
    /// some weight, so the result can step by `w * (upper - lower)` on the
    /// edge of the cell square that touches the hole.
    ///
    /// # Errors
    ///
    /// Returns [`HrdsError::CoordinateOutOfRange`] when no layer contains the
    /// point and the base cannot interpolate it either.
    pub fn get_value(&self, x: f64, y: f64) -> Result<f64> {
        for (i, layer) in self.layers.iter().enumerate() {
            if !layer.dataset.point_in(x, y) {
                continue;
            }

            let w = layer.weight(x, y)?;
            if w.is_nan() || w <= 0.0 {
                return self.below(i, x, y);
            }
            let upper = layer.dataset.get_value(x, y)?;
            if upper.is_nan() {
                return self.below(i, x, y);
            }
            if w >= 1.0 {
                return Ok(upper);
            }
            let lower = self.below(i, x, y)?;
            return Ok(upper * w + lower * (1.0 - w));
        }
        self.base.get_value(x, y)
    }

    /// Value of the first layer below `index` containing the point, or of
    /// the base.
    fn below(&self, index: usize, x: f64, y: f64) -> Result<f64> {
        match self.layers[index + 1..]
            .iter()
            .find(|l| l.dataset.point_in(x, y))
        {
            Some(next) => next.dataset.get_value(x, y),
            None => self.base.get_value(x, y),
        }
    }

    /// Resolve many points, using `default` where a point cannot be resolved.
    pub fn get_values(&self, points: &[(f64, f64)], default: f64) -> Vec<f64> {
        points
            .iter()
            .map(|&(x, y)| self.get_value(x, y).unwrap_or(default))
            .collect()
    }

    /// Resolve many points, failing on the first that cannot be resolved.
    pub fn try_get_values(&self, points: &[(f64, f64)]) -> Result<Vec<f64>> {
        points.iter().map(|&(x, y)| self.get_value(x, y)).collect()
    }

    /// The highest priority layer containing the point, if any.
    pub fn top_layer(&self, x: f64, y: f64) -> Option<&Layer> {
        self.layers.iter().find(|l| l.dataset.point_in(x, y))
    }

    /// The highest priority layer that contributes to [`Self::get_value`]
    /// at the point, or `None` when the value comes from the base alone.
    ///
    /// Differs from [`Self::top_layer`] where the top layer has no weight
    /// or no data and the value is taken from the layer below it.
    pub fn source_layer(&self, x: f64, y: f64) -> Option<&Layer> {
        let (i, layer) = self
            .layers
            .iter()
            .enumerate()
            .find(|(_, l)| l.dataset.point_in(x, y))?;

        let w = layer.weight(x, y).unwrap_or(0.0);
        let upper = layer.dataset.get_value(x, y).unwrap_or(f64::NAN);
        if w.is_nan() || w <= 0.0 || upper.is_nan() {
            self.layers[i + 1..]
                .iter()
                .find(|l| l.dataset.point_in(x, y))
        } else {
            Some(layer)
        }
    }

    pub fn base(&self) -> &Interpolator {
        &self.base
    }

    /// Layers, highest priority first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Extent of the base raster.
    pub fn extent(&self) -> Extent {
        self.base.extent()
    }
}

/// Where a layer's buffer comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferSource {
    /// Generate a buffer rising to 1 over this distance.
    Distance(f64),
    /// Load a previously generated buffer.
    File(PathBuf),
}

#[derive(Debug, Clone)]
struct LayerSpec {
    path: PathBuf,
    buffer: BufferSource,
    clamp: Option<ClampRange>,
}

/// Builder for [`Hrds`].
///
/// Layers are added in increasing priority.
///
/// ```ignore
/// use hrds::{ClampRange, HrdsBuilder};
///
/// let hrds = HrdsBuilder::new("gebco_uk.tif")
///     .layer("emod_utm.tif", 700.0)
///     .layer_with_buffer("inspire_data.tif", "inspire_data_buffer.tif")
///     .clamp(ClampRange::new(None, Some(0.0)))
///     .buffer_dir("/tmp/buffers")
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct HrdsBuilder {
    base: PathBuf,
    base_clamp: Option<ClampRange>,
    layers: Vec<LayerSpec>,
    oversample: Option<f64>,
    save_buffers: bool,
    buffer_dir: Option<PathBuf>,
    clamp: Option<ClampRange>,
    require_base_coverage: bool,
    cache_size: u64,
    loader: Option<RasterLoader>,
}

impl HrdsBuilder {
    /// Create a builder with the given base raster.
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            base_clamp: None,
            layers: Vec::new(),
            oversample: None,
            save_buffers: true,
            buffer_dir: None,
            clamp: None,
            require_base_coverage: false,
            cache_size: DEFAULT_CACHE_SIZE,
            loader: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `HRDS_BASE_RASTER` | Base raster path | Required |
    /// | `HRDS_CACHE_SIZE` | Maximum rasters in cache | 16 |
    /// | `HRDS_BUFFER_DIR` | Where generated buffers are written | Next to each layer |
    ///
    /// # Errors
    ///
    /// Returns [`HrdsError::Config`] if `HRDS_BASE_RASTER` is not set.
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("HRDS_BASE_RASTER").map_err(|_| HrdsError::Config {
            message: "HRDS_BASE_RASTER environment variable not set".to_string(),
        })?;

        let cache_size: u64 = std::env::var("HRDS_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        let mut builder = Self::new(base).cache_size(cache_size);
        if let Ok(dir) = std::env::var("HRDS_BUFFER_DIR") {
            builder = builder.buffer_dir(dir);
        }
        Ok(builder)
    }

    /// Add a layer whose buffer is generated to reach full confidence at
    /// `distance` (in raster units) from its edge.
    pub fn layer<P: AsRef<Path>>(mut self, path: P, distance: f64) -> Self {
        self.layers.push(LayerSpec {
            path: path.as_ref().to_path_buf(),
            buffer: BufferSource::Distance(distance),
            clamp: None,
        });
        self
    }

    /// Add a layer with a previously generated buffer raster.
    pub fn layer_with_buffer<P: AsRef<Path>, B: AsRef<Path>>(mut self, path: P, buffer: B) -> Self {
        self.layers.push(LayerSpec {
            path: path.as_ref().to_path_buf(),
            buffer: BufferSource::File(buffer.as_ref().to_path_buf()),
            clamp: None,
        });
        self
    }

    /// Add a layer from an explicit buffer source.
    pub fn layer_with_source<P: AsRef<Path>>(mut self, path: P, buffer: BufferSource) -> Self {
        self.layers.push(LayerSpec {
            path: path.as_ref().to_path_buf(),
            buffer,
            clamp: None,
        });
        self
    }

    /// Add a layer whose values are clipped into its own `clamp`, in place
    /// of the stack-wide one.
    pub fn layer_clamped<P: AsRef<Path>>(
        mut self,
        path: P,
        buffer: BufferSource,
        clamp: ClampRange,
    ) -> Self {
        self.layers.push(LayerSpec {
            path: path.as_ref().to_path_buf(),
            buffer,
            clamp: Some(clamp),
        });
        self
    }

    /// Add several layers with one distance each.
    ///
    /// # Errors
    ///
    /// Returns [`HrdsError::StackMismatch`] if the lists differ in length.
    pub fn layers<P: AsRef<Path>>(mut self, paths: &[P], distances: &[f64]) -> Result<Self> {
        if paths.len() != distances.len() {
            return Err(HrdsError::StackMismatch {
                datasets: paths.len(),
                buffers: distances.len(),
            });
        }
        for (path, &distance) in paths.iter().zip(distances) {
            self = self.layer(path, distance);
        }
        Ok(self)
    }

    /// Add several layers with one pre-built buffer each.
    ///
    /// # Errors
    ///
    /// Returns [`HrdsError::StackMismatch`] if the lists differ in length.
    pub fn layers_with_buffers<P: AsRef<Path>, B: AsRef<Path>>(
        mut self,
        paths: &[P],
        buffers: &[B],
    ) -> Result<Self> {
        if paths.len() != buffers.len() {
            return Err(HrdsError::StackMismatch {
                datasets: paths.len(),
                buffers: buffers.len(),
            });
        }
        for (path, buffer) in paths.iter().zip(buffers) {
            self = self.layer_with_buffer(path, buffer);
        }
        Ok(self)
    }

    /// Generate buffers with `over` cells per buffer distance instead of at
    /// each layer's own resolution.
    pub fn oversample(mut self, over: f64) -> Self {
        self.oversample = Some(over);
        self
    }

    /// Write generated buffers to disk. Enabled by default.
    pub fn save_buffers(mut self, save: bool) -> Self {
        self.save_buffers = save;
        self
    }

    /// Write generated buffers into `dir` instead of next to each layer.
    pub fn buffer_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.buffer_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Clip values of the base and every layer into `clamp`.
    ///
    /// [`Self::base_clamp`] and [`Self::layer_clamped`] take precedence for
    /// the rasters they name.
    pub fn clamp(mut self, clamp: ClampRange) -> Self {
        self.clamp = Some(clamp);
        self
    }

    /// Clip values of the base raster into `clamp`.
    pub fn base_clamp(mut self, clamp: ClampRange) -> Self {
        self.base_clamp = Some(clamp);
        self
    }

    /// Fail the build if any layer reaches outside the base raster.
    ///
    /// Off by default, in which case such layers only produce a warning and
    /// queries in the uncovered region fail at the base.
    pub fn require_base_coverage(mut self, require: bool) -> Self {
        self.require_base_coverage = require;
        self
    }

    /// Set the maximum number of rasters kept in the loader's cache.
    ///
    /// Ignored when a loader is supplied with [`Self::loader`].
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Load rasters through an existing loader, sharing its cache.
    pub fn loader(mut self, loader: RasterLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Load every raster, prepare buffers and build the stack.
    pub fn build(self) -> Result<Hrds> {
        let loader = self
            .loader
            .clone()
            .unwrap_or_else(|| RasterLoader::new(self.cache_size));

        let mut base = loader.load(&self.base)?.interpolator(1)?;
        if let Some(clamp) = self.base_clamp.or(self.clamp) {
            base = base.with_clamp(clamp);
        }
        let base_extent = base.interpolable_extent();

        let mut layers = Vec::with_capacity(self.layers.len());
        for spec in &self.layers {
            let raster = loader.load(&spec.path)?;
            let name = layer_name(&spec.path);
            let mut dataset = raster.interpolator(1)?;
            if let Some(clamp) = spec.clamp.or(self.clamp) {
                dataset = dataset.with_clamp(clamp);
            }

            if !base_extent.contains_extent(&dataset.interpolable_extent()) {
                if self.require_base_coverage {
                    return Err(HrdsError::BaseCoverage { layer: name });
                }
                warn!(layer = %name, "Layer extends beyond the base raster");
            }

            let buffer = match &spec.buffer {
                BufferSource::File(path) => loader.load(path)?.interpolator(1)?,
                BufferSource::Distance(distance) => {
                    let mut builder = BufferBuilder::new(*distance);
                    if let Some(over) = self.oversample {
                        builder = builder.oversample(over);
                    }
                    let grid = if self.save_buffers {
                        let output = buffer_path_for(&spec.path, self.buffer_dir.as_deref());
                        builder.make_buffer(&raster, &output)?
                    } else {
                        builder.generate(raster.grid())?
                    };
                    Interpolator::new(grid)
                }
            };

            layers.push(Layer::new(name, dataset, buffer));
        }

        info!(
            base = %self.base.display(),
            layers = layers.len(),
            "Built raster stack"
        );
        Ok(Hrds::new(base, layers))
    }
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
