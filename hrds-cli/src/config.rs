//! Stack configuration: a JSON manifest or command-line flags.

use anyhow::{bail, Context, Result};
use clap::Args;
use hrds::{BufferSource, ClampRange, Hrds, HrdsBuilder};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Options selecting the raster stack to query.
#[derive(Args, Debug)]
pub struct StackArgs {
    /// JSON stack manifest
    #[arg(short, long, env = "HRDS_STACK", global = true)]
    pub stack: Option<PathBuf>,

    /// Base raster (when no manifest is given)
    #[arg(short, long, env = "HRDS_BASE_RASTER", global = true)]
    pub base: Option<PathBuf>,

    /// Overlay raster as PATH:DISTANCE, lowest priority first (repeatable)
    #[arg(short, long = "layer", value_parser = parse_layer, global = true)]
    pub layers: Vec<(PathBuf, f64)>,

    /// Maximum rasters in cache
    #[arg(short, long, env = "HRDS_CACHE_SIZE", default_value = "16", global = true)]
    pub cache_size: u64,
}

impl StackArgs {
    /// Load every raster and build the stack.
    pub fn build(&self) -> Result<Hrds> {
        let builder = match (&self.stack, &self.base) {
            (Some(manifest), _) => StackConfig::load(manifest)?.into_builder(),
            (None, Some(base)) => {
                let mut builder = HrdsBuilder::new(base);
                for (path, distance) in &self.layers {
                    builder = builder.layer(path, *distance);
                }
                builder
            }
            (None, None) => bail!(
                "No raster stack configured. Use --stack or --base, or set HRDS_STACK or HRDS_BASE_RASTER"
            ),
        };

        builder
            .cache_size(self.cache_size)
            .build()
            .context("Failed to build raster stack")
    }
}

fn parse_layer(s: &str) -> std::result::Result<(PathBuf, f64), String> {
    let (path, distance) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected PATH:DISTANCE, got '{}'", s))?;
    let distance: f64 = distance
        .parse()
        .map_err(|_| format!("invalid distance '{}'", distance))?;
    Ok((PathBuf::from(path), distance))
}

/// Bounds applied to a raster's values.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct ClampConfig {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl From<ClampConfig> for ClampRange {
    fn from(clamp: ClampConfig) -> Self {
        ClampRange::new(clamp.min, clamp.max)
    }
}

/// A layer's buffer: generated from a distance or loaded from a file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LayerBuffer {
    Distance { distance: f64 },
    File { buffer: PathBuf },
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct LayerConfig {
    pub path: PathBuf,
    /// Overrides the stack-wide clamp for this layer.
    pub clamp: Option<ClampConfig>,
    #[serde(flatten)]
    pub buffer: LayerBuffer,
}

/// A stack manifest.
///
/// ```json
/// {
///   "base": "gebco_uk.tif",
///   "layers": [
///     {"path": "emod_utm.tif", "distance": 700.0, "clamp": {"max": -10.0}},
///     {"path": "inspire_data.tif", "buffer": "inspire_data_buffer.tif"}
///   ],
///   "base_clamp": {"max": -25.0},
///   "clamp": {"max": 0.0},
///   "save_buffers": true
/// }
/// ```
///
/// Layers are listed lowest priority first. `clamp` applies to every raster
/// without a clamp of its own. Relative paths are resolved against the
/// manifest's directory.
#[derive(Debug, Deserialize, PartialEq)]
pub struct StackConfig {
    pub base: PathBuf,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
    pub base_clamp: Option<ClampConfig>,
    pub clamp: Option<ClampConfig>,
    pub oversample: Option<f64>,
    #[serde(default = "default_save_buffers")]
    pub save_buffers: bool,
    pub buffer_dir: Option<PathBuf>,
    #[serde(default)]
    pub require_base_coverage: bool,
}

fn default_save_buffers() -> bool {
    true
}

impl StackConfig {
    /// Read a manifest, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open stack manifest {}", path.display()))?;
        let mut config: StackConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse stack manifest {}", path.display()))?;

        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        resolve(&mut self.base);
        for layer in &mut self.layers {
            resolve(&mut layer.path);
            if let LayerBuffer::File { buffer } = &mut layer.buffer {
                resolve(buffer);
            }
        }
        if let Some(buffer_dir) = &mut self.buffer_dir {
            resolve(buffer_dir);
        }
    }

    pub fn into_builder(self) -> HrdsBuilder {
        let mut builder = HrdsBuilder::new(&self.base)
            .save_buffers(self.save_buffers)
            .require_base_coverage(self.require_base_coverage);

        for layer in self.layers {
            let source = match layer.buffer {
                LayerBuffer::Distance { distance } => BufferSource::Distance(distance),
                LayerBuffer::File { buffer } => BufferSource::File(buffer),
            };
            builder = match layer.clamp {
                Some(clamp) => builder.layer_clamped(layer.path, source, clamp.into()),
                None => builder.layer_with_source(layer.path, source),
            };
        }
        if let Some(clamp) = self.base_clamp {
            builder = builder.base_clamp(clamp.into());
        }
        if let Some(clamp) = self.clamp {
            builder = builder.clamp(clamp.into());
        }
        if let Some(over) = self.oversample {
            builder = builder.oversample(over);
        }
        if let Some(dir) = self.buffer_dir {
            builder = builder.buffer_dir(dir);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_layer() {
        assert_eq!(
            parse_layer("data/emod.tif:700").unwrap(),
            (PathBuf::from("data/emod.tif"), 700.0)
        );
        assert!(parse_layer("emod.tif").is_err());
        assert!(parse_layer("emod.tif:far").is_err());
    }

    #[test]
    fn test_manifest_defaults() {
        let config: StackConfig = serde_json::from_str(r#"{"base": "base.tif"}"#).unwrap();
        assert!(config.layers.is_empty());
        assert!(config.save_buffers);
        assert!(!config.require_base_coverage);
        assert_eq!(config.clamp, None);
    }

    #[test]
    fn test_manifest_layers() {
        let config: StackConfig = serde_json::from_str(
            r#"{
                "base": "base.tif",
                "layers": [
                    {"path": "emod.tif", "distance": 700.0, "clamp": {"max": -10.0}},
                    {"path": "inspire.tif", "buffer": "inspire_buffer.tif"}
                ],
                "base_clamp": {"max": -25.0},
                "clamp": {"max": 0.0},
                "save_buffers": false
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.layers[0].buffer,
            LayerBuffer::Distance { distance: 700.0 }
        );
        assert_eq!(
            config.layers[0].clamp,
            Some(ClampConfig {
                min: None,
                max: Some(-10.0)
            })
        );
        assert_eq!(config.layers[1].clamp, None);
        assert_eq!(
            config.base_clamp.map(ClampRange::from),
            Some(ClampRange::new(None, Some(-25.0)))
        );
        assert_eq!(
            config.layers[1].buffer,
            LayerBuffer::File {
                buffer: PathBuf::from("inspire_buffer.tif")
            }
        );
        assert_eq!(
            config.clamp,
            Some(ClampConfig {
                min: None,
                max: Some(0.0)
            })
        );
        assert!(!config.save_buffers);
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("stack.json");
        let mut file = File::create(&manifest).unwrap();
        write!(
            file,
            r#"{{"base": "base.asc", "layers": [{{"path": "/abs/layer.asc", "buffer": "b.tif"}}]}}"#
        )
        .unwrap();

        let config = StackConfig::load(&manifest).unwrap();
        assert_eq!(config.base, dir.path().join("base.asc"));
        assert_eq!(config.layers[0].path, PathBuf::from("/abs/layer.asc"));
        assert_eq!(
            config.layers[0].buffer,
            LayerBuffer::File {
                buffer: dir.path().join("b.tif")
            }
        );
    }

    #[test]
    fn test_no_stack_configured() {
        let args = StackArgs {
            stack: None,
            base: None,
            layers: Vec::new(),
            cache_size: 16,
        };
        let err = args.build().unwrap_err();
        assert!(err.to_string().contains("No raster stack configured"));
    }
}
