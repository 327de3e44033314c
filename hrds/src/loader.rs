//! Raster loading with caching.
//!
//! [`RasterLoader`] keeps recently loaded rasters in memory, so stacks that
//! share a base raster (or a process building many stacks from the same
//! files) only read each file once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;
use tracing::debug;

use crate::error::Result;
use crate::io::{self, Raster};

/// Default number of rasters kept in memory.
pub const DEFAULT_CACHE_SIZE: u64 = 16;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of rasters currently in the cache.
    pub entry_count: u64,
    /// Number of loads served from the cache.
    pub hit_count: u64,
    /// Number of loads that read the file.
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Loads rasters from disk through an LRU cache.
///
/// Cloning a loader shares its cache and counters.
///
/// # Example
///
/// ```ignore
/// use hrds::RasterLoader;
///
/// let loader = RasterLoader::new(16);
/// let base = loader.load("gebco_uk.tif")?;
/// let again = loader.load("gebco_uk.tif")?; // served from cache
/// println!("Cache hit rate: {:.1}%", loader.cache_stats().hit_rate() * 100.0);
/// ```
#[derive(Clone)]
pub struct RasterLoader {
    cache: Cache<PathBuf, Arc<Raster>>,
    hit_count: Arc<AtomicU64>,
    miss_count: Arc<AtomicU64>,
}

impl RasterLoader {
    /// Create a loader holding at most `cache_size` rasters.
    pub fn new(cache_size: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(cache_size).build(),
            hit_count: Arc::new(AtomicU64::new(0)),
            miss_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Load the raster at `path`, from the cache if it has been loaded before.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Raster>> {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        if let Some(raster) = self.cache.get(&key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(raster);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let raster = Arc::new(io::load(path)?);
        self.cache.insert(key, Arc::clone(&raster));
        debug!(path = %path.display(), "Cached raster");
        Ok(raster)
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> u64 {
        self.cache.policy().max_capacity().unwrap_or(0)
    }

    /// Drop one raster from the cache, e.g. after the file was rewritten.
    pub fn invalidate<P: AsRef<Path>>(&self, path: P) {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.cache.invalidate(&key);
    }

    /// Clear all rasters from the cache.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for RasterLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl std::fmt::Debug for RasterLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterLoader")
            .field("stats", &self.cache_stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::io::Projection;
    use tempfile::TempDir;

    fn create_test_raster(dir: &Path, name: &str, value: f64) -> PathBuf {
        let path = dir.join(name);
        let grid = Grid::filled((0.0, 0.0), (1.0, 1.0), 3, 3, value).unwrap();
        io::write(&path, &grid, &Projection::default()).unwrap();
        path
    }

    #[test]
    fn test_cache_stats() {
        let stats = CacheStats {
            entry_count: 5,
            hit_count: 80,
            miss_count: 20,
        };
        assert_eq!(stats.hit_rate(), 0.8);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_cache_hit() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_raster(temp_dir.path(), "base.asc", 4.0);
        let loader = RasterLoader::new(10);

        let first = loader.load(&path).unwrap();
        let second = loader.load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = loader.cache_stats();
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_count, 1);
    }

    #[test]
    fn test_clones_share_cache() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_raster(temp_dir.path(), "base.tif", 1.0);
        let loader = RasterLoader::new(10);
        let clone = loader.clone();

        loader.load(&path).unwrap();
        clone.load(&path).unwrap();
        assert_eq!(loader.cache_stats().hit_count, 1);
    }

    #[test]
    fn test_clear_and_invalidate() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_raster(temp_dir.path(), "base.asc", 2.0);
        let loader = RasterLoader::new(10);

        loader.load(&path).unwrap();
        loader.clear_cache();
        loader.load(&path).unwrap();
        assert_eq!(loader.cache_stats().miss_count, 2);

        // A rewritten file is picked up after invalidation.
        create_test_raster(temp_dir.path(), "base.asc", 9.0);
        loader.invalidate(&path);
        let raster = loader.load(&path).unwrap();
        assert_eq!(raster.grid().get(1, 1), Some(9.0));
        assert_eq!(loader.cache_stats().miss_count, 3);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let loader = RasterLoader::default();
        let err = loader.load(temp_dir.path().join("absent.asc")).unwrap_err();
        assert!(matches!(err, crate::HrdsError::DatasetLoad { .. }));
        assert_eq!(loader.cache_capacity(), DEFAULT_CACHE_SIZE);
    }
}
