use anyhow::{ensure, Context, Result};
use hrds::buffer::{buffer_path_for, BufferBuilder};
use std::path::PathBuf;

pub fn run(
    raster: PathBuf,
    distance: f64,
    oversample: Option<f64>,
    output: Option<PathBuf>,
) -> Result<()> {
    ensure!(
        distance > 0.0,
        "Buffer distance must be positive, got {}",
        distance
    );

    let source = hrds::io::load(&raster)
        .with_context(|| format!("Failed to load raster {}", raster.display()))?;

    let mut builder = BufferBuilder::new(distance);
    if let Some(over) = oversample {
        builder = builder.oversample(over);
    }

    let output_path = output.unwrap_or_else(|| buffer_path_for(&raster, None));
    let buffer = builder
        .make_buffer(&source, &output_path)
        .context("Failed to generate buffer")?;

    let (rows, cols) = buffer.shape();
    let (dx, dy) = buffer.cell_size();
    println!("Buffer: {} ({}x{} cells of {} x {})", output_path.display(), cols, rows, dx, dy);
    Ok(())
}
