use anyhow::{bail, Context, Result};
use hrds::RasterFormat;
use std::path::PathBuf;

pub fn run(raster: PathBuf) -> Result<()> {
    if !raster.exists() {
        bail!("Raster not found: {}", raster.display());
    }

    let format = RasterFormat::from_path(&raster).context("Unrecognised raster")?;
    let loaded = hrds::io::load(&raster).context("Failed to load raster")?;
    let grid = loaded.grid();

    let file_size = std::fs::metadata(&raster)?.len();
    let (rows, cols) = grid.shape();
    let (dx, dy) = grid.cell_size();
    let extent = grid.extent();

    println!("Raster: {}", raster.display());
    println!("Format: {}", format.name());
    println!("File size: {}", format_size(file_size));
    println!();
    println!("Size: {}x{} cells ({} bands)", cols, rows, loaded.band_count());
    println!("Cell size: {} x {}", dx, dy);
    println!(
        "Extent: ({}, {}) - ({}, {})",
        extent.min_x, extent.min_y, extent.max_x, extent.max_y
    );
    match loaded.projection().epsg() {
        Some(code) => println!("EPSG: {}", code),
        None if loaded.projection().is_empty() => println!("Projection: none"),
        None => println!("Projection: present (no EPSG code)"),
    }
    println!();

    if let Some((min, max)) = grid.min_max() {
        println!("Min value: {}", min);
        println!("Max value: {}", max);
    }

    let missing = grid.missing_count();
    if missing > 0 {
        let pct = (missing as f64 / (rows * cols) as f64) * 100.0;
        println!("No-data cells: {} ({:.1}%)", missing, pct);
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
