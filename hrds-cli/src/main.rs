use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use config::StackArgs;

/// Hierarchical raster query tool
#[derive(Parser)]
#[command(name = "hrds")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    stack: StackArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the value at a single coordinate
    Query {
        /// X coordinate (easting or longitude)
        #[arg(short, long, allow_hyphen_values = true)]
        x: f64,

        /// Y coordinate (northing or latitude)
        #[arg(short, long, allow_hyphen_values = true)]
        y: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Query values for multiple coordinates from a file
    Batch {
        /// Input file (CSV or GeoJSON)
        input: PathBuf,

        /// Output file (same format as input if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for x (CSV only)
        #[arg(long, default_value = "x")]
        x_col: String,

        /// Column name for y (CSV only)
        #[arg(long, default_value = "y")]
        y_col: String,
    },

    /// Generate the distance buffer for a raster
    Buffer {
        /// Raster to buffer
        raster: PathBuf,

        /// Blending distance in map units
        #[arg(short, long)]
        distance: f64,

        /// Build the buffer on a grid of distance / OVERSAMPLE cells
        #[arg(long)]
        oversample: Option<f64>,

        /// Output file (defaults to <raster>_buffer.tif)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display information about a raster
    Info {
        /// Raster file (.asc, .tif or .hgt)
        raster: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "hrds=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query { x, y, json } => commands::query::run(&cli.stack, x, y, json),
        Commands::Batch {
            input,
            output,
            x_col,
            y_col,
        } => commands::batch::run(&cli.stack, input, output, x_col, y_col),
        Commands::Buffer {
            raster,
            distance,
            oversample,
            output,
        } => commands::buffer::run(raster, distance, oversample, output),
        Commands::Info { raster } => commands::info::run(raster),
    }
}
