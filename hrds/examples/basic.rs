//! Basic example demonstrating hrds library usage.
//!
//! Run with: cargo run --example basic -- BASE LAYER DISTANCE [X Y]...

use hrds::{Hrds, HrdsError};
use std::env;

fn main() -> Result<(), HrdsError> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 3 {
        eprintln!("Usage: cargo run --example basic -- BASE LAYER DISTANCE [X Y]...");
        std::process::exit(1);
    }

    let distance: f64 = args[2].parse().unwrap_or_else(|_| {
        eprintln!("DISTANCE must be a number, got {}", args[2]);
        std::process::exit(1);
    });

    // Generated buffers stay in memory
    let hrds = Hrds::builder(&args[0])
        .layer(&args[1], distance)
        .save_buffers(false)
        .build()?;

    let extent = hrds.extent();
    println!(
        "Base extent: ({}, {}) - ({}, {})",
        extent.min_x, extent.min_y, extent.max_x, extent.max_y
    );

    // Query the given points, or the centre of the base
    let mut points: Vec<(f64, f64)> = args[3..]
        .chunks_exact(2)
        .filter_map(|pair| Some((pair[0].parse().ok()?, pair[1].parse().ok()?)))
        .collect();
    if points.is_empty() {
        points.push((
            (extent.min_x + extent.max_x) / 2.0,
            (extent.min_y + extent.max_y) / 2.0,
        ));
    }

    println!("{:-<50}", "");
    for (x, y) in points {
        match hrds.get_value(x, y) {
            Ok(value) => {
                let source = hrds.source_layer(x, y).map(|l| l.name()).unwrap_or("base");
                println!("({}, {}): {:.3} [{}]", x, y, value, source);
            }
            Err(e) if e.is_out_of_range() => {
                println!("({}, {}): outside the base raster", x, y);
            }
            Err(e) => {
                println!("({}, {}): error - {}", x, y, e);
            }
        }
    }

    Ok(())
}
