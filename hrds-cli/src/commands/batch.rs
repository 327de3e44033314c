use anyhow::{bail, Context, Result};
use hrds::geojson::add_values_to_geometry;
use hrds::Hrds;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::StackArgs;

pub fn run(
    stack: &StackArgs,
    input: PathBuf,
    output: Option<PathBuf>,
    x_col: String,
    y_col: String,
) -> Result<()> {
    let hrds = stack.build()?;

    // Detect file format
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let output_path = match extension.as_str() {
        "csv" => {
            let output = output.unwrap_or_else(|| default_output(&input, "csv"));
            process_csv(&hrds, &input, &output, &x_col, &y_col)?;
            output
        }
        "geojson" | "json" => {
            let output = output.unwrap_or_else(|| default_output(&input, "geojson"));
            process_geojson(&hrds, &input, &output)?;
            output
        }
        _ => bail!(
            "Unsupported file format: {}. Use .csv or .geojson",
            extension
        ),
    };

    println!("Output written to: {}", output_path.display());
    Ok(())
}

fn default_output(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}_values.{}", stem, extension))
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn process_csv(hrds: &Hrds, input: &Path, output: &Path, x_col: &str, y_col: &str) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let x_idx = headers
        .iter()
        .position(|h| h == x_col)
        .with_context(|| format!("Column '{}' not found in CSV", x_col))?;
    let y_idx = headers
        .iter()
        .position(|h| h == y_col)
        .with_context(|| format!("Column '{}' not found in CSV", y_col))?;

    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;
    let pb = progress_bar(records.len() as u64)?;

    let output_file = File::create(output).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.push("value");
    writer.write_record(&new_headers)?;

    let mut misses = 0usize;
    for record in records {
        let x: f64 = record
            .get(x_idx)
            .context("Missing x")?
            .trim()
            .parse()
            .context("Invalid x")?;
        let y: f64 = record
            .get(y_idx)
            .context("Missing y")?
            .trim()
            .parse()
            .context("Invalid y")?;

        let value = match hrds.get_value(x, y) {
            Ok(value) => value.to_string(),
            Err(_) => {
                misses += 1;
                "void".to_string()
            }
        };

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&value);
        writer.write_record(&new_record)?;

        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    if misses > 0 {
        warn!(misses, "points outside the stack were written as void");
    }
    Ok(())
}

fn process_geojson(hrds: &Hrds, input: &Path, output: &Path) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let geojson: geojson::GeoJson =
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse GeoJSON")?;

    let result = match geojson {
        geojson::GeoJson::Geometry(geometry) => {
            geojson::GeoJson::Geometry(add_values_to_geometry(hrds, geometry)?)
        }
        geojson::GeoJson::Feature(mut feature) => {
            if let Some(geometry) = feature.geometry.take() {
                feature.geometry = Some(add_values_to_geometry(hrds, geometry)?);
            }
            geojson::GeoJson::Feature(feature)
        }
        geojson::GeoJson::FeatureCollection(mut fc) => {
            let pb = progress_bar(fc.features.len() as u64)?;
            for (i, feature) in fc.features.iter_mut().enumerate() {
                if let Some(geometry) = feature.geometry.take() {
                    let enriched = add_values_to_geometry(hrds, geometry)
                        .with_context(|| format!("Failed to resolve feature {}", i))?;
                    feature.geometry = Some(enriched);
                }
                pb.inc(1);
            }
            pb.finish_with_message("done");
            geojson::GeoJson::FeatureCollection(fc)
        }
    };

    let output_file = File::create(output).context("Failed to create output file")?;
    let mut writer = BufWriter::new(output_file);
    serde_json::to_writer_pretty(&mut writer, &result)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrds::io::Projection;
    use hrds::Grid;
    use tempfile::TempDir;

    fn flat_stack(dir: &Path) -> Hrds {
        let base = dir.join("base.asc");
        let grid = Grid::filled((0.0, 0.0), (1.0, 1.0), 10, 10, 4.0).unwrap();
        hrds::io::write(&base, &grid, &Projection::default()).unwrap();
        Hrds::builder(&base).build().unwrap()
    }

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("/data/points.csv"), "csv"),
            PathBuf::from("/data/points_values.csv")
        );
    }

    #[test]
    fn test_process_csv() {
        let dir = TempDir::new().unwrap();
        let hrds = flat_stack(dir.path());

        let input = dir.path().join("points.csv");
        std::fs::write(&input, "id,x,y\na,5.0,5.0\nb,50.0,5.0\n").unwrap();
        let output = dir.path().join("out.csv");

        process_csv(&hrds, &input, &output, "x", "y").unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["id,x,y,value", "a,5.0,5.0,4", "b,50.0,5.0,void"]);
    }

    #[test]
    fn test_process_csv_missing_column() {
        let dir = TempDir::new().unwrap();
        let hrds = flat_stack(dir.path());

        let input = dir.path().join("points.csv");
        std::fs::write(&input, "lon,lat\n5.0,5.0\n").unwrap();

        let err = process_csv(&hrds, &input, &dir.path().join("out.csv"), "x", "y").unwrap_err();
        assert!(err.to_string().contains("Column 'x' not found"));
    }

    #[test]
    fn test_process_geojson() {
        let dir = TempDir::new().unwrap();
        let hrds = flat_stack(dir.path());

        let input = dir.path().join("points.geojson");
        std::fs::write(
            &input,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [2.0, 3.0]}}
            ]}"#,
        )
        .unwrap();
        let output = dir.path().join("out.geojson");

        process_geojson(&hrds, &input, &output).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let result: geojson::GeoJson = text.parse().unwrap();
        let geojson::GeoJson::FeatureCollection(fc) = result else {
            panic!("Expected FeatureCollection");
        };
        let geometry = fc.features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.value, geojson::Value::Point(vec![2.0, 3.0, 4.0]));
    }
}
