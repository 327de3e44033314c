use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::StackArgs;

#[derive(Serialize)]
struct ValueResponse<'a> {
    x: f64,
    y: f64,
    value: f64,
    /// Highest priority layer contributing to the value, absent on the base
    #[serde(skip_serializing_if = "Option::is_none")]
    layer: Option<&'a str>,
}

pub fn run(stack: &StackArgs, x: f64, y: f64, json: bool) -> Result<()> {
    let hrds = stack.build()?;

    let value = hrds
        .get_value(x, y)
        .with_context(|| format!("Failed to get value at ({}, {})", x, y))?;

    if json {
        let response = ValueResponse {
            x,
            y,
            value,
            layer: hrds.source_layer(x, y).map(|layer| layer.name()),
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{}", value);
    }

    Ok(())
}
