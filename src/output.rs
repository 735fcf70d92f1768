// File export and console preview of datasets.
//
// The dashboard core only returns structured values; this module is the
// thin rendering layer the CLI drives.
use std::error::Error;

use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::types::{Dataset, Value};
use crate::util::format_number;

fn render_cell(value: &Value) -> String {
    match value {
        Value::Num(n) => format_number(*n, 2),
        other => other.to_string(),
    }
}

/// Export a dataset as CSV, canonical field names as the header row.
pub fn write_dataset_csv(path: &str, dataset: &Dataset) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(dataset.schema.fields().iter().map(|f| f.name.as_str()))?;
    for record in &dataset.records {
        wtr.write_record(record.values().iter().map(render_cell))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Print the first `max_rows` records as a Markdown table.
pub fn preview_dataset(dataset: &Dataset, max_rows: usize) {
    if dataset.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(dataset.schema.fields().iter().map(|f| f.name.as_str()));
    for record in dataset.records.iter().take(max_rows) {
        builder.push_record(record.values().iter().map(render_cell));
    }
    let table = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table);
}

/// Print rows of (category, per-series values) as a Markdown table.
pub fn preview_rows(headers: &[String], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(String::as_str));
    for row in rows {
        builder.push_record(row.iter().map(String::as_str));
    }
    let table = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table);
}
