use std::path::Path;

use chrono::{NaiveDate, ParseError};
use csv::WriterBuilder;

use crate::data::Table;
use crate::error::Result;

/// Writes a joined table to CSV: `date` first, then one column per fund.
pub fn write_to_csv(table: &Table, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(output_path)?;

    let mut header = vec!["date".to_string()];
    header.extend(table.columns.iter().cloned());
    wtr.write_record(&header)?;

    for (j, date) in table.dates.iter().enumerate() {
        let mut row = vec![date.format("%Y-%m-%d").to_string()];
        row.extend(table.values.column(j).iter().map(|v| v.to_string()));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn parse_date(date_str: &str) -> std::result::Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
