pub mod data_brokers;
pub mod table;

use std::fmt;

use chrono::{Duration, Months, NaiveDate};
use tracing::info;

use crate::config::Settings;
use crate::error::{FrontierError, Result};
use crate::utils::parse_date;
pub use table::{inner_join, Series, Table};

/// Which Morningstar time series to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Net asset value.
    Price,
    /// Daily returns, in percent.
    Return,
    CumulativeReturn,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Price, Metric::Return, Metric::CumulativeReturn];

    /// Path segment of the `timeseries_{metric}` endpoint.
    pub fn api_name(&self) -> &'static str {
        match self {
            Metric::Price => "price",
            Metric::Return => "return",
            Metric::CumulativeReturn => "cumulativereturn",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Price => "Price (NAV)",
            Metric::Return => "Daily returns",
            Metric::CumulativeReturn => "Cumulative returns",
        }
    }

    /// Menu choice: "1" price, "2" daily returns, "3" cumulative returns.
    pub fn from_choice(choice: &str) -> Result<Self> {
        match choice.trim() {
            "1" => Ok(Metric::Price),
            "2" => Ok(Metric::Return),
            "3" => Ok(Metric::CumulativeReturn),
            other => Err(FrontierError::InvalidChoice(format!(
                "'{other}' is not a metric, pick 1-3"
            ))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    ThreeMonths,
    SixMonths,
    OneYear,
    ThreeYears,
    FiveYears,
    TenYears,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 6] = [
        TimeWindow::ThreeMonths,
        TimeWindow::SixMonths,
        TimeWindow::OneYear,
        TimeWindow::ThreeYears,
        TimeWindow::FiveYears,
        TimeWindow::TenYears,
    ];

    pub fn months(&self) -> u32 {
        match self {
            TimeWindow::ThreeMonths => 3,
            TimeWindow::SixMonths => 6,
            TimeWindow::OneYear => 12,
            TimeWindow::ThreeYears => 36,
            TimeWindow::FiveYears => 60,
            TimeWindow::TenYears => 120,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::ThreeMonths => "3 Month",
            TimeWindow::SixMonths => "6 Month",
            TimeWindow::OneYear => "1 Year",
            TimeWindow::ThreeYears => "3 Year",
            TimeWindow::FiveYears => "5 Year",
            TimeWindow::TenYears => "10 Year",
        }
    }

    pub fn from_choice(choice: &str) -> Result<Self> {
        let idx: usize = choice
            .trim()
            .parse()
            .map_err(|_| FrontierError::InvalidChoice(format!("'{}' is not a time window, pick 1-6", choice.trim())))?;
        idx.checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| FrontierError::InvalidChoice(format!("'{idx}' is not a time window, pick 1-6")))
    }

    /// First day requested: yesterday minus the window. Month arithmetic
    /// clamps to the last day of shorter months.
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        let yesterday = today - Duration::days(1);
        yesterday
            .checked_sub_months(Months::new(self.months()))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Reads a table written by [`crate::utils::write_to_csv`]: a `date` column
/// followed by one column per fund. Rows with a blank cell are dropped, which
/// keeps the inner-join semantics of fetched data.
pub fn read_csv(path: &str) -> Result<Table> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let mut series: Vec<Series> = headers.iter().skip(1).map(Series::new).collect();
    if series.is_empty() {
        return Err(FrontierError::InvalidData(format!(
            "{path} has no fund columns"
        )));
    }

    for result in rdr.records() {
        let record = result?;
        let date_str = record
            .get(0)
            .ok_or_else(|| FrontierError::InvalidData(format!("{path}: row without date")))?;
        let date = parse_date(date_str)?;
        for (i, s) in series.iter_mut().enumerate() {
            let cell = record.get(i + 1).unwrap_or("").trim();
            if cell.is_empty() {
                continue;
            }
            let value = cell.parse::<f64>().map_err(|e| {
                FrontierError::InvalidData(format!("{path}: bad value '{cell}' for {}: {e}", s.name))
            })?;
            s.points.insert(date, value);
        }
    }
    Ok(inner_join(&series))
}

/// Loads the joined table for `metric` from the configured source.
pub async fn fetch_table(settings: &Settings, metric: Metric, start_date: NaiveDate) -> Result<Table> {
    match settings.general.data_source.as_str() {
        "csv" => {
            info!(file = %settings.general.data_file, "Reading series from CSV");
            read_csv(&settings.general.data_file)
        }
        "api" => {
            let series = data_brokers::fetch_series(settings, metric, start_date).await?;
            Ok(inner_join(&series))
        }
        other => Err(FrontierError::InvalidConfig(format!(
            "unknown data source '{other}', expected 'api' or 'csv'"
        ))),
    }
}
