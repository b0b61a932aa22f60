pub mod config;
pub mod data;
pub mod error;
pub mod log;
pub mod optimization;
pub mod portfolio;
pub mod prompt;
pub mod report;
pub mod utils;
pub mod visualization;

use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::data::{Metric, Table, TimeWindow};
use crate::optimization::FrontierAnalysis;
use crate::portfolio::PortfolioStats;

/// Files written by a run, plus the analysis when returns were optimised.
#[derive(Debug)]
pub struct RunOutput {
    pub data_file: PathBuf,
    pub charts: Vec<PathBuf>,
    pub analysis: Option<FrontierAnalysis>,
}

/// fetch → join → optimise → plot → print, for one metric and window.
pub async fn run(
    settings: &Settings,
    metric: Metric,
    window: TimeWindow,
    today: NaiveDate,
) -> Result<RunOutput, Box<dyn Error>> {
    info!(%metric, window = window.label(), "Fund frontier starting...");
    let output_dir = Path::new(&settings.general.output_dir);
    std::fs::create_dir_all(output_dir)?;
    let start_date = window.start_date(today);
    let plot = settings.general.plot_charts;
    let mut charts = Vec::new();

    // The cumulative series is fetched separately, so its first point is the
    // fund's own start rather than the first common date.
    if plot
        && settings.general.plot_cumulative_returns
        && settings.general.data_source == "api"
        && metric != Metric::CumulativeReturn
    {
        let cumulative = data::fetch_table(settings, Metric::CumulativeReturn, start_date).await?;
        let path = output_dir.join("cumulative_return.png");
        if plot_line_chart(&cumulative, "Cumulative return", "cumulative return %", &path)? {
            charts.push(path);
        }
    }

    let table = data::fetch_table(settings, metric, start_date).await?;
    if table.is_empty() {
        return Err(format!("the configured funds share no {metric} observations since {start_date}").into());
    }
    debug!(rows = table.n_dates(), funds = table.n_assets(), "Joined table ready");

    let data_file = output_dir.join(format!("{}_{}.csv", metric.api_name(), today.format("%Y-%m-%d")));
    utils::write_to_csv(&table, &data_file)?;
    info!(path = %data_file.display(), "Saved joined series");

    if metric != Metric::Return {
        if plot {
            let path = output_dir.join(format!("{}.png", metric.api_name()));
            if plot_line_chart(&table, metric.label(), metric.label(), &path)? {
                charts.push(path);
            }
        }
        report::print_series_summary(metric.label(), &table);
        return Ok(RunOutput {
            data_file,
            charts,
            analysis: None,
        });
    }

    let stats = PortfolioStats::from_table(&table)?;
    let analysis = optimization::analyse(&stats, &settings.portfolio_optimization)?;
    if plot {
        let path = output_dir.join("efficient_frontier.png");
        visualization::plot_efficient_frontier(&analysis, &path)?;
        charts.push(path);
    }
    report::print_analysis(&analysis);

    Ok(RunOutput {
        data_file,
        charts,
        analysis: Some(analysis),
    })
}

/// Draws a dated line chart, or skips it when there is no line to draw.
fn plot_line_chart(table: &Table, title: &str, y_desc: &str, path: &Path) -> Result<bool, Box<dyn Error>> {
    if table.n_dates() < 2 {
        warn!(
            chart = %path.display(),
            dates = table.n_dates(),
            "Not enough common dates for a line chart, skipping"
        );
        return Ok(false);
    }
    visualization::plot_series(table, title, y_desc, path)?;
    Ok(true)
}
