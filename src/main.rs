use std::error::Error;

use chrono::Local;
use clap::{Parser, ValueEnum};
use console::Term;
use fundfrontier::config::Settings;
use fundfrontier::data::{Metric, TimeWindow};
use fundfrontier::log::init_logging;
use fundfrontier::prompt;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the configuration file (defaults to ./config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Series to download; asked interactively when omitted
    #[arg(short, long, value_enum)]
    metric: Option<MetricArg>,

    /// History to download; asked interactively when omitted
    #[arg(short, long, value_enum)]
    window: Option<WindowArg>,

    /// Skip the separate cumulative return chart
    #[arg(long)]
    no_cumulative_plot: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Price,
    Return,
    CumulativeReturn,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Metric {
        match arg {
            MetricArg::Price => Metric::Price,
            MetricArg::Return => Metric::Return,
            MetricArg::CumulativeReturn => Metric::CumulativeReturn,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum WindowArg {
    #[value(name = "3m")]
    ThreeMonths,
    #[value(name = "6m")]
    SixMonths,
    #[value(name = "1y")]
    OneYear,
    #[value(name = "3y")]
    ThreeYears,
    #[value(name = "5y")]
    FiveYears,
    #[value(name = "10y")]
    TenYears,
}

impl From<WindowArg> for TimeWindow {
    fn from(arg: WindowArg) -> TimeWindow {
        match arg {
            WindowArg::ThreeMonths => TimeWindow::ThreeMonths,
            WindowArg::SixMonths => TimeWindow::SixMonths,
            WindowArg::OneYear => TimeWindow::OneYear,
            WindowArg::ThreeYears => TimeWindow::ThreeYears,
            WindowArg::FiveYears => TimeWindow::FiveYears,
            WindowArg::TenYears => TimeWindow::TenYears,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut settings = Settings::new(cli.config.as_deref())?;
    if cli.no_cumulative_plot {
        settings.general.plot_cumulative_returns = false;
    }

    let term = Term::stdout();
    let metric = match cli.metric {
        Some(arg) => arg.into(),
        None => {
            term.write_line(
                "When choosing target metric, pick Daily returns to perform portfolio optimization, \
                 Price and Cumulative returns are mainly for reporting purposes",
            )?;
            prompt::ask_metric(&term)?
        }
    };
    let window = match cli.window {
        Some(arg) => arg.into(),
        None => prompt::ask_window(&term)?,
    };

    fundfrontier::run(&settings, metric, window, Local::now().date_naive()).await?;
    Ok(())
}
