use std::error::Error;
use std::ops::Range;
use std::path::Path;

use chrono::NaiveDate;
use plotters::prelude::*;
use tracing::info;

use crate::data::Table;
use crate::optimization::FrontierAnalysis;

// Yellow-green-blue ramp for the Sharpe colouring
const SHARPE_LOW: RGBColor = RGBColor(255, 255, 204);
const SHARPE_MID: RGBColor = RGBColor(65, 182, 196);
const SHARPE_HIGH: RGBColor = RGBColor(37, 52, 148);

/// Line chart with one series per fund over the table's dates.
pub fn plot_series(table: &Table, title: &str, y_desc: &str, output_path: &Path) -> Result<(), Box<dyn Error>> {
    let (Some(&first), Some(&last)) = (table.dates.first(), table.dates.last()) else {
        return Err(format!("nothing to plot for '{title}': table has no dates").into());
    };
    if first == last {
        return Err(format!("nothing to plot for '{title}': a single date").into());
    }
    let y_range = padded_range(table.values.iter().copied());

    let root = BitMapBackend::new(output_path, (1000, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(first..last, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc(y_desc)
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
        .draw()?;

    for (i, name) in table.columns.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let row = table.values.row(i);
        chart
            .draw_series(LineSeries::new(
                table.dates.iter().copied().zip(row.iter().copied()),
                color.stroke_width(2),
            ))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "Saved chart");
    Ok(())
}

/// Random portfolios coloured by Sharpe ratio, single funds, the optimised
/// portfolios and the efficient frontier, on annualised volatility/return axes.
pub fn plot_efficient_frontier(analysis: &FrontierAnalysis, output_path: &Path) -> Result<(), Box<dyn Error>> {
    let xs = analysis
        .random_portfolios
        .iter()
        .map(|p| p.volatility)
        .chain(analysis.asset_points.iter().map(|&(v, _)| v))
        .chain(analysis.frontier.iter().map(|p| p.volatility))
        .chain(std::iter::once(analysis.min_variance.portfolio.volatility));
    let ys = analysis
        .random_portfolios
        .iter()
        .map(|p| p.annual_return)
        .chain(analysis.asset_points.iter().map(|&(_, r)| r))
        .chain(analysis.frontier.iter().map(|p| p.target_return))
        .chain(std::iter::once(analysis.min_variance.portfolio.annual_return));
    let x_range = padded_range(xs);
    let y_range = padded_range(ys);

    let root = BitMapBackend::new(output_path, (1000, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Calculated Portfolio Optimization based on Efficient Frontier",
            ("sans-serif", 26),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("annualised volatility")
        .y_desc("annualised returns")
        .draw()?;

    let (min_sharpe, max_sharpe) = analysis
        .random_portfolios
        .iter()
        .map(|p| p.sharpe_ratio)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    chart.draw_series(analysis.random_portfolios.iter().map(|p| {
        let t = normalise(p.sharpe_ratio, min_sharpe, max_sharpe);
        Circle::new((p.volatility, p.annual_return), 2, sharpe_color(t).mix(0.5).filled())
    }))?;

    if !analysis.frontier.is_empty() {
        chart
            .draw_series(LineSeries::new(
                analysis.frontier.iter().map(|p| (p.volatility, p.target_return)),
                BLACK.stroke_width(2),
            ))?
            .label("efficient frontier")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(2)));
    }

    chart.draw_series(analysis.assets.iter().zip(analysis.asset_points.iter()).map(
        |(name, &(vol, ret))| {
            EmptyElement::at((vol, ret))
                + Circle::new((0, 0), 8, BLUE.filled())
                + Text::new(name.clone(), (10, -4), ("sans-serif", 15).into_font())
        },
    ))?;

    let min_var = &analysis.min_variance.portfolio;
    chart
        .draw_series(std::iter::once(TriangleMarker::new(
            (min_var.volatility, min_var.annual_return),
            12,
            GREEN.filled(),
        )))?
        .label("Minimum volatility")
        .legend(|(x, y)| TriangleMarker::new((x + 10, y), 6, GREEN.filled()));

    if let Some(target) = &analysis.target {
        let p = &target.portfolio;
        chart
            .draw_series(std::iter::once(TriangleMarker::new(
                (p.volatility, p.annual_return),
                12,
                RED.filled(),
            )))?
            .label("Desired return efficient portfolio")
            .legend(|(x, y)| TriangleMarker::new((x + 10, y), 6, RED.filled()));
    }

    if let Some(best) = &analysis.max_sharpe {
        chart
            .draw_series(std::iter::once(Cross::new(
                (best.volatility, best.annual_return),
                8,
                MAGENTA.stroke_width(3),
            )))?
            .label("Maximum Sharpe (sampled)")
            .legend(|(x, y)| Cross::new((x + 10, y), 5, MAGENTA.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "Saved chart");
    Ok(())
}

/// Value range with 10% padding. Degenerate or empty input still yields a
/// usable range.
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return 0.0..1.0;
    }
    let pad = if hi > lo { (hi - lo) * 0.1 } else { lo.abs().max(1.0) * 0.1 };
    (lo - pad)..(hi + pad)
}

fn normalise(value: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Maps `t` in [0, 1] onto the ramp, low Sharpe pale, high Sharpe dark.
pub fn sharpe_color(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        lerp(SHARPE_LOW, SHARPE_MID, t * 2.0)
    } else {
        lerp(SHARPE_MID, SHARPE_HIGH, (t - 0.5) * 2.0)
    }
}

fn lerp(a: RGBColor, b: RGBColor, t: f64) -> RGBColor {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}
