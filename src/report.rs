use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use ndarray::Array1;

use crate::data::Table as SeriesTable;
use crate::optimization::{FrontierAnalysis, OptimizationResult, Portfolio};

/// Rounds to two decimals, the precision of every printed figure.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn number_cell(value: f64) -> Cell {
    Cell::new(format!("{:.2}", round2(value))).set_alignment(CellAlignment::Right)
}

/// Allocation per fund in percent.
pub fn allocation_table(assets: &[String], weights: &Array1<f64>) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![header_cell("Fund"), header_cell("Allocation %")]);
    for (name, w) in assets.iter().zip(weights.iter()) {
        table.add_row(vec![Cell::new(name), number_cell(w * 100.0)]);
    }
    table
}

pub fn fund_table(analysis: &FrontierAnalysis) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Fund"),
        header_cell("Annualised return"),
        header_cell("Annualised volatility"),
    ]);
    for (name, &(vol, ret)) in analysis.assets.iter().zip(analysis.asset_points.iter()) {
        table.add_row(vec![Cell::new(name), number_cell(ret), number_cell(vol)]);
    }
    table
}

/// First and last observation of each fund over the table's span.
pub fn series_summary_table(data: &SeriesTable) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Fund"),
        header_cell("From"),
        header_cell("To"),
        header_cell("First"),
        header_cell("Last"),
    ]);
    let (Some(first), Some(last)) = (data.dates.first(), data.dates.last()) else {
        return table;
    };
    for name in &data.columns {
        let Some(values) = data.column(name) else {
            continue;
        };
        let (Some(&first_value), Some(&last_value)) = (values.first(), values.last()) else {
            continue;
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(first.format("%Y-%m-%d")),
            Cell::new(last.format("%Y-%m-%d")),
            number_cell(first_value),
            number_cell(last_value),
        ]);
    }
    table
}

fn print_separator() {
    println!("{}", "-".repeat(80));
}

fn print_portfolio(title: &str, assets: &[String], portfolio: &Portfolio) {
    println!("{}\n", style(title).bold().underlined());
    println!("Annualised Return: {:.2}", round2(portfolio.annual_return));
    println!("Annualised Volatility: {:.2}", round2(portfolio.volatility));
    println!("Sharpe Ratio: {:.2}", round2(portfolio.sharpe_ratio));
    println!("{}", allocation_table(assets, &portfolio.weights));
}

fn print_solved(title: &str, assets: &[String], result: &OptimizationResult) {
    print_portfolio(title, assets, &result.portfolio);
    if let Some(worst) = result.worst_day {
        println!("Worst Day: {:.2}", round2(worst));
    }
    if !result.converged {
        println!("{}", style("Solver stopped before converging").red());
    }
}

pub fn print_analysis(analysis: &FrontierAnalysis) {
    print_separator();
    match &analysis.target {
        Some(result) => print_solved("Desired return Portfolio Allocation", &analysis.assets, result),
        None => println!(
            "{}",
            style(format!(
                "Desired return {:.2} is out of reach for a long-only portfolio of these funds",
                analysis.target_return
            ))
            .red()
        ),
    }
    print_separator();
    print_solved(
        "Minimum Volatility Portfolio Allocation",
        &analysis.assets,
        &analysis.min_variance,
    );
    if let Some(best) = &analysis.max_sharpe {
        print_separator();
        print_portfolio(
            "Maximum Sharpe Ratio Portfolio Allocation (sampled)",
            &analysis.assets,
            best,
        );
    }
    print_separator();
    println!("{}\n", style("Individual Funds Returns and Volatility").bold().underlined());
    println!("{}", fund_table(analysis));
    print_separator();
}

pub fn print_series_summary(title: &str, data: &SeriesTable) {
    print_separator();
    println!("{}\n", style(title).bold().underlined());
    println!("{}", series_summary_table(data));
    print_separator();
}
