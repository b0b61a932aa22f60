use console::{style, Term};
use tracing::debug;

use crate::data::{Metric, TimeWindow};
use crate::error::{FrontierError, Result};

// Closed stdin keeps returning empty answers.
const MAX_ATTEMPTS: usize = 5;

fn metric_menu() -> String {
    let mut menu = String::from("Choose target metric:\n");
    for (i, metric) in Metric::ALL.iter().enumerate() {
        menu.push_str(&format!("\t{}. {}\n", i + 1, metric.label()));
    }
    menu
}

fn window_menu() -> String {
    let mut menu = String::from("Choose time window:\n");
    for (i, window) in TimeWindow::ALL.iter().enumerate() {
        menu.push_str(&format!("\t{}. {}\n", i + 1, window.label()));
    }
    menu
}

/// Shows `menu` until `parse` accepts the answer.
fn ask<T>(term: &Term, menu: &str, parse: impl Fn(&str) -> Result<T>) -> Result<T> {
    for _ in 0..MAX_ATTEMPTS {
        term.write_line(menu)?;
        term.write_str(" -->: ")?;
        let answer = term.read_line()?;
        match parse(&answer) {
            Ok(choice) => return Ok(choice),
            Err(e) => {
                debug!(answer = %answer, "Rejected menu answer");
                term.write_line(&style(e.to_string()).red().to_string())?;
            }
        }
    }
    Err(FrontierError::InvalidChoice(format!(
        "no valid answer after {MAX_ATTEMPTS} attempts"
    )))
}

pub fn ask_metric(term: &Term) -> Result<Metric> {
    ask(term, &metric_menu(), Metric::from_choice)
}

pub fn ask_window(term: &Term) -> Result<TimeWindow> {
    ask(term, &window_menu(), TimeWindow::from_choice)
}
