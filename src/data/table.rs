use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use ndarray::Array2;
use tracing::{debug, warn};

/// One fund's daily observations keyed by calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: BTreeMap<NaiveDate, f64>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: BTreeMap::new(),
        }
    }

    pub fn from_points(name: impl Into<String>, points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        Self {
            name: name.into(),
            points: points.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Funds aligned on common dates.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Ascending.
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    /// shape: (n_assets, n_dates)
    pub values: Array2<f64>,
}

impl Table {
    pub fn n_assets(&self) -> usize {
        self.columns.len()
    }

    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.values.row(idx).to_vec())
    }
}

/// Keeps only the dates every series has. Columns follow input order.
///
/// Funds that started trading later (or report on different holidays) shorten
/// the whole table, so cumulative series may not start at zero.
pub fn inner_join(series: &[Series]) -> Table {
    let columns: Vec<String> = series.iter().map(|s| s.name.clone()).collect();

    let mut common: BTreeSet<NaiveDate> = match series.first() {
        Some(first) => first.points.keys().copied().collect(),
        None => BTreeSet::new(),
    };
    for s in series.iter().skip(1) {
        common.retain(|d| s.points.contains_key(d));
    }
    let dates: Vec<NaiveDate> = common.into_iter().collect();

    let mut values = Array2::<f64>::zeros((columns.len(), dates.len()));
    for (i, s) in series.iter().enumerate() {
        let dropped = s.len() - dates.len();
        if dropped > 0 {
            warn!(
                fund = %s.name,
                dropped,
                kept = dates.len(),
                "Rows dropped by inner join on date"
            );
        }
        for (j, date) in dates.iter().enumerate() {
            values[[i, j]] = s.points[date];
        }
    }
    debug!(assets = columns.len(), dates = dates.len(), "Joined series");

    Table {
        dates,
        columns,
        values,
    }
}
