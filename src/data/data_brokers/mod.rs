pub mod morningstar;
pub mod util;

use chrono::NaiveDate;
use tracing::info;

use super::{Metric, Series};
use crate::config::Settings;
use crate::error::{FrontierError, Result};

/// Fetches every configured fund, one request at a time, in configuration order.
pub async fn fetch_series(settings: &Settings, metric: Metric, start_date: NaiveDate) -> Result<Vec<Series>> {
    match settings.data_api.source.to_lowercase().as_str() {
        "morningstar" => {
            info!(funds = ?settings.fund_names(), %metric, %start_date, "Fetching Morningstar series");
            let client = morningstar::MorningstarClient::from_settings(settings);
            let mut series = Vec::with_capacity(settings.funds.len());
            for fund in &settings.funds {
                series.push(client.fetch_series(fund, metric, start_date).await?);
            }
            Ok(series)
        }
        other => Err(FrontierError::InvalidConfig(format!(
            "unsupported data broker '{other}'"
        ))),
    }
}
