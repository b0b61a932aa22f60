use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use reqwest::Client;
use tracing::{debug, error, info};

use super::util::with_retry;
use crate::config::{Fund, Settings};
use crate::data::{Metric, Series};
use crate::error::{FrontierError, Result};

/// Client for the Morningstar `timeseries_*` REST endpoints.
pub struct MorningstarClient {
    client: Client,
    base_url: String,
    token: String,
    currency: String,
    id_type: String,
    frequency: String,
    decimal_places: u32,
    retries: usize,
    retry_delay_ms: u64,
    raw_dir: Option<PathBuf>,
}

impl MorningstarClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            currency: "EUR".to_string(),
            id_type: "Morningstar".to_string(),
            frequency: "daily".to_string(),
            decimal_places: 8,
            retries: 0,
            retry_delay_ms: 500,
            raw_dir: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let api = &settings.data_api;
        let mut client = Self::new(&api.base_url, &api.token).with_retries(api.retries, api.retry_delay_ms);
        client.currency = api.currency.clone();
        client.id_type = api.id_type.clone();
        client.frequency = api.frequency.clone();
        client.decimal_places = api.decimal_places;
        if settings.general.save_raw {
            client = client.with_raw_dir(Path::new(&settings.general.output_dir).join("raw"));
        }
        client
    }

    pub fn with_retries(mut self, retries: usize, delay_ms: u64) -> Self {
        self.retries = retries;
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_raw_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw_dir = Some(dir.into());
        self
    }

    fn url(&self, metric: Metric) -> String {
        format!("{}/timeseries_{}/{}", self.base_url, metric.api_name(), self.token)
    }

    fn query(&self, fund: &Fund, start_date: NaiveDate) -> Vec<(&'static str, String)> {
        vec![
            ("currencyID", self.currency.clone()),
            ("idtype", self.id_type.clone()),
            ("frequency", self.frequency.clone()),
            ("startDate", start_date.format("%Y-%m-%d").to_string()),
            ("performanceType", String::new()),
            ("outputType", "COMPACTJSON".to_string()),
            ("id", fund.id.clone()),
            ("decPlaces", self.decimal_places.to_string()),
            ("applyTrackRecordExtension", "false".to_string()),
        ]
    }

    pub async fn fetch_series(&self, fund: &Fund, metric: Metric, start_date: NaiveDate) -> Result<Series> {
        let url = self.url(metric);
        let params = self.query(fund, start_date);
        info!(fund = %fund.name, %metric, %start_date, "Fetching series");

        let response = with_retry(
            || async {
                self.client
                    .get(&url)
                    .query(&params)
                    .send()
                    .await?
                    .error_for_status()
            },
            self.retries,
            self.retry_delay_ms,
        )
        .await?;
        let body = response.text().await?;

        if let Some(dir) = &self.raw_dir {
            save_api_result(dir, &body, &fund.name, metric)?;
        }

        let series = parse_compact_json(&fund.name, &body)?;
        debug!(fund = %fund.name, points = series.len(), "Parsed series");
        Ok(series)
    }
}

/// Parses a COMPACTJSON body: `[[timestamp_ms, value], ...]`.
///
/// Timestamps map to UTC calendar dates. `null` values are skipped and a
/// repeated date keeps its last value.
pub fn parse_compact_json(fund: &str, body: &str) -> Result<Series> {
    let rows: Vec<(f64, Option<f64>)> = serde_json::from_str(body).map_err(|e| {
        let snippet: String = body.chars().take(200).collect();
        error!(fund, error = ?e, response = %snippet, "Failed to parse series response");
        FrontierError::InvalidData(format!("unparseable response for {fund}: {e}"))
    })?;

    let mut series = Series::new(fund);
    for (ts, value) in rows {
        let Some(value) = value else {
            continue;
        };
        let date = DateTime::from_timestamp_millis(ts as i64)
            .ok_or_else(|| FrontierError::InvalidData(format!("timestamp {ts} out of range for {fund}")))?
            .date_naive();
        series.points.insert(date, value);
    }

    if series.is_empty() {
        return Err(FrontierError::InvalidData(format!(
            "no observations returned for {fund}"
        )));
    }
    Ok(series)
}

/// Saves the raw body in {dir}/{fund}/{metric}/{today}.json
fn save_api_result(dir: &Path, body: &str, fund: &str, metric: Metric) -> Result<()> {
    let today = Local::now().format("%Y-%m-%d").to_string();
    let dir_path = dir.join(fund).join(metric.api_name());
    fs::create_dir_all(&dir_path)?;
    fs::write(dir_path.join(format!("{today}.json")), body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // 2024-01-02, 2024-01-03, 2024-01-04 at 00:00 UTC
    const MOCK_JSON: &str = "[[1704153600000,0.12],[1704240000000,-0.3],[1704326400000,null]]";

    fn fund() -> Fund {
        Fund {
            name: "JPM_USTech".to_string(),
            id: "F000005MPD]2]0]FOITA$$ALL".to_string(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn create_mock_server(metric: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/timeseries_{metric}/t92wz0sj7c")))
            .and(query_param("id", "F000005MPD]2]0]FOITA$$ALL"))
            .and(query_param("currencyID", "EUR"))
            .and(query_param("outputType", "COMPACTJSON"))
            .and(query_param("startDate", "2024-01-01"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_fetch_series() {
        let server = create_mock_server("return", 200, MOCK_JSON).await;
        let client = MorningstarClient::new(&server.uri(), "t92wz0sj7c");

        let series = client
            .fetch_series(&fund(), Metric::Return, ymd(2024, 1, 1))
            .await
            .unwrap();

        assert_eq!(series.name, "JPM_USTech");
        assert_eq!(series.len(), 2);
        assert_eq!(series.points[&ymd(2024, 1, 2)], 0.12);
        assert_eq!(series.points[&ymd(2024, 1, 3)], -0.3);
    }

    #[tokio::test]
    async fn test_fetch_series_uses_metric_path() {
        let server = create_mock_server("cumulativereturn", 200, MOCK_JSON).await;
        let client = MorningstarClient::new(&format!("{}/", server.uri()), "t92wz0sj7c");

        let series = client
            .fetch_series(&fund(), Metric::CumulativeReturn, ymd(2024, 1, 1))
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_series_http_error() {
        let server = create_mock_server("price", 500, "oops").await;
        let client = MorningstarClient::new(&server.uri(), "t92wz0sj7c").with_retries(1, 1);

        let err = client
            .fetch_series(&fund(), Metric::Price, ymd(2024, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, FrontierError::Http(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_series_saves_raw_body() {
        let server = create_mock_server("price", 200, MOCK_JSON).await;
        let dir = tempfile::tempdir().unwrap();
        let client = MorningstarClient::new(&server.uri(), "t92wz0sj7c").with_raw_dir(dir.path());

        client
            .fetch_series(&fund(), Metric::Price, ymd(2024, 1, 1))
            .await
            .unwrap();

        let saved = dir.path().join("JPM_USTech").join("price");
        let entries: Vec<_> = fs::read_dir(saved).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_save_raw_setting_writes_under_output_dir() {
        let server = create_mock_server("return", 200, MOCK_JSON).await;
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
            [general]
            output_dir = "{}"
            save_raw = true

            [data_api]
            base_url = "{}"
            token = "t92wz0sj7c"

            [[funds]]
            name = "JPM_USTech"
            id = "F000005MPD]2]0]FOITA$$ALL"
            "#,
            dir.path().display(),
            server.uri()
        );
        let settings = Settings::from_toml_str(&toml).unwrap();
        let client = MorningstarClient::from_settings(&settings);

        client
            .fetch_series(&settings.funds[0], Metric::Return, ymd(2024, 1, 1))
            .await
            .unwrap();

        let saved = dir.path().join("raw").join("JPM_USTech").join("return");
        assert_eq!(fs::read_dir(saved).unwrap().count(), 1);
    }

    #[test]
    fn test_parse_duplicate_dates_keep_last() {
        // two timestamps on the same UTC day
        let body = "[[1704153600000,1.0],[1704196800000,2.0]]";
        let series = parse_compact_json("A", body).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.points[&ymd(2024, 1, 2)], 2.0);
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(matches!(
            parse_compact_json("A", "[]"),
            Err(FrontierError::InvalidData(_))
        ));
        assert!(matches!(
            parse_compact_json("A", "<html>error</html>"),
            Err(FrontierError::InvalidData(_))
        ));
        assert!(parse_compact_json("A", "[[1704153600000,null]]").is_err());
    }
}
