use std::collections::HashSet;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::{FrontierError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data_api: DataAPI,
    pub funds: Vec<Fund>,
    #[serde(default)]
    pub portfolio_optimization: PortfolioOptimization,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    /// `api` or `csv`
    #[serde(default = "default_data_source")]
    pub data_source: String,
    #[serde(default)]
    pub data_file: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Render PNG charts; off for headless runs.
    #[serde(default = "default_true")]
    pub plot_charts: bool,
    #[serde(default = "default_true")]
    pub plot_cumulative_returns: bool,
    #[serde(default)]
    pub save_raw: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataAPI {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_token")]
    pub token: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_id_type")]
    pub id_type: String,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
    #[serde(default)]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// A fund name and its Morningstar identifier (the `...$$ALL` id found in
/// the source of Morningstar's interactive charts).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fund {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioOptimization {
    #[serde(default = "default_num_portfolios")]
    pub num_portfolios: usize,
    /// Same unit as annualised returns (Morningstar returns are percentages).
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default = "default_target_return")]
    pub target_return: f64,
    #[serde(default = "default_frontier_points")]
    pub frontier_points: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_data_source() -> String {
    "api".to_string()
}
fn default_output_dir() -> String {
    "output".to_string()
}
fn default_true() -> bool {
    true
}
fn default_source() -> String {
    "morningstar".to_string()
}
fn default_base_url() -> String {
    "https://tools.morningstar.co.uk/api/rest.svc".to_string()
}
fn default_token() -> String {
    "t92wz0sj7c".to_string()
}
fn default_currency() -> String {
    "EUR".to_string()
}
fn default_id_type() -> String {
    "Morningstar".to_string()
}
fn default_frequency() -> String {
    "daily".to_string()
}
fn default_decimal_places() -> u32 {
    8
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_num_portfolios() -> usize {
    25_000
}
// percent, same unit as the annualised returns
fn default_risk_free_rate() -> f64 {
    0.11
}
fn default_target_return() -> f64 {
    15.0
}
fn default_frontier_points() -> usize {
    100
}

impl Default for General {
    fn default() -> Self {
        Self {
            data_source: default_data_source(),
            data_file: String::new(),
            output_dir: default_output_dir(),
            plot_charts: true,
            plot_cumulative_returns: true,
            save_raw: false,
        }
    }
}

impl Default for DataAPI {
    fn default() -> Self {
        Self {
            source: default_source(),
            base_url: default_base_url(),
            token: default_token(),
            currency: default_currency(),
            id_type: default_id_type(),
            frequency: default_frequency(),
            decimal_places: default_decimal_places(),
            retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for PortfolioOptimization {
    fn default() -> Self {
        Self {
            num_portfolios: default_num_portfolios(),
            risk_free_rate: default_risk_free_rate(),
            target_return: default_target_return(),
            frontier_points: default_frontier_points(),
            seed: None,
        }
    }
}

impl Settings {
    /// Loads `config.toml` from the working directory (or `path` when given),
    /// then applies `APP__SECTION__KEY` overrides from the environment.
    pub fn new(path: Option<&str>) -> Result<Self> {
        dotenv::dotenv().ok();
        let file = match path {
            Some(p) => File::with_name(p),
            None => File::with_name("config"),
        };
        let s = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;
        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let s = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;
        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn fund_names(&self) -> Vec<String> {
        self.funds.iter().map(|f| f.name.clone()).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.funds.is_empty() {
            return Err(FrontierError::InvalidConfig(
                "at least one fund must be configured".into(),
            ));
        }
        let mut seen = HashSet::new();
        for fund in &self.funds {
            if fund.name.trim().is_empty() {
                return Err(FrontierError::InvalidConfig(format!(
                    "fund with id '{}' has an empty name",
                    fund.id
                )));
            }
            if !seen.insert(fund.name.as_str()) {
                return Err(FrontierError::InvalidConfig(format!(
                    "duplicate fund name '{}'",
                    fund.name
                )));
            }
        }
        if self.portfolio_optimization.frontier_points < 2 {
            return Err(FrontierError::InvalidConfig(
                "frontier_points must be at least 2".into(),
            ));
        }
        Ok(())
    }
}
