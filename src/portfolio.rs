use ndarray::{Array1, Array2, Axis};

use crate::data::Table;
use crate::error::{FrontierError, Result};

pub const TRADING_DAYS: f64 = 252.0;

pub struct PortfolioStats {
    pub assets: Vec<String>,
    /// Mean daily return per asset.
    pub mean_returns: Array1<f64>,
    /// Sample covariance of daily returns.
    pub covariance: Array2<f64>,
    pub returns_matrix: Array2<f64>, // shape: (n_assets, n_samples)
}

impl PortfolioStats {
    /// Builds statistics from a table of daily returns.
    pub fn from_table(table: &Table) -> Result<Self> {
        Self::new(table.columns.clone(), table.values.clone())
    }

    pub fn new(assets: Vec<String>, returns_matrix: Array2<f64>) -> Result<Self> {
        let (n_assets, n_obs) = returns_matrix.dim();
        if n_assets == 0 || assets.len() != n_assets {
            return Err(FrontierError::InvalidData(format!(
                "expected one returns row per asset, got {} names for {} rows",
                assets.len(),
                n_assets
            )));
        }
        if n_obs < 2 {
            return Err(FrontierError::InvalidData(format!(
                "not enough common observations ({n_obs}) to compute covariance"
            )));
        }

        let mean_returns = returns_matrix
            .mean_axis(Axis(1))
            .ok_or_else(|| FrontierError::InvalidData("failed to compute mean returns".into()))?;
        let covariance = compute_sample_covariance(&returns_matrix, &mean_returns);

        Ok(Self {
            assets,
            mean_returns,
            covariance,
            returns_matrix,
        })
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    /// Annualised (volatility, return) of a weight vector.
    pub fn annualised_performance(&self, weights: &Array1<f64>) -> (f64, f64) {
        let returns = self.mean_returns.dot(weights) * TRADING_DAYS;
        let std = self.variance(weights).sqrt() * TRADING_DAYS.sqrt();
        (std, returns)
    }

    /// Daily portfolio variance, clamped at zero against rounding.
    pub fn variance(&self, weights: &Array1<f64>) -> f64 {
        weights.dot(&self.covariance.dot(weights)).max(0.0)
    }

    /// Annualised return of each single asset.
    pub fn asset_returns(&self) -> Array1<f64> {
        &self.mean_returns * TRADING_DAYS
    }

    /// Annualised volatility of each single asset.
    pub fn asset_volatilities(&self) -> Array1<f64> {
        self.covariance
            .diag()
            .mapv(|v| v.max(0.0).sqrt() * TRADING_DAYS.sqrt())
    }

    /// Daily returns of the weighted portfolio.
    pub fn portfolio_returns(&self, weights: &Array1<f64>) -> Array1<f64> {
        self.returns_matrix.t().dot(weights)
    }
}

/// Excess return per unit of volatility. A riskless portfolio scores zero.
pub fn sharpe_ratio(annual_return: f64, volatility: f64, risk_free_rate: f64) -> f64 {
    if volatility > 0.0 {
        (annual_return - risk_free_rate) / volatility
    } else {
        0.0
    }
}

/// Cov = 1/(T-1) * (R_centered * R_centered^T)
fn compute_sample_covariance(returns: &Array2<f64>, means: &Array1<f64>) -> Array2<f64> {
    let n_obs = returns.ncols();
    let centered = returns - &means.view().insert_axis(Axis(1));
    let factor = 1.0 / (n_obs as f64 - 1.0);
    centered.dot(&centered.t()) * factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn stats() -> PortfolioStats {
        PortfolioStats::new(
            vec!["A".to_string(), "B".to_string()],
            array![[1.0, 2.0, 3.0, 4.0], [2.0, 1.0, 4.0, 3.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_mean_and_sample_covariance() {
        let s = stats();
        assert!(close(s.mean_returns[0], 2.5));
        assert!(close(s.mean_returns[1], 2.5));
        // var = 5/3, cov = 3/3
        assert!(close(s.covariance[[0, 0]], 5.0 / 3.0));
        assert!(close(s.covariance[[1, 1]], 5.0 / 3.0));
        assert!(close(s.covariance[[0, 1]], 1.0));
        assert!(close(s.covariance[[1, 0]], 1.0));
    }

    #[test]
    fn test_annualised_performance() {
        let s = stats();
        let w = array![0.5, 0.5];
        let (std, ret) = s.annualised_performance(&w);
        assert!(close(ret, 2.5 * 252.0));
        // w'Σw = 0.25 * (5/3 + 5/3 + 2)
        let var: f64 = 0.25 * (10.0 / 3.0 + 2.0);
        assert!(close(std, var.sqrt() * 252f64.sqrt()));
    }

    #[test]
    fn test_asset_figures_match_unit_weights() {
        let s = stats();
        let vols = s.asset_volatilities();
        let rets = s.asset_returns();
        let (std, ret) = s.annualised_performance(&array![1.0, 0.0]);
        assert!(close(vols[0], std));
        assert!(close(rets[0], ret));
    }

    #[test]
    fn test_portfolio_returns() {
        let s = stats();
        let daily = s.portfolio_returns(&array![0.5, 0.5]);
        assert_eq!(daily.to_vec(), vec![1.5, 1.5, 3.5, 3.5]);
    }

    #[test]
    fn test_sharpe_ratio() {
        assert!(close(sharpe_ratio(12.0, 4.0, 2.0), 2.5));
        assert_eq!(sharpe_ratio(12.0, 0.0, 2.0), 0.0);
    }

    #[test]
    fn test_rejects_short_or_empty_input() {
        assert!(PortfolioStats::new(vec!["A".into()], array![[1.0]]).is_err());
        assert!(PortfolioStats::new(vec![], Array2::zeros((0, 5))).is_err());
        assert!(PortfolioStats::new(vec!["A".into()], Array2::zeros((2, 5))).is_err());
    }
}
