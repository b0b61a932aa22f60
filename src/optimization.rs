use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::PortfolioOptimization;
use crate::error::{FrontierError, Result};
use crate::portfolio::{sharpe_ratio, PortfolioStats};
use crate::utils::linspace;

const MAX_ITERATIONS: u32 = 200;

/// A long-only, fully invested allocation and its annualised figures.
#[derive(Clone, Debug)]
pub struct Portfolio {
    pub weights: Array1<f64>,
    pub volatility: f64,
    pub annual_return: f64,
    pub sharpe_ratio: f64,
}

impl Portfolio {
    pub fn evaluate(stats: &PortfolioStats, weights: Array1<f64>, risk_free_rate: f64) -> Self {
        let (volatility, annual_return) = stats.annualised_performance(&weights);
        Self {
            weights,
            volatility,
            annual_return,
            sharpe_ratio: sharpe_ratio(annual_return, volatility, risk_free_rate),
        }
    }
}

/// Outcome of a constrained solve. `converged` is false when the solver
/// stopped short of an optimal status; the weights are still on the simplex.
#[derive(Clone, Debug)]
pub struct OptimizationResult {
    pub portfolio: Portfolio,
    /// Lowest daily return the weights would have realised over the sample.
    pub worst_day: Option<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl OptimizationResult {
    fn new(stats: &PortfolioStats, weights: Array1<f64>, risk_free_rate: f64, iterations: usize, converged: bool) -> Self {
        let worst_day = stats.portfolio_returns(&weights).iter().copied().reduce(f64::min);
        Self {
            portfolio: Portfolio::evaluate(stats, weights, risk_free_rate),
            worst_day,
            iterations,
            converged,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FrontierPoint {
    pub target_return: f64,
    pub volatility: f64,
    pub weights: Array1<f64>,
}

#[derive(Debug)]
pub struct FrontierAnalysis {
    pub assets: Vec<String>,
    /// Annualised (volatility, return) of each fund held alone.
    pub asset_points: Vec<(f64, f64)>,
    pub random_portfolios: Vec<Portfolio>,
    /// Best Sharpe ratio among the random portfolios.
    pub max_sharpe: Option<Portfolio>,
    pub min_variance: OptimizationResult,
    pub target_return: f64,
    /// `None` when the target is outside the attainable range.
    pub target: Option<OptimizationResult>,
    pub frontier: Vec<FrontierPoint>,
    pub risk_free_rate: f64,
}

/// Runs the full mean-variance study on daily return statistics.
pub fn analyse(stats: &PortfolioStats, po: &PortfolioOptimization) -> Result<FrontierAnalysis> {
    let mut rng = match po.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let rf = po.risk_free_rate;

    let random = random_portfolios(stats, po.num_portfolios, rf, &mut rng);
    let max_sharpe = random
        .iter()
        .max_by(|a, b| a.sharpe_ratio.total_cmp(&b.sharpe_ratio))
        .cloned();

    let min_variance = min_variance_portfolio(stats, rf)?;
    if !min_variance.converged {
        warn!(iterations = min_variance.iterations, "Minimum variance solve did not converge");
    }
    info!(
        volatility = min_variance.portfolio.volatility,
        annual_return = min_variance.portfolio.annual_return,
        "Minimum variance portfolio"
    );

    let target = match target_return_portfolio(stats, po.target_return, rf) {
        Ok(result) => {
            if !result.converged {
                warn!(target = po.target_return, "Target return solve did not converge");
            }
            Some(result)
        }
        Err(e @ FrontierError::Infeasible { .. }) => {
            warn!(error = %e, "Skipping target return portfolio");
            None
        }
        Err(e) => return Err(e),
    };

    let max_asset_return = stats
        .asset_returns()
        .fold(f64::NEG_INFINITY, |m, &r| m.max(r));
    let targets = linspace(
        min_variance.portfolio.annual_return.min(max_asset_return),
        max_asset_return,
        po.frontier_points,
    );
    let frontier = efficient_frontier(stats, &targets);

    let asset_points = stats
        .asset_volatilities()
        .iter()
        .zip(stats.asset_returns().iter())
        .map(|(&v, &r)| (v, r))
        .collect();

    Ok(FrontierAnalysis {
        assets: stats.assets.clone(),
        asset_points,
        random_portfolios: random,
        max_sharpe,
        min_variance,
        target_return: po.target_return,
        target,
        frontier,
        risk_free_rate: rf,
    })
}

/// Monte Carlo sample: uniform draws per asset, normalised to sum to one.
pub fn random_portfolios<R: Rng>(
    stats: &PortfolioStats,
    num_portfolios: usize,
    risk_free_rate: f64,
    rng: &mut R,
) -> Vec<Portfolio> {
    let n = stats.n_assets();
    (0..num_portfolios)
        .map(|_| {
            let raw = Array1::from_shape_fn(n, |_| rng.gen::<f64>());
            let total = raw.sum();
            let weights = if total > 0.0 {
                raw / total
            } else {
                equal_weights(n)
            };
            Portfolio::evaluate(stats, weights, risk_free_rate)
        })
        .collect()
}

/// Minimises portfolio variance over weights in [0, 1] summing to one.
pub fn min_variance_portfolio(stats: &PortfolioStats, risk_free_rate: f64) -> Result<OptimizationResult> {
    let (weights, iterations, converged) = solve_qp(&stats.covariance, &[])?;
    debug!(iterations, converged, "Solved minimum variance");
    Ok(OptimizationResult::new(stats, weights, risk_free_rate, iterations, converged))
}

/// Minimises variance subject to an annualised return equal to `target`.
pub fn target_return_portfolio(
    stats: &PortfolioStats,
    target: f64,
    risk_free_rate: f64,
) -> Result<OptimizationResult> {
    let asset_returns = stats.asset_returns();
    let lo = asset_returns.fold(f64::INFINITY, |m, &r| m.min(r));
    let hi = asset_returns.fold(f64::NEG_INFINITY, |m, &r| m.max(r));
    let tol = 1e-9 * lo.abs().max(hi.abs()).max(1.0);

    if !target.is_finite() || target < lo - tol || target > hi + tol {
        return Err(FrontierError::Infeasible {
            target,
            min: lo,
            max: hi,
        });
    }

    let (weights, iterations, converged) = if hi - lo <= tol {
        // every portfolio earns the target
        solve_qp(&stats.covariance, &[])?
    } else if target >= hi - tol || target <= lo + tol {
        // only the extreme assets reach a boundary target
        let edge = if target >= hi - tol { hi } else { lo };
        let idx: Vec<usize> = asset_returns
            .iter()
            .enumerate()
            .filter(|(_, &r)| (r - edge).abs() <= tol)
            .map(|(i, _)| i)
            .collect();
        let sub_cov = stats.covariance.select(Axis(0), &idx).select(Axis(1), &idx);
        let (sub_weights, iterations, converged) = solve_qp(&sub_cov, &[])?;
        let mut weights = Array1::<f64>::zeros(stats.n_assets());
        for (k, &i) in idx.iter().enumerate() {
            weights[i] = sub_weights[k];
        }
        (weights, iterations, converged)
    } else {
        solve_qp(&stats.covariance, &[(&asset_returns, target)])?
    };

    debug!(target, iterations, converged, "Solved target return");
    Ok(OptimizationResult::new(stats, weights, risk_free_rate, iterations, converged))
}

/// One target-return solve per target; unsolvable targets are left out.
pub fn efficient_frontier(stats: &PortfolioStats, targets: &[f64]) -> Vec<FrontierPoint> {
    targets
        .iter()
        .filter_map(|&target| match target_return_portfolio(stats, target, 0.0) {
            Ok(result) if result.converged => Some(FrontierPoint {
                target_return: target,
                volatility: result.portfolio.volatility,
                weights: result.portfolio.weights,
            }),
            Ok(result) => {
                warn!(target, iterations = result.iterations, "Frontier point did not converge");
                None
            }
            Err(e) => {
                warn!(target, error = %e, "Frontier point skipped");
                None
            }
        })
        .collect()
}

fn equal_weights(n: usize) -> Array1<f64> {
    Array1::from_elem(n, 1.0 / n as f64)
}

/// Minimises wᵀΣw subject to 1ᵀw = 1, w ≥ 0 and one extra row aᵀw = b per
/// `(a, b)` in `equalities`.
fn solve_qp(cov: &Array2<f64>, equalities: &[(&Array1<f64>, f64)]) -> Result<(Array1<f64>, usize, bool)> {
    let n = cov.nrows();
    let n_eq = 1 + equalities.len();

    // clarabel minimises ½xᵀPx + qᵀx
    let p = upper_triangle(cov, 2.0);
    let q = vec![0.0; n];

    // rows: budget, extra equalities, then -w in the nonnegative cone
    let mut col_ptr = vec![0];
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for j in 0..n {
        row_idx.push(0);
        values.push(1.0);
        for (k, (coef, _)) in equalities.iter().enumerate() {
            if coef[j] != 0.0 {
                row_idx.push(1 + k);
                values.push(coef[j]);
            }
        }
        row_idx.push(n_eq + j);
        values.push(-1.0);
        col_ptr.push(values.len());
    }
    let a = CscMatrix::new(n_eq + n, n, col_ptr, row_idx, values);

    let mut b = Vec::with_capacity(n_eq + n);
    b.push(1.0);
    b.extend(equalities.iter().map(|(_, rhs)| *rhs));
    b.extend(std::iter::repeat(0.0).take(n));

    let cones = [SupportedConeT::ZeroConeT(n_eq), SupportedConeT::NonnegativeConeT(n)];

    let settings = DefaultSettingsBuilder::default()
        .max_iter(MAX_ITERATIONS)
        .verbose(false)
        .build()
        .map_err(|e| FrontierError::Solver(format!("failed to build settings: {e}")))?;

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings)
        .map_err(|e| FrontierError::Solver(format!("failed to create solver: {e:?}")))?;
    solver.solve();

    let status = solver.solution.status;
    let converged = matches!(status, SolverStatus::Solved | SolverStatus::AlmostSolved);
    if !converged {
        debug!(?status, "QP solve stopped early");
    }
    Ok((
        clean_weights(&solver.solution.x),
        solver.info.iterations as usize,
        converged,
    ))
}

/// `scale * m` in CSC form, upper triangle only.
fn upper_triangle(m: &Array2<f64>, scale: f64) -> CscMatrix<f64> {
    let n = m.ncols();
    let mut col_ptr = vec![0];
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for j in 0..n {
        for i in 0..=j {
            let v = m[[i, j]];
            if v != 0.0 {
                row_idx.push(i);
                values.push(scale * v);
            }
        }
        col_ptr.push(values.len());
    }
    CscMatrix::new(m.nrows(), n, col_ptr, row_idx, values)
}

/// Clears interior-point round-off so the weights lie on the simplex.
fn clean_weights(raw: &[f64]) -> Array1<f64> {
    let clipped = Array1::from_iter(raw.iter().map(|&x| if x.is_finite() { x.max(0.0) } else { 0.0 }));
    let total = clipped.sum();
    if total > 0.0 {
        clipped / total
    } else {
        equal_weights(raw.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::TRADING_DAYS;
    use ndarray::array;

    fn moments(mean: Array1<f64>, cov: Array2<f64>) -> PortfolioStats {
        let n = mean.len();
        PortfolioStats {
            assets: (0..n).map(|i| format!("F{i}")).collect(),
            mean_returns: mean,
            covariance: cov,
            returns_matrix: Array2::zeros((n, 0)),
        }
    }

    fn two_assets() -> PortfolioStats {
        moments(array![0.01, 0.03], array![[0.04, 0.0], [0.0, 0.09]])
    }

    fn three_assets() -> PortfolioStats {
        moments(
            array![0.02, 0.05, 0.08],
            array![[0.50, 0.10, 0.05], [0.10, 1.20, 0.30], [0.05, 0.30, 2.50]],
        )
    }

    fn assert_feasible(w: &Array1<f64>) {
        assert!((w.sum() - 1.0).abs() < 1e-9, "weights sum to {}", w.sum());
        assert!(w.iter().all(|&x| (0.0..=1.0).contains(&x)), "weights out of bounds: {w}");
    }

    #[test]
    fn test_clean_weights_clears_round_off() {
        let w = clean_weights(&[0.7, -1e-10, 0.3 + 1e-10]);
        assert_feasible(&w);
        assert_eq!(w[1], 0.0);

        assert_eq!(clean_weights(&[f64::NAN, 0.0]), array![0.5, 0.5]);
    }

    #[test]
    fn test_upper_triangle_keeps_diagonal_and_above() {
        let p = upper_triangle(&array![[1.0, 0.5], [0.5, 2.0]], 2.0);
        assert_eq!(p.colptr, vec![0, 1, 3]);
        assert_eq!(p.rowval, vec![0, 0, 1]);
        assert_eq!(p.nzval, vec![2.0, 1.0, 4.0]);
    }

    #[test]
    fn test_two_asset_min_variance_closed_form() {
        let result = min_variance_portfolio(&two_assets(), 0.0).unwrap();
        let w = &result.portfolio.weights;

        assert!(result.converged);
        assert_feasible(w);
        assert!((w[0] - 0.09 / 0.13).abs() < 1e-5);
        assert!((w[1] - 0.04 / 0.13).abs() < 1e-5);
    }

    #[test]
    fn test_min_variance_hits_bound() {
        // second asset is riskier and perfectly correlated, so it gets nothing
        let stats = moments(array![0.01, 0.02], array![[1.0, 2.0], [2.0, 4.0]]);
        let result = min_variance_portfolio(&stats, 0.0).unwrap();
        assert!(result.converged);
        assert!((result.portfolio.weights[0] - 1.0).abs() < 1e-5);
        assert!(result.portfolio.weights[1].abs() < 1e-5);
    }

    #[test]
    fn test_min_variance_kkt_conditions() {
        let stats = three_assets();
        let result = min_variance_portfolio(&stats, 0.0).unwrap();
        let w = &result.portfolio.weights;
        assert!(result.converged);
        assert_feasible(w);

        // active assets share the same marginal variance, inactive ones are no lower
        let marginal = stats.covariance.dot(w);
        let active: Vec<f64> = (0..3).filter(|&i| w[i] > 1e-4).map(|i| marginal[i]).collect();
        for m in &active {
            assert!((m - active[0]).abs() < 1e-5);
        }
        for i in (0..3).filter(|&i| w[i] <= 1e-4) {
            assert!(marginal[i] >= active[0] - 1e-5);
        }
    }

    #[test]
    fn test_min_variance_beats_random_portfolios() {
        let stats = three_assets();
        let mut rng = StdRng::seed_from_u64(42);
        let random = random_portfolios(&stats, 2_000, 0.0, &mut rng);
        let best = min_variance_portfolio(&stats, 0.0).unwrap().portfolio.volatility;

        assert_eq!(random.len(), 2_000);
        for p in &random {
            assert_feasible(&p.weights);
            assert!(p.volatility >= 0.0);
            assert!(best <= p.volatility + 1e-7);
        }
    }

    #[test]
    fn test_random_portfolios_are_seeded() {
        let stats = two_assets();
        let a = random_portfolios(&stats, 5, 0.0, &mut StdRng::seed_from_u64(1));
        let b = random_portfolios(&stats, 5, 0.0, &mut StdRng::seed_from_u64(1));
        let wa: Vec<_> = a.iter().map(|p| p.weights.clone()).collect();
        let wb: Vec<_> = b.iter().map(|p| p.weights.clone()).collect();
        assert_eq!(wa, wb);
        assert!(random_portfolios(&stats, 0, 0.0, &mut StdRng::seed_from_u64(1)).is_empty());
    }

    #[test]
    fn test_results_carry_worst_day() {
        let stats = PortfolioStats::new(
            vec!["A".to_string(), "B".to_string()],
            array![[1.0, -2.0, 3.0, 0.5], [0.5, 1.0, -1.0, 2.0]],
        )
        .unwrap();
        let result = min_variance_portfolio(&stats, 0.0).unwrap();
        let daily = stats.portfolio_returns(&result.portfolio.weights);
        let lowest = daily.iter().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(result.worst_day, Some(lowest));

        // no observations to replay
        assert_eq!(min_variance_portfolio(&two_assets(), 0.0).unwrap().worst_day, None);
    }

    #[test]
    fn test_two_asset_target_return() {
        // the only fully invested mix earning 0.02 a day is 50/50
        let target = 0.02 * TRADING_DAYS;
        let result = target_return_portfolio(&two_assets(), target, 0.0).unwrap();
        let w = &result.portfolio.weights;

        assert!(result.converged);
        assert_feasible(w);
        assert!((w[0] - 0.5).abs() < 1e-5);
        assert!((result.portfolio.annual_return - target).abs() < 1e-5 * target);
    }

    #[test]
    fn test_target_return_matches_and_costs_variance() {
        let stats = three_assets();
        let min_var = min_variance_portfolio(&stats, 0.0).unwrap().portfolio;
        let target = 0.06 * TRADING_DAYS;

        let result = target_return_portfolio(&stats, target, 0.0).unwrap();
        let p = &result.portfolio;

        assert!(result.converged);
        assert_feasible(&p.weights);
        assert!((p.annual_return - target).abs() < 1e-5 * target);
        assert!(p.volatility >= min_var.volatility - 1e-7);
    }

    #[test]
    fn test_target_return_boundaries() {
        let stats = three_assets();
        let top = target_return_portfolio(&stats, 0.08 * TRADING_DAYS, 0.0).unwrap();
        assert!((top.portfolio.weights[2] - 1.0).abs() < 1e-12);

        let bottom = target_return_portfolio(&stats, 0.02 * TRADING_DAYS, 0.0).unwrap();
        assert!((bottom.portfolio.weights[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_target_return_infeasible() {
        let err = target_return_portfolio(&three_assets(), 0.09 * TRADING_DAYS, 0.0).unwrap_err();
        assert!(matches!(err, FrontierError::Infeasible { .. }));
        assert!(target_return_portfolio(&three_assets(), f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_equal_returns_fall_back_to_min_variance() {
        let stats = moments(array![0.01, 0.01], array![[0.04, 0.0], [0.0, 0.09]]);
        let result = target_return_portfolio(&stats, 0.01 * TRADING_DAYS, 0.0).unwrap();
        assert!((result.portfolio.weights[0] - 0.09 / 0.13).abs() < 1e-5);
    }

    #[test]
    fn test_upper_frontier_is_increasing() {
        let stats = three_assets();
        let min_var = min_variance_portfolio(&stats, 0.0).unwrap().portfolio;
        let targets = linspace(min_var.annual_return, 0.08 * TRADING_DAYS, 10);

        let frontier = efficient_frontier(&stats, &targets);

        assert_eq!(frontier.len(), 10);
        for pair in frontier.windows(2) {
            assert!(pair[1].volatility >= pair[0].volatility - 1e-7);
        }
        for point in &frontier {
            assert_feasible(&point.weights);
        }
    }

    #[test]
    fn test_analyse_bundles_results() {
        let stats = three_assets();
        let po = PortfolioOptimization {
            num_portfolios: 500,
            risk_free_rate: 0.5,
            target_return: 0.05 * TRADING_DAYS,
            frontier_points: 8,
            seed: Some(3),
        };

        let analysis = analyse(&stats, &po).unwrap();

        assert_eq!(analysis.random_portfolios.len(), 500);
        assert_eq!(analysis.asset_points.len(), 3);
        assert_eq!(analysis.frontier.len(), 8);
        assert!(analysis.target.is_some());
        let best = analysis.max_sharpe.unwrap();
        assert!(analysis
            .random_portfolios
            .iter()
            .all(|p| p.sharpe_ratio <= best.sharpe_ratio));
    }

    #[test]
    fn test_analyse_skips_unreachable_target() {
        let po = PortfolioOptimization {
            num_portfolios: 10,
            risk_free_rate: 0.0,
            target_return: 1_000.0,
            frontier_points: 3,
            seed: Some(3),
        };
        let analysis = analyse(&three_assets(), &po).unwrap();
        assert!(analysis.target.is_none());
    }
}
