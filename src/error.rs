use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parse error: {0}")]
    Date(#[from] chrono::ParseError),

    /// Malformed or insufficient series data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Target return cannot be reached by any long-only portfolio.
    #[error("Infeasible target return {target:.4}: attainable range is [{min:.4}, {max:.4}]")]
    Infeasible { target: f64, min: f64, max: f64 },

    /// The QP solver could not be set up for the problem data.
    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Invalid choice: {0}")]
    InvalidChoice(String),
}

pub type Result<T> = std::result::Result<T, FrontierError>;
