use thiserror::Error;

/// Failure of a forecasting or recommendation job.
///
/// Degenerate numeric input (empty series, zero denominators) is never an error;
/// it shows up as absent fields on the result instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error("job scope violation: {0}")]
    ScopeViolation(String),
}
