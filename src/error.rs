//! Error types for the salescast library.

use thiserror::Error;

/// Result type alias for aggregation, forecasting and persistence.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for model fitting and prediction.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Errors surfaced by the public operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bad aggregation or forecasting parameters.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Model fitting or prediction failed for one series.
    #[error("forecast failed for series '{series}': {source}")]
    Forecast {
        series: String,
        #[source]
        source: ModelError,
    },

    /// A table handed to persistence does not have the forecast layout.
    #[error("schema mismatch: missing {missing:?}, extra {extra:?}")]
    Schema {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    /// Target table already exists and the write mode forbids replacing it.
    #[error("table '{0}' already exists")]
    TableExists(String),

    /// Requested table is unknown to the sink.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// Pipeline configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

/// Errors that can occur while fitting or predicting with a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Missing values detected when not allowed.
    #[error("missing values detected in data")]
    MissingValues,

    /// Series carries no variation to model.
    #[error("degenerate series: all {0} observations are equal")]
    DegenerateSeries(usize),

    /// The order search ran out of time before any candidate was fitted.
    #[error("model search exceeded its time budget after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_messages_are_descriptive() {
        let err = ModelError::InsufficientData { needed: 10, got: 5 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 10, got 5"
        );

        let err = Error::invalid("value_columns must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid argument: value_columns must not be empty"
        );

        let err = Error::Schema {
            missing: vec!["ci_lo".to_string()],
            extra: vec![],
        };
        assert_eq!(err.to_string(), "schema mismatch: missing [\"ci_lo\"], extra []");
    }

    #[test]
    fn forecast_error_names_series_and_keeps_cause() {
        let err = Error::Forecast {
            series: "Mountain".to_string(),
            source: ModelError::DegenerateSeries(24),
        };
        assert!(err.to_string().contains("'Mountain'"));
        let cause = err.source().unwrap();
        assert_eq!(
            cause.to_string(),
            "degenerate series: all 24 observations are equal"
        );
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = ModelError::EmptyData;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
