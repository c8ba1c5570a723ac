//! Error types for resolution and query operations.
//!
//! This module defines [`FiscalError`] which covers every failure that can occur
//! while resolving a period, classifying a metric or querying a data source.

use thiserror::Error;

use crate::types::CompanyId;

/// Errors that can occur while resolving and dispatching a metric query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FiscalError {
    /// A structured term label did not match any term for the company.
    #[error("Unknown term '{label}' for company {company}")]
    UnknownTerm {
        /// The company whose fiscal calendar was searched.
        company: CompanyId,
        /// The label as supplied by the caller.
        label: String,
    },

    /// A date literal or relative period has no corresponding term.
    #[error("No period found for '{period}' for company {company}")]
    PeriodNotFound {
        /// The company whose fiscal calendar was searched.
        company: CompanyId,
        /// The normalized date or relative phrase.
        period: String,
    },

    /// The metric name matched neither a dissection group nor a stored metric.
    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    /// No company matched the ticker or name.
    #[error("Company not found: {0}")]
    CompanyNotFound(String),

    /// Input shaped like a date that is not a valid calendar date.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The underlying data source failed.
    #[error("Data source error: {0}")]
    Source(String),

    /// Error decoding a row returned by the data source.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid vocabulary or resolver configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FiscalError {
    /// Returns true if the error came from the data source rather than the input.
    #[must_use]
    pub const fn is_source_failure(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}

/// Result type alias using [`FiscalError`].
pub type Result<T> = std::result::Result<T, FiscalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_input() {
        let err = FiscalError::UnknownTerm {
            company: CompanyId::new(7),
            label: "Q5 2023".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown term 'Q5 2023' for company 7");

        let err = FiscalError::PeriodNotFound {
            company: CompanyId::new(7),
            period: "2023-12-31".to_string(),
        };
        assert!(err.to_string().contains("2023-12-31"));
    }

    #[test]
    fn test_source_failure_split() {
        assert!(FiscalError::Source("connection reset".into()).is_source_failure());
        assert!(!FiscalError::MetricNotFound("Foo".into()).is_source_failure());
    }
}
