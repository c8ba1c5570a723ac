//! Core identifiers and request types.
//!
//! This module defines the values that flow between resolution and dispatch:
//!
//! - [`CompanyId`], [`TermId`], [`HeadId`] - Database identifiers
//! - [`ConsolidationType`] - Standalone or group-consolidated figures
//! - [`FiscalTerm`] - One row of a company's fiscal calendar
//! - [`ResolvedPeriod`] - Outcome of period resolution
//! - [`MetricHead`] - A stored metric definition
//! - [`QueryRequest`] - Immutable input to exactly one query executor
//! - [`DataScope`] - Restricts calendar lookups to terms holding values

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{
    error::FiscalError,
    metric::MetricClassification,
    period::TermPeriod,
};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database identifier.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw database identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identifier of a company.
    CompanyId
);
id_type!(
    /// Identifier of a fiscal term.
    TermId
);
id_type!(
    /// Identifier of a metric head.
    HeadId
);

/// Whether reported figures are standalone or group-consolidated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsolidationType {
    /// Group-consolidated figures.
    Consolidated,
    /// Standalone figures.
    #[default]
    Unconsolidated,
}

impl ConsolidationType {
    /// Returns the database identifier of this consolidation type.
    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::Consolidated => 1,
            Self::Unconsolidated => 2,
        }
    }

    /// Returns the display name stored alongside the identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consolidated => "Consolidated",
            Self::Unconsolidated => "Unconsolidated",
        }
    }
}

impl fmt::Display for ConsolidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsolidationType {
    type Err = FiscalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.is_empty() || lower.contains("unconsolidated") || lower.contains("standalone") {
            Ok(Self::Unconsolidated)
        } else if lower.contains("consolidated") {
            Ok(Self::Consolidated)
        } else {
            Err(FiscalError::InvalidParameter(format!(
                "unknown consolidation type: {s}"
            )))
        }
    }
}

/// One row of a company's fiscal calendar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalTerm {
    /// Term identifier.
    pub term_id: TermId,
    /// Company the term belongs to.
    pub company_id: CompanyId,
    /// Length of the reporting period.
    pub period: TermPeriod,
    /// Fiscal year the term reports on.
    pub fiscal_year: i32,
    /// Last day of the reporting period.
    pub period_end: NaiveDate,
}

impl FiscalTerm {
    /// Creates a new fiscal term.
    #[must_use]
    pub const fn new(
        term_id: TermId,
        company_id: CompanyId,
        period: TermPeriod,
        fiscal_year: i32,
        period_end: NaiveDate,
    ) -> Self {
        Self {
            term_id,
            company_id,
            period,
            fiscal_year,
            period_end,
        }
    }
}

/// A period resolved to a concrete term.
///
/// The term identifier is always present: every query path joins on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPeriod {
    /// Identifier of the resolved term.
    pub term_id: TermId,
    /// Last day of the resolved period.
    pub period_end: NaiveDate,
    /// Length of the resolved period.
    pub period: TermPeriod,
}

impl From<&FiscalTerm> for ResolvedPeriod {
    fn from(term: &FiscalTerm) -> Self {
        Self {
            term_id: term.term_id,
            period_end: term.period_end,
            period: term.period,
        }
    }
}

/// A stored metric definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricHead {
    /// Head identifier.
    pub head_id: HeadId,
    /// Stored metric name.
    pub name: String,
    /// Unit of measurement.
    pub unit: String,
}

impl MetricHead {
    /// Creates a new metric head.
    #[must_use]
    pub fn new(head_id: HeadId, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            head_id,
            name: name.into(),
            unit: unit.into(),
        }
    }
}

/// Fully resolved input to exactly one query executor.
///
/// Built once per resolution call and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Company being queried.
    pub company_id: CompanyId,
    /// Resolved term.
    pub term_id: TermId,
    /// Resolved period end.
    pub period_end: NaiveDate,
    /// Which executor handles the request.
    pub metric_classification: MetricClassification,
    /// Standalone or consolidated figures.
    pub consolidation_type: ConsolidationType,
    /// Metric head, absent only when a bare dissection group was requested.
    pub head: Option<MetricHead>,
}

impl QueryRequest {
    /// Creates a request from a resolved period.
    #[must_use]
    pub const fn new(
        company_id: CompanyId,
        period: ResolvedPeriod,
        metric_classification: MetricClassification,
        consolidation_type: ConsolidationType,
        head: Option<MetricHead>,
    ) -> Self {
        Self {
            company_id,
            term_id: period.term_id,
            period_end: period.period_end,
            metric_classification,
            consolidation_type,
            head,
        }
    }

    /// Returns the head identifier, if the request targets a single head.
    #[must_use]
    pub fn head_id(&self) -> Option<HeadId> {
        self.head.as_ref().map(|h| h.head_id)
    }
}

/// The values a relative period must find data for.
///
/// Relative periods such as "last available" resolve against terms that hold
/// values for this head, consolidation and series rather than the bare calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataScope {
    /// Metric head, absent for a bare dissection group.
    pub head_id: Option<HeadId>,
    /// Standalone or consolidated figures.
    pub consolidation_type: ConsolidationType,
    /// Which value series must hold data.
    pub series: MetricClassification,
}

impl DataScope {
    /// Creates a scope.
    #[must_use]
    pub const fn new(
        head_id: Option<HeadId>,
        consolidation_type: ConsolidationType,
        series: MetricClassification,
    ) -> Self {
        Self {
            head_id,
            consolidation_type,
            series,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consolidation_parse() {
        assert_eq!(
            "Unconsolidated".parse::<ConsolidationType>().unwrap(),
            ConsolidationType::Unconsolidated
        );
        assert_eq!(
            "standalone".parse::<ConsolidationType>().unwrap(),
            ConsolidationType::Unconsolidated
        );
        assert_eq!(
            " CONSOLIDATED ".parse::<ConsolidationType>().unwrap(),
            ConsolidationType::Consolidated
        );
        assert_eq!(
            "".parse::<ConsolidationType>().unwrap(),
            ConsolidationType::Unconsolidated
        );
        assert!(matches!(
            "group".parse::<ConsolidationType>(),
            Err(FiscalError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_consolidation_ids() {
        assert_eq!(ConsolidationType::Consolidated.id(), 1);
        assert_eq!(ConsolidationType::Unconsolidated.id(), 2);
    }

    #[test]
    fn test_request_copies_resolved_period() {
        let period = ResolvedPeriod {
            term_id: TermId::new(41),
            period_end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            period: TermPeriod::TwelveMonths,
        };
        let head = MetricHead::new(HeadId::new(9), "Net Income", "PKR");
        let request = QueryRequest::new(
            CompanyId::new(1),
            period,
            MetricClassification::Regular,
            ConsolidationType::Unconsolidated,
            Some(head),
        );

        assert_eq!(request.term_id, TermId::new(41));
        assert_eq!(request.period_end, period.period_end);
        assert_eq!(request.head_id(), Some(HeadId::new(9)));
    }
}
