#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fiscal/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and traits for fiscal metric queries.
//!
//! This crate provides the foundational abstractions shared by the store and
//! the resolver:
//!
//! - [`PeriodDescriptor`](period::PeriodDescriptor) - Parsed period input (term label, date or relative phrase)
//! - [`Vocabulary`](metric::Vocabulary) - Dissection groups and TTM indicators used by [`classify_metric`](metric::classify_metric)
//! - [`QueryRequest`](types::QueryRequest) - Fully resolved input to a query executor
//! - [`TermCalendar`](source::TermCalendar) - Company, term and period-end lookups
//! - [`MetricStore`](source::MetricStore) - Metric heads and the three query executors

/// Error types for resolution and query operations.
pub mod error;
/// Metric vocabulary and classification.
pub mod metric;
/// Period descriptors, term labels and date normalization.
pub mod period;
/// Data-source traits backing resolution and dispatch.
pub mod source;
/// Core identifiers and request types.
pub mod types;

// Re-export commonly used items at crate root
pub use error::{FiscalError, Result};
pub use metric::{
    ClassifiedMetric, DissectionGroup, MetricClassification, Vocabulary, classify_metric,
};
pub use period::{
    PeriodDescriptor, RelativePeriod, TermLabel, TermPeriod, normalize_date,
};
pub use source::{DataSource, MetricStore, TermCalendar};
pub use types::{
    CompanyId, ConsolidationType, DataScope, FiscalTerm, HeadId, MetricHead, QueryRequest,
    ResolvedPeriod, TermId,
};
