//! Data-source traits backing resolution and dispatch.
//!
//! This module defines the capabilities injected into the resolver:
//!
//! - [`DataSource`] - Base trait for all data sources
//! - [`TermCalendar`] - Company lookup and the companies' fiscal calendars
//! - [`MetricStore`] - Metric heads and the three query executors
//!
//! Connection setup and lifecycle belong to the implementor.

use async_trait::async_trait;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::fmt::Debug;

use crate::{
    error::Result,
    metric::Vocabulary,
    period::TermLabel,
    types::{CompanyId, DataScope, FiscalTerm, MetricHead, QueryRequest},
};

/// Base trait for all data sources.
pub trait DataSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g., "SQLite").
    fn name(&self) -> &str;
}

/// Company lookup and fiscal-calendar access.
///
/// Implement this trait to let the resolver map period descriptors to terms.
#[async_trait]
pub trait TermCalendar: DataSource {
    /// Looks up a company by ticker (exact, case-insensitive) or name (substring).
    async fn company_id(&self, ticker_or_name: &str) -> Result<Option<CompanyId>>;

    /// Returns every term of the company whose period ends on `period_end`.
    async fn terms_ending_on(
        &self,
        company: CompanyId,
        period_end: NaiveDate,
    ) -> Result<Vec<FiscalTerm>>;

    /// Returns the company's term matching a structured label.
    ///
    /// When the label carries no fiscal year, the most recent matching term is returned.
    async fn term_by_label(
        &self,
        company: CompanyId,
        label: &TermLabel,
    ) -> Result<Option<FiscalTerm>>;

    /// Returns the company's full fiscal calendar, newest period end first.
    async fn terms(&self, company: CompanyId) -> Result<Vec<FiscalTerm>>;

    /// Returns the company's terms holding values within `scope`, newest period end first.
    ///
    /// Default implementation ignores the scope and returns the full calendar.
    async fn terms_with_data(
        &self,
        company: CompanyId,
        _scope: &DataScope,
    ) -> Result<Vec<FiscalTerm>> {
        self.terms(company).await
    }
}

/// Metric heads and query executors.
///
/// Each executor is a function of the [`QueryRequest`] alone and returns a
/// DataFrame with columns: value, unit, term, company, metric, consolidation,
/// period_end. The dissection executor adds dissection_group.
#[async_trait]
pub trait MetricStore: DataSource {
    /// Looks up the stored metric for a base metric name.
    async fn metric_head(&self, name: &str) -> Result<Option<MetricHead>>;

    /// Executes a regular metric query.
    async fn query_regular(&self, request: &QueryRequest) -> Result<DataFrame>;

    /// Executes a trailing-twelve-months query.
    async fn query_ttm(&self, request: &QueryRequest) -> Result<DataFrame>;

    /// Executes a dissection query.
    ///
    /// When the request carries no head, every head of the dissection group is returned.
    async fn query_dissection(&self, request: &QueryRequest) -> Result<DataFrame>;

    /// Returns the vocabulary owned by the source's schema, if it defines one.
    ///
    /// Default implementation returns `Ok(None)`.
    async fn vocabulary(&self) -> Result<Option<Vocabulary>> {
        Ok(None)
    }
}
