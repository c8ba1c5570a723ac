//! Period resolution and query dispatch over injected data sources.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use polars::prelude::DataFrame;
use tracing::{debug, error, info, warn};

use fiscal_core::{
    ClassifiedMetric, CompanyId, ConsolidationType, DataScope, FiscalError, FiscalTerm,
    MetricClassification, MetricStore, PeriodDescriptor, QueryRequest, RelativePeriod,
    ResolvedPeriod, Result, TermCalendar, TermLabel, Vocabulary,
};

/// Result of a caller-facing resolution and dispatch.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The executor returned at least one row.
    Rows(DataFrame),
    /// The request was valid but the executor returned nothing.
    NoRows,
    /// Resolution or execution failed.
    Failed(FiscalError),
}

impl QueryOutcome {
    /// Returns a one-line description of the outcome.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Rows(df) => format!("{} rows", df.height()),
            Self::NoRows => "No data found".to_string(),
            Self::Failed(e) => e.to_string(),
        }
    }

    /// Returns true if no rows were produced, whether or not the call failed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !matches!(self, Self::Rows(_))
    }

    /// Returns the rows, if any.
    #[must_use]
    pub fn into_frame(self) -> Option<DataFrame> {
        match self {
            Self::Rows(df) => Some(df),
            _ => None,
        }
    }

    /// Returns the error, if the call failed.
    #[must_use]
    pub const fn error(&self) -> Option<&FiscalError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Resolves period terms and metric names into a single executor call.
///
/// The resolver holds no per-call state: each call makes at most one company
/// lookup, one head lookup, one calendar lookup and one executor call, awaited
/// in that order.
///
/// # Example
///
/// ```rust,ignore
/// use fiscal::{Resolver, SqliteStore};
/// use std::sync::Arc;
///
/// let store = Arc::new(SqliteStore::new("fundamentals.db")?);
/// let resolver = Resolver::from_source(store).load_vocabulary().await?;
///
/// let outcome = resolver
///     .resolve_and_dispatch("HBL", "PAT Per Share", "31-12-2023", "Unconsolidated")
///     .await;
/// println!("{}", outcome.message());
/// ```
pub struct Resolver {
    calendar: Arc<dyn TermCalendar>,
    store: Arc<dyn MetricStore>,
    vocabulary: Vocabulary,
    as_of: Option<NaiveDate>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("calendar", &self.calendar.name())
            .field("store", &self.store.name())
            .field(
                "dissection_groups",
                &self
                    .vocabulary
                    .dissection_groups
                    .iter()
                    .map(|g| g.label.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("as_of", &self.as_of)
            .finish()
    }
}

impl Resolver {
    /// Creates a resolver over separate calendar and metric sources.
    #[must_use]
    pub fn new(calendar: Arc<dyn TermCalendar>, store: Arc<dyn MetricStore>) -> Self {
        debug!(
            calendar = calendar.name(),
            store = store.name(),
            "Creating resolver"
        );
        Self {
            calendar,
            store,
            vocabulary: Vocabulary::default(),
            as_of: None,
        }
    }

    /// Creates a resolver over one source that serves both calendar and metrics.
    #[must_use]
    pub fn from_source<S>(source: Arc<S>) -> Self
    where
        S: TermCalendar + MetricStore + 'static,
    {
        let calendar: Arc<dyn TermCalendar> = source.clone();
        let store: Arc<dyn MetricStore> = source;
        Self::new(calendar, store)
    }

    /// Replaces the metric vocabulary.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Fixes the date relative periods are measured from. Defaults to today.
    #[must_use]
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Replaces the vocabulary with the one owned by the store's schema, if any.
    ///
    /// # Errors
    /// Returns an error if the store fails to load or validate its vocabulary.
    pub async fn load_vocabulary(mut self) -> Result<Self> {
        match self.store.vocabulary().await? {
            Some(vocabulary) => {
                info!(
                    store = self.store.name(),
                    groups = vocabulary.dissection_groups.len(),
                    "Using schema-owned vocabulary"
                );
                self.vocabulary = vocabulary;
            }
            None => debug!(store = self.store.name(), "Keeping default vocabulary"),
        }
        Ok(self)
    }

    /// Returns the vocabulary in use.
    #[must_use]
    pub const fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Classifies a metric name against the configured vocabulary.
    #[must_use]
    pub fn classify_metric(&self, metric_name: &str) -> ClassifiedMetric {
        self.vocabulary.classify(metric_name)
    }

    /// Resolves a period term to a concrete term of the company.
    ///
    /// # Errors
    /// Returns [`FiscalError::UnknownTerm`] or [`FiscalError::PeriodNotFound`]
    /// when no term matches, [`FiscalError::InvalidDate`] for a malformed date,
    /// and source errors unchanged.
    pub async fn resolve_period(
        &self,
        period_term: &str,
        company_id: CompanyId,
    ) -> Result<ResolvedPeriod> {
        self.resolve_period_for(period_term, company_id, MetricClassification::Regular)
            .await
    }

    /// Resolves a period term, preferring the TTM term for TTM metrics.
    ///
    /// # Errors
    /// See [`Self::resolve_period`].
    pub async fn resolve_period_for(
        &self,
        period_term: &str,
        company_id: CompanyId,
        classification: MetricClassification,
    ) -> Result<ResolvedPeriod> {
        self.resolve(period_term, company_id, classification, None).await
    }

    /// Resolves a period term for the values described by `scope`.
    ///
    /// Relative periods pick among terms that hold values in the scope, so
    /// "last available" skips calendar terms with nothing reported yet. Dates
    /// and labels resolve as in [`Self::resolve_period_for`].
    ///
    /// # Errors
    /// See [`Self::resolve_period`].
    pub async fn resolve_period_in(
        &self,
        period_term: &str,
        company_id: CompanyId,
        scope: &DataScope,
    ) -> Result<ResolvedPeriod> {
        self.resolve(period_term, company_id, scope.series, Some(scope)).await
    }

    async fn resolve(
        &self,
        period_term: &str,
        company_id: CompanyId,
        classification: MetricClassification,
        scope: Option<&DataScope>,
    ) -> Result<ResolvedPeriod> {
        let prefer_ttm = classification == MetricClassification::Ttm;
        let descriptor = PeriodDescriptor::parse(period_term)?;
        debug!(company = %company_id, descriptor = ?descriptor, prefer_ttm, "Resolving period");

        let term = match &descriptor {
            PeriodDescriptor::LiteralDate { date } => {
                let terms = self.calendar.terms_ending_on(company_id, *date).await?;
                pick_term(&terms, prefer_ttm).ok_or_else(|| FiscalError::PeriodNotFound {
                    company: company_id,
                    period: descriptor.to_string(),
                })?
            }
            PeriodDescriptor::StructuredTerm { label } => {
                let unknown = || FiscalError::UnknownTerm {
                    company: company_id,
                    label: label.clone(),
                };
                let parsed = TermLabel::parse(label).ok_or_else(unknown)?;
                self.calendar
                    .term_by_label(company_id, &parsed)
                    .await?
                    .ok_or_else(unknown)?
            }
            PeriodDescriptor::Relative(relative) => {
                let terms = match scope {
                    Some(scope) => self.calendar.terms_with_data(company_id, scope).await?,
                    None => self.calendar.terms(company_id).await?,
                };
                let as_of = self.as_of.unwrap_or_else(|| Local::now().date_naive());
                pick_relative(&terms, *relative, as_of, prefer_ttm).ok_or_else(|| {
                    FiscalError::PeriodNotFound {
                        company: company_id,
                        period: relative.to_string(),
                    }
                })?
            }
        };

        let resolved = ResolvedPeriod::from(&term);
        debug!(
            company = %company_id,
            term_id = %resolved.term_id,
            period_end = %resolved.period_end,
            period = %resolved.period,
            "Resolved period"
        );
        Ok(resolved)
    }

    /// Sends a request to exactly one executor.
    ///
    /// # Errors
    /// Returns the executor's error unchanged.
    pub async fn dispatch(&self, request: &QueryRequest) -> Result<DataFrame> {
        debug!(
            store = self.store.name(),
            company = %request.company_id,
            term_id = %request.term_id,
            path = request.metric_classification.as_str(),
            "Dispatching query"
        );
        match request.metric_classification {
            MetricClassification::Regular => self.store.query_regular(request).await,
            MetricClassification::Ttm => self.store.query_ttm(request).await,
            MetricClassification::DissectionDerived { .. } => {
                self.store.query_dissection(request).await
            }
        }
    }

    /// Resolves company, metric and period, then dispatches one query.
    ///
    /// # Errors
    /// Returns the first resolution error or the executor's error. No query is
    /// dispatched unless every part of the request resolved.
    pub async fn try_resolve_and_dispatch(
        &self,
        company: &str,
        metric_name: &str,
        period_term: &str,
        consolidation: &str,
    ) -> Result<DataFrame> {
        let consolidation_type: ConsolidationType = consolidation.parse()?;

        let company_id = self
            .calendar
            .company_id(company)
            .await?
            .ok_or_else(|| FiscalError::CompanyNotFound(company.trim().to_string()))?;

        let metric_name = metric_name.trim();
        if metric_name.is_empty() {
            return Err(FiscalError::MetricNotFound(String::new()));
        }
        let classified = self.vocabulary.classify(metric_name);

        let head = if classified.is_bare_group() {
            None
        } else {
            let base_name = classified
                .base_name
                .as_deref()
                .ok_or_else(|| FiscalError::MetricNotFound(metric_name.to_string()))?;
            let head = self
                .store
                .metric_head(base_name)
                .await?
                .ok_or_else(|| FiscalError::MetricNotFound(metric_name.to_string()))?;
            Some(head)
        };

        if let Some(group) = classified
            .classification
            .group_id()
            .and_then(|id| self.vocabulary.group(id))
        {
            debug!(
                group = %group.label,
                head = ?head.as_ref().map(|h| h.name.as_str()),
                "Requesting dissection group"
            );
        }

        let scope = DataScope::new(
            head.as_ref().map(|h| h.head_id),
            consolidation_type,
            classified.classification,
        );
        let period = self
            .resolve_period_in(period_term, company_id, &scope)
            .await?;

        // A TTM term holds no regular values.
        let classification = match classified.classification {
            MetricClassification::Regular if period.period.is_ttm() => {
                debug!(term_id = %period.term_id, "TTM period routes to the TTM path");
                MetricClassification::Ttm
            }
            other => other,
        };

        let request = QueryRequest::new(
            company_id,
            period,
            classification,
            consolidation_type,
            head,
        );
        self.dispatch(&request).await
    }

    /// Caller-facing entry point: never fails, reports every outcome.
    pub async fn resolve_and_dispatch(
        &self,
        company: &str,
        metric_name: &str,
        period_term: &str,
        consolidation: &str,
    ) -> QueryOutcome {
        match self
            .try_resolve_and_dispatch(company, metric_name, period_term, consolidation)
            .await
        {
            Ok(df) if df.height() == 0 => {
                info!(company, metric = metric_name, period = period_term, "No rows");
                QueryOutcome::NoRows
            }
            Ok(df) => {
                info!(
                    company,
                    metric = metric_name,
                    period = period_term,
                    rows = df.height(),
                    "Query returned rows"
                );
                QueryOutcome::Rows(df)
            }
            Err(e) if e.is_source_failure() => {
                error!(
                    company,
                    metric = metric_name,
                    period = period_term,
                    error = %e,
                    "Data source failed"
                );
                QueryOutcome::Failed(e)
            }
            Err(e) => {
                warn!(
                    company,
                    metric = metric_name,
                    period = period_term,
                    error = %e,
                    "Could not resolve query"
                );
                QueryOutcome::Failed(e)
            }
        }
    }
}

/// Picks the preferred term among terms sharing a period end.
///
/// Longer cumulative periods win. TTM terms are taken only when preferred or
/// when nothing else ends on that date.
fn pick_term(terms: &[FiscalTerm], prefer_ttm: bool) -> Option<FiscalTerm> {
    if prefer_ttm {
        if let Some(term) = terms.iter().find(|t| t.period.is_ttm()) {
            return Some(term.clone());
        }
    }
    terms
        .iter()
        .filter(|t| !t.period.is_ttm())
        .max_by_key(|t| t.period.months())
        .or_else(|| terms.first())
        .cloned()
}

/// Picks the term a relative period refers to from a newest-first calendar.
fn pick_relative(
    terms: &[FiscalTerm],
    relative: RelativePeriod,
    as_of: NaiveDate,
    prefer_ttm: bool,
) -> Option<FiscalTerm> {
    let mut ends: Vec<NaiveDate> = terms
        .iter()
        .filter(|t| prefer_ttm || !t.period.is_ttm())
        .map(|t| t.period_end)
        .collect();
    ends.sort_unstable_by(|a, b| b.cmp(a));
    ends.dedup();

    let end = match relative {
        RelativePeriod::MostRecent => ends.first().copied(),
        RelativePeriod::PreviousQuarter => ends.get(1).copied(),
        RelativePeriod::YearToDate => ends.iter().copied().find(|d| d.year() == as_of.year()),
        RelativePeriod::PreviousYear => ends
            .iter()
            .copied()
            .find(|d| d.year() == as_of.year() - 1),
    }?;

    let candidates: Vec<FiscalTerm> = terms
        .iter()
        .filter(|t| t.period_end == end)
        .cloned()
        .collect();
    pick_term(&candidates, prefer_ttm)
}
