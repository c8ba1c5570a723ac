//! SQLite-backed term calendar and metric store.

use async_trait::async_trait;
use chrono::NaiveDate;
use fiscal_core::{
    CompanyId, ConsolidationType, DataScope, DataSource, DissectionGroup, FiscalError, FiscalTerm,
    HeadId, MetricClassification, MetricHead, MetricStore, QueryRequest, Result, TermCalendar,
    TermId, TermLabel, TermPeriod, Vocabulary,
};
use polars::prelude::*;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Row shape shared by the three executors before it becomes a DataFrame.
type ValueRow = (f64, String, String, i32, String, String, String, Option<String>);

/// SQLite store for fiscal calendars and metric values.
///
/// Dates are stored as `YYYY-MM-DD` text so that equality and ordering work
/// on the raw column. Every lookup is a single statement.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| FiscalError::Source(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| FiscalError::Source(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FiscalError::Source(e.to_string()))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS companies (
                company_id INTEGER PRIMARY KEY,
                ticker TEXT NOT NULL,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS terms (
                term_id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL,
                period TEXT NOT NULL,
                fiscal_year INTEGER NOT NULL,
                period_end TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_terms_company_end
             ON terms(company_id, period_end);

            CREATE TABLE IF NOT EXISTS metric_heads (
                head_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                unit TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS metric_values (
                company_id INTEGER NOT NULL,
                term_id INTEGER NOT NULL,
                head_id INTEGER NOT NULL,
                consolidation_id INTEGER NOT NULL,
                series TEXT NOT NULL,
                group_id INTEGER NOT NULL DEFAULT 0,
                value REAL NOT NULL,
                PRIMARY KEY (company_id, term_id, head_id, consolidation_id, series, group_id)
            );

            CREATE TABLE IF NOT EXISTS dissection_groups (
                group_id INTEGER PRIMARY KEY,
                label TEXT NOT NULL,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dissection_group_aliases (
                group_id INTEGER NOT NULL,
                alias TEXT NOT NULL,
                PRIMARY KEY (group_id, alias)
            );

            CREATE TABLE IF NOT EXISTS ttm_indicators (
                name TEXT PRIMARY KEY
            );",
        )
        .map_err(|e| FiscalError::Source(e.to_string()))?;

        debug!("SQLite store schema initialized");
        Ok(())
    }

    /// Inserts or replaces a company.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[instrument(skip(self))]
    pub fn put_company(&self, company: CompanyId, ticker: &str, name: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO companies (company_id, ticker, name) VALUES (?1, ?2, ?3)",
                params![company.get(), ticker, name],
            )
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        Ok(())
    }

    /// Inserts or replaces a fiscal term.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[instrument(skip(self, term), fields(term_id = %term.term_id, company = %term.company_id))]
    pub fn put_term(&self, term: &FiscalTerm) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO terms (term_id, company_id, period, fiscal_year, period_end)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    term.term_id.get(),
                    term.company_id.get(),
                    term.period.as_str(),
                    term.fiscal_year,
                    term.period_end.format(DATE_FORMAT).to_string()
                ],
            )
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        Ok(())
    }

    /// Inserts or replaces a metric head.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[instrument(skip(self, head), fields(head_id = %head.head_id, name = %head.name))]
    pub fn put_head(&self, head: &MetricHead) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO metric_heads (head_id, name, unit) VALUES (?1, ?2, ?3)",
                params![head.head_id.get(), head.name, head.unit],
            )
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        Ok(())
    }

    /// Inserts or replaces a metric value in the series selected by `series`.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[instrument(skip(self))]
    pub fn put_value(
        &self,
        company: CompanyId,
        term: TermId,
        head: HeadId,
        consolidation: ConsolidationType,
        series: MetricClassification,
        value: f64,
    ) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO metric_values
                 (company_id, term_id, head_id, consolidation_id, series, group_id, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    company.get(),
                    term.get(),
                    head.get(),
                    consolidation.id(),
                    series.as_str(),
                    series.group_id().unwrap_or(0),
                    value
                ],
            )
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        Ok(())
    }

    /// Appends a dissection group and its aliases to the schema-owned vocabulary.
    ///
    /// Groups keep the order they were first added in. Storing an existing
    /// group again replaces its label and aliases but keeps its priority.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[instrument(skip(self, group), fields(group_id = group.group_id, label = %group.label))]
    pub fn put_dissection_group(&self, group: &DissectionGroup) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        tx.execute(
            "INSERT OR REPLACE INTO dissection_groups (group_id, label, position)
             VALUES (?1, ?2, COALESCE(
                (SELECT position FROM dissection_groups WHERE group_id = ?1),
                (SELECT COALESCE(MAX(position), 0) + 1 FROM dissection_groups)
             ))",
            params![group.group_id, group.label],
        )
        .map_err(|e| FiscalError::Source(e.to_string()))?;
        tx.execute(
            "DELETE FROM dissection_group_aliases WHERE group_id = ?1",
            params![group.group_id],
        )
        .map_err(|e| FiscalError::Source(e.to_string()))?;
        for alias in &group.aliases {
            tx.execute(
                "INSERT OR IGNORE INTO dissection_group_aliases (group_id, alias) VALUES (?1, ?2)",
                params![group.group_id, alias],
            )
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        }

        tx.commit().map_err(|e| FiscalError::Source(e.to_string()))?;
        debug!(aliases = group.aliases.len(), "Stored dissection group");
        Ok(())
    }

    /// Marks a metric name as always served from the TTM series.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[instrument(skip(self))]
    pub fn put_ttm_indicator(&self, name: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO ttm_indicators (name) VALUES (?1)",
                params![name],
            )
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        Ok(())
    }

    fn query_terms(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<FiscalTerm>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        let mut terms = Vec::new();
        for row in rows {
            let (term_id, company_id, period, fiscal_year, period_end) =
                row.map_err(|e| FiscalError::Source(e.to_string()))?;
            terms.push(FiscalTerm::new(
                TermId::new(term_id),
                CompanyId::new(company_id),
                period.parse::<TermPeriod>()?,
                fiscal_year,
                parse_stored_date(&period_end)?,
            ));
        }
        Ok(terms)
    }

    /// Runs one executor statement for the given series.
    fn query_series(&self, request: &QueryRequest) -> Result<DataFrame> {
        let series = request.metric_classification;
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT v.value, h.unit, t.period, t.fiscal_year, c.ticker, h.name,
                        t.period_end, g.label
                 FROM metric_values v
                 JOIN metric_heads h ON h.head_id = v.head_id
                 JOIN terms t ON t.term_id = v.term_id
                 JOIN companies c ON c.company_id = v.company_id
                 LEFT JOIN dissection_groups g ON g.group_id = v.group_id
                 WHERE v.company_id = ?1
                   AND v.term_id = ?2
                   AND t.period_end = ?3
                   AND v.consolidation_id = ?4
                   AND v.series = ?5
                   AND v.group_id = ?6
                   AND (?7 IS NULL OR v.head_id = ?7)
                 ORDER BY t.period_end DESC, h.name ASC",
            )
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    request.company_id.get(),
                    request.term_id.get(),
                    request.period_end.format(DATE_FORMAT).to_string(),
                    request.consolidation_type.id(),
                    series.as_str(),
                    series.group_id().unwrap_or(0),
                    request.head_id().map(HeadId::get),
                ],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i32>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        let rows = rows
            .collect::<std::result::Result<Vec<ValueRow>, _>>()
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        debug!(
            series = series.as_str(),
            rows = rows.len(),
            "Executed metric query"
        );
        build_frame(rows, request.consolidation_type, series.group_id().is_some())
    }
}

fn parse_stored_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| FiscalError::Parse(format!("Invalid stored date '{s}': {e}")))
}

fn build_frame(
    rows: Vec<ValueRow>,
    consolidation: ConsolidationType,
    with_group: bool,
) -> Result<DataFrame> {
    let mut values = Vec::with_capacity(rows.len());
    let mut units = Vec::with_capacity(rows.len());
    let mut terms = Vec::with_capacity(rows.len());
    let mut companies = Vec::with_capacity(rows.len());
    let mut metrics = Vec::with_capacity(rows.len());
    let mut period_ends = Vec::with_capacity(rows.len());
    let mut groups = Vec::with_capacity(rows.len());

    for (value, unit, period, fiscal_year, company, metric, period_end, group) in rows {
        values.push(value);
        units.push(unit);
        terms.push(format!("{period} FY{fiscal_year}"));
        companies.push(company);
        metrics.push(metric);
        period_ends.push(period_end);
        groups.push(group);
    }

    let mut columns = vec![
        Column::new("value".into(), values),
        Column::new("unit".into(), units),
        Column::new("term".into(), terms),
        Column::new("company".into(), companies),
        Column::new("metric".into(), metrics),
        Column::new(
            "consolidation".into(),
            vec![consolidation.as_str(); period_ends.len()],
        ),
        Column::new("period_end".into(), period_ends),
    ];
    if with_group {
        columns.push(Column::new("dissection_group".into(), groups));
    }

    DataFrame::new(columns).map_err(|e| FiscalError::Source(e.to_string()))
}

impl DataSource for SqliteStore {
    fn name(&self) -> &str {
        "SQLite"
    }
}

#[async_trait]
impl TermCalendar for SqliteStore {
    #[instrument(skip(self))]
    async fn company_id(&self, ticker_or_name: &str) -> Result<Option<CompanyId>> {
        let query = ticker_or_name.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT company_id FROM (
                    SELECT company_id, 0 AS rank, 0 AS len FROM companies
                    WHERE lower(ticker) = lower(?1)
                    UNION ALL
                    SELECT company_id, 1 AS rank, length(name) AS len FROM companies
                    WHERE instr(lower(name), lower(?1)) > 0
                 )
                 ORDER BY rank, len, company_id
                 LIMIT 1",
                params![query],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        debug!(found = id.is_some(), "Company lookup");
        Ok(id.map(CompanyId::new))
    }

    #[instrument(skip(self), fields(company = %company, period_end = %period_end))]
    async fn terms_ending_on(
        &self,
        company: CompanyId,
        period_end: NaiveDate,
    ) -> Result<Vec<FiscalTerm>> {
        self.query_terms(
            "SELECT term_id, company_id, period, fiscal_year, period_end FROM terms
             WHERE company_id = ?1 AND period_end = ?2
             ORDER BY term_id",
            params![company.get(), period_end.format(DATE_FORMAT).to_string()],
        )
    }

    #[instrument(skip(self), fields(company = %company, label = %label))]
    async fn term_by_label(
        &self,
        company: CompanyId,
        label: &TermLabel,
    ) -> Result<Option<FiscalTerm>> {
        let terms = self.query_terms(
            "SELECT term_id, company_id, period, fiscal_year, period_end FROM terms
             WHERE company_id = ?1 AND period = ?2 AND (?3 IS NULL OR fiscal_year = ?3)
             ORDER BY period_end DESC, term_id
             LIMIT 1",
            params![company.get(), label.period.as_str(), label.fiscal_year],
        )?;
        Ok(terms.into_iter().next())
    }

    #[instrument(skip(self), fields(company = %company))]
    async fn terms(&self, company: CompanyId) -> Result<Vec<FiscalTerm>> {
        self.query_terms(
            "SELECT term_id, company_id, period, fiscal_year, period_end FROM terms
             WHERE company_id = ?1
             ORDER BY period_end DESC, term_id",
            params![company.get()],
        )
    }

    #[instrument(skip(self, scope), fields(company = %company, series = scope.series.as_str()))]
    async fn terms_with_data(
        &self,
        company: CompanyId,
        scope: &DataScope,
    ) -> Result<Vec<FiscalTerm>> {
        self.query_terms(
            "SELECT t.term_id, t.company_id, t.period, t.fiscal_year, t.period_end FROM terms t
             WHERE t.company_id = ?1
               AND EXISTS (
                 SELECT 1 FROM metric_values v
                 WHERE v.company_id = ?1
                   AND v.term_id = t.term_id
                   AND v.consolidation_id = ?2
                   AND v.series = ?3
                   AND v.group_id = ?4
                   AND (?5 IS NULL OR v.head_id = ?5)
               )
             ORDER BY t.period_end DESC, t.term_id",
            params![
                company.get(),
                scope.consolidation_type.id(),
                scope.series.as_str(),
                scope.series.group_id().unwrap_or(0),
                scope.head_id.map(HeadId::get),
            ],
        )
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    #[instrument(skip(self))]
    async fn metric_head(&self, name: &str) -> Result<Option<MetricHead>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let conn = self.conn()?;
        let head = conn
            .query_row(
                "SELECT head_id, name, unit FROM (
                    SELECT head_id, name, unit, 0 AS rank, length(name) AS len FROM metric_heads
                    WHERE lower(name) = lower(?1)
                    UNION ALL
                    SELECT head_id, name, unit, 1 AS rank, length(name) AS len FROM metric_heads
                    WHERE instr(lower(name), lower(?1)) > 0
                 )
                 ORDER BY rank, len, head_id
                 LIMIT 1",
                params![name],
                |row| {
                    Ok(MetricHead::new(
                        HeadId::new(row.get::<_, i64>(0)?),
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        debug!(found = head.is_some(), "Metric head lookup");
        Ok(head)
    }

    #[instrument(skip(self, request), fields(company = %request.company_id, term = %request.term_id))]
    async fn query_regular(&self, request: &QueryRequest) -> Result<DataFrame> {
        self.query_series(request)
    }

    #[instrument(skip(self, request), fields(company = %request.company_id, term = %request.term_id))]
    async fn query_ttm(&self, request: &QueryRequest) -> Result<DataFrame> {
        self.query_series(request)
    }

    #[instrument(skip(self, request), fields(company = %request.company_id, term = %request.term_id))]
    async fn query_dissection(&self, request: &QueryRequest) -> Result<DataFrame> {
        if request.metric_classification.group_id().is_none() {
            return Err(FiscalError::InvalidParameter(format!(
                "dissection query for {} metric",
                request.metric_classification.as_str()
            )));
        }
        self.query_series(request)
    }

    #[instrument(skip(self))]
    async fn vocabulary(&self) -> Result<Option<Vocabulary>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT group_id, label FROM dissection_groups ORDER BY position, group_id")
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        let groups = stmt
            .query_map([], |row| {
                Ok(DissectionGroup::new(
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })
            .map_err(|e| FiscalError::Source(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FiscalError::Source(e.to_string()))?;

        if groups.is_empty() {
            debug!("No schema-owned vocabulary");
            return Ok(None);
        }

        let mut alias_stmt = conn
            .prepare("SELECT alias FROM dissection_group_aliases WHERE group_id = ?1 ORDER BY alias")
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        let mut vocabulary = Vocabulary::empty();
        for group in groups {
            let aliases = alias_stmt
                .query_map(params![group.group_id], |row| row.get::<_, String>(0))
                .map_err(|e| FiscalError::Source(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| FiscalError::Source(e.to_string()))?;
            vocabulary = vocabulary.with_group(group.with_aliases(aliases));
        }

        let mut ttm_stmt = conn
            .prepare("SELECT name FROM ttm_indicators ORDER BY name")
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        let indicators = ttm_stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| FiscalError::Source(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FiscalError::Source(e.to_string()))?;
        for name in indicators {
            vocabulary = vocabulary.with_ttm_metric(name);
        }

        vocabulary.validate()?;
        debug!(
            groups = vocabulary.dissection_groups.len(),
            ttm_metrics = vocabulary.ttm_metrics.len(),
            "Loaded schema-owned vocabulary"
        );
        Ok(Some(vocabulary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        let hbl = CompanyId::new(1);
        store.put_company(hbl, "HBL", "Habib Bank Limited").unwrap();
        store
            .put_company(CompanyId::new(2), "UBL", "United Bank Limited")
            .unwrap();

        for (id, period, year, end) in [
            (10, TermPeriod::ThreeMonths, 2023, date(2023, 3, 31)),
            (11, TermPeriod::SixMonths, 2023, date(2023, 6, 30)),
            (12, TermPeriod::TwelveMonths, 2023, date(2023, 12, 31)),
            (13, TermPeriod::Ttm, 2023, date(2023, 12, 31)),
        ] {
            store
                .put_term(&FiscalTerm::new(TermId::new(id), hbl, period, year, end))
                .unwrap();
        }

        store
            .put_head(&MetricHead::new(HeadId::new(100), "Net Income", "PKR"))
            .unwrap();
        store
            .put_head(&MetricHead::new(HeadId::new(101), "PAT", "PKR"))
            .unwrap();
        store
    }

    fn request(
        term: i64,
        end: NaiveDate,
        series: MetricClassification,
        head: Option<MetricHead>,
    ) -> QueryRequest {
        QueryRequest {
            company_id: CompanyId::new(1),
            term_id: TermId::new(term),
            period_end: end,
            metric_classification: series,
            consolidation_type: ConsolidationType::Unconsolidated,
            head,
        }
    }

    #[tokio::test]
    async fn test_sqlite_store_initialization() {
        let store = SqliteStore::in_memory();
        assert!(store.is_ok());
        assert_eq!(store.unwrap().name(), "SQLite");
    }

    #[tokio::test]
    async fn test_company_lookup() {
        let store = seeded();

        assert_eq!(
            store.company_id("hbl").await.unwrap(),
            Some(CompanyId::new(1))
        );
        assert_eq!(
            store.company_id("United Bank").await.unwrap(),
            Some(CompanyId::new(2))
        );
        assert_eq!(store.company_id("MCB").await.unwrap(), None);
        assert_eq!(store.company_id("  ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_terms_ending_on() {
        let store = seeded();

        let terms = store
            .terms_ending_on(CompanyId::new(1), date(2023, 12, 31))
            .await
            .unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].period, TermPeriod::TwelveMonths);
        assert_eq!(terms[1].period, TermPeriod::Ttm);

        let none = store
            .terms_ending_on(CompanyId::new(1), date(2023, 9, 30))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_term_by_label() {
        let store = seeded();
        let hbl = CompanyId::new(1);

        let term = store
            .term_by_label(hbl, &TermLabel::new(TermPeriod::ThreeMonths, Some(2023)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(term.term_id, TermId::new(10));

        let latest = store
            .term_by_label(hbl, &TermLabel::new(TermPeriod::TwelveMonths, None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.term_id, TermId::new(12));

        let missing = store
            .term_by_label(hbl, &TermLabel::new(TermPeriod::NineMonths, Some(2023)))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_terms_newest_first() {
        let store = seeded();

        let terms = store.terms(CompanyId::new(1)).await.unwrap();
        assert_eq!(terms.len(), 4);
        assert_eq!(terms[0].period_end, date(2023, 12, 31));
        assert_eq!(terms[3].period_end, date(2023, 3, 31));
    }

    #[tokio::test]
    async fn test_terms_with_data() {
        let store = seeded();
        let hbl = CompanyId::new(1);
        store
            .put_value(
                hbl,
                TermId::new(11),
                HeadId::new(100),
                ConsolidationType::Unconsolidated,
                MetricClassification::Regular,
                640.0,
            )
            .unwrap();
        store
            .put_value(
                hbl,
                TermId::new(12),
                HeadId::new(101),
                ConsolidationType::Unconsolidated,
                MetricClassification::Regular,
                75.0,
            )
            .unwrap();

        let net_income = DataScope::new(
            Some(HeadId::new(100)),
            ConsolidationType::Unconsolidated,
            MetricClassification::Regular,
        );
        let terms = store.terms_with_data(hbl, &net_income).await.unwrap();
        assert_eq!(
            terms.iter().map(|t| t.term_id).collect::<Vec<_>>(),
            vec![TermId::new(11)]
        );

        let any_head = DataScope::new(
            None,
            ConsolidationType::Unconsolidated,
            MetricClassification::Regular,
        );
        let terms = store.terms_with_data(hbl, &any_head).await.unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].term_id, TermId::new(12));

        let consolidated = DataScope::new(
            Some(HeadId::new(100)),
            ConsolidationType::Consolidated,
            MetricClassification::Regular,
        );
        assert!(
            store
                .terms_with_data(hbl, &consolidated)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_metric_head_lookup() {
        let store = seeded();

        let exact = store.metric_head("pat").await.unwrap().unwrap();
        assert_eq!(exact.head_id, HeadId::new(101));

        let partial = store.metric_head("Net").await.unwrap().unwrap();
        assert_eq!(partial.name, "Net Income");

        assert!(store.metric_head("EBITDA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_regular() {
        let store = seeded();
        let head = MetricHead::new(HeadId::new(100), "Net Income", "PKR");
        store
            .put_value(
                CompanyId::new(1),
                TermId::new(12),
                head.head_id,
                ConsolidationType::Unconsolidated,
                MetricClassification::Regular,
                1250.5,
            )
            .unwrap();
        store
            .put_value(
                CompanyId::new(1),
                TermId::new(12),
                head.head_id,
                ConsolidationType::Consolidated,
                MetricClassification::Regular,
                9999.0,
            )
            .unwrap();

        let df = store
            .query_regular(&request(
                12,
                date(2023, 12, 31),
                MetricClassification::Regular,
                Some(head),
            ))
            .await
            .unwrap();

        assert_eq!(df.height(), 1);
        assert_eq!(
            df.get_column_names_str(),
            vec![
                "value",
                "unit",
                "term",
                "company",
                "metric",
                "consolidation",
                "period_end"
            ]
        );
        let value = df.column("value").unwrap().f64().unwrap().get(0);
        assert_eq!(value, Some(1250.5));
        let term = df.column("term").unwrap().str().unwrap().get(0);
        assert_eq!(term, Some("12M FY2023"));
    }

    #[tokio::test]
    async fn test_query_series_are_separate() {
        let store = seeded();
        let head = MetricHead::new(HeadId::new(100), "Net Income", "PKR");
        store
            .put_value(
                CompanyId::new(1),
                TermId::new(13),
                head.head_id,
                ConsolidationType::Unconsolidated,
                MetricClassification::Ttm,
                4800.0,
            )
            .unwrap();

        let regular = store
            .query_regular(&request(
                13,
                date(2023, 12, 31),
                MetricClassification::Regular,
                Some(head.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(regular.height(), 0);

        let ttm = store
            .query_ttm(&request(
                13,
                date(2023, 12, 31),
                MetricClassification::Ttm,
                Some(head),
            ))
            .await
            .unwrap();
        assert_eq!(ttm.height(), 1);
    }

    #[tokio::test]
    async fn test_query_dissection_whole_group() {
        let store = seeded();
        let series = MetricClassification::DissectionDerived { group_id: 1 };
        store
            .put_dissection_group(&DissectionGroup::new(1, "Per Share"))
            .unwrap();
        for (head, value) in [(100, 12.5), (101, 9.75)] {
            store
                .put_value(
                    CompanyId::new(1),
                    TermId::new(12),
                    HeadId::new(head),
                    ConsolidationType::Unconsolidated,
                    series,
                    value,
                )
                .unwrap();
        }

        let df = store
            .query_dissection(&request(12, date(2023, 12, 31), series, None))
            .await
            .unwrap();

        assert_eq!(df.height(), 2);
        let group = df.column("dissection_group").unwrap().str().unwrap().get(0);
        assert_eq!(group, Some("Per Share"));
    }

    #[tokio::test]
    async fn test_query_dissection_requires_group() {
        let store = seeded();

        let result = store
            .query_dissection(&request(
                12,
                date(2023, 12, 31),
                MetricClassification::Regular,
                None,
            ))
            .await;
        assert!(matches!(result, Err(FiscalError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_vocabulary_from_schema() {
        let store = seeded();
        assert!(store.vocabulary().await.unwrap().is_none());

        store
            .put_dissection_group(
                &DissectionGroup::new(7, "Dividend Cover").with_aliases(["div cover"]),
            )
            .unwrap();
        store
            .put_dissection_group(&DissectionGroup::new(3, "Payout"))
            .unwrap();
        store.put_ttm_indicator("Revenue TTM").unwrap();

        // Storing a group again keeps its priority.
        store
            .put_dissection_group(
                &DissectionGroup::new(7, "Dividend Cover").with_aliases(["div cover"]),
            )
            .unwrap();

        let vocabulary = store.vocabulary().await.unwrap().unwrap();
        assert_eq!(vocabulary.dissection_groups.len(), 2);
        assert_eq!(vocabulary.dissection_groups[0].group_id, 7);
        assert_eq!(vocabulary.dissection_groups[0].aliases, vec!["div cover"]);
        assert_eq!(vocabulary.ttm_metrics, vec!["Revenue TTM"]);
        assert_eq!(
            vocabulary.classify("EPS Div Cover").classification,
            MetricClassification::DissectionDerived { group_id: 7 }
        );
    }
}
