//! Period descriptors, term labels and date normalization.
//!
//! This module defines [`PeriodDescriptor`] for classifying a free-form period
//! term, [`TermLabel`] and [`TermPeriod`] for structured fiscal-term labels, and
//! [`RelativePeriod`] for phrases such as "most recent".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FiscalError, Result};

/// Length of a fiscal reporting period.
///
/// Quarterly terms are cumulative: the second quarter is reported as `6M`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermPeriod {
    /// First quarter (three months).
    #[serde(rename = "3M")]
    ThreeMonths,
    /// Half year (six months).
    #[serde(rename = "6M")]
    SixMonths,
    /// Nine months.
    #[serde(rename = "9M")]
    NineMonths,
    /// Full fiscal year.
    #[serde(rename = "12M")]
    TwelveMonths,
    /// Trailing twelve months.
    #[serde(rename = "TTM")]
    Ttm,
}

impl TermPeriod {
    /// Returns the label used by the terms table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::NineMonths => "9M",
            Self::TwelveMonths => "12M",
            Self::Ttm => "TTM",
        }
    }

    /// Returns true for the trailing-twelve-months period.
    #[must_use]
    pub const fn is_ttm(&self) -> bool {
        matches!(self, Self::Ttm)
    }

    /// Number of months covered by a cumulative period, `None` for TTM.
    #[must_use]
    pub const fn months(&self) -> Option<u32> {
        match self {
            Self::ThreeMonths => Some(3),
            Self::SixMonths => Some(6),
            Self::NineMonths => Some(9),
            Self::TwelveMonths => Some(12),
            Self::Ttm => None,
        }
    }
}

impl fmt::Display for TermPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TermPeriod {
    type Err = FiscalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "3M" => Ok(Self::ThreeMonths),
            "6M" => Ok(Self::SixMonths),
            "9M" => Ok(Self::NineMonths),
            "12M" => Ok(Self::TwelveMonths),
            "TTM" => Ok(Self::Ttm),
            _ => Err(FiscalError::Parse(format!("Invalid term period: {s}"))),
        }
    }
}

const TERM_ALIASES: &[(&str, TermPeriod)] = &[
    ("trailing twelve months", TermPeriod::Ttm),
    ("trailing 12 months", TermPeriod::Ttm),
    ("ttm", TermPeriod::Ttm),
    ("first quarter", TermPeriod::ThreeMonths),
    ("quarter 1", TermPeriod::ThreeMonths),
    ("q1", TermPeriod::ThreeMonths),
    ("three months", TermPeriod::ThreeMonths),
    ("3m", TermPeriod::ThreeMonths),
    ("second quarter", TermPeriod::SixMonths),
    ("quarter 2", TermPeriod::SixMonths),
    ("q2", TermPeriod::SixMonths),
    ("six months", TermPeriod::SixMonths),
    ("h1", TermPeriod::SixMonths),
    ("6m", TermPeriod::SixMonths),
    ("third quarter", TermPeriod::NineMonths),
    ("quarter 3", TermPeriod::NineMonths),
    ("q3", TermPeriod::NineMonths),
    ("nine months", TermPeriod::NineMonths),
    ("9m", TermPeriod::NineMonths),
    ("fourth quarter", TermPeriod::TwelveMonths),
    ("quarter 4", TermPeriod::TwelveMonths),
    ("q4", TermPeriod::TwelveMonths),
    ("twelve months", TermPeriod::TwelveMonths),
    ("12m", TermPeriod::TwelveMonths),
    ("full year", TermPeriod::TwelveMonths),
    ("annual", TermPeriod::TwelveMonths),
    ("yearly", TermPeriod::TwelveMonths),
    ("year", TermPeriod::TwelveMonths),
    ("fy", TermPeriod::TwelveMonths),
];

/// A structured fiscal-term label such as `Q1 2023` or `FY2022`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermLabel {
    /// Length of the reporting period.
    pub period: TermPeriod,
    /// Fiscal year, when the label names one.
    pub fiscal_year: Option<i32>,
}

impl TermLabel {
    /// Creates a label from its parts.
    #[must_use]
    pub const fn new(period: TermPeriod, fiscal_year: Option<i32>) -> Self {
        Self {
            period,
            fiscal_year,
        }
    }

    /// Parses a free-form label, returning `None` if no term period is recognized.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = normalize_words(label);
        if normalized.is_empty() {
            return None;
        }

        let mut fiscal_year = None;
        let mut fy_prefixed = false;
        for token in normalized.split(' ') {
            let digits = match token.strip_prefix("fy") {
                Some(rest) if rest.bytes().all(|b| b.is_ascii_digit()) => {
                    fy_prefixed = true;
                    rest
                }
                _ => token,
            };
            if digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()) {
                fiscal_year = digits.parse().ok();
                break;
            }
        }

        let period = TERM_ALIASES
            .iter()
            .find(|(alias, _)| contains_phrase(&normalized, alias))
            .map(|(_, period)| *period)
            .or(fy_prefixed.then_some(TermPeriod::TwelveMonths))?;

        Some(Self {
            period,
            fiscal_year,
        })
    }
}

impl fmt::Display for TermLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fiscal_year {
            Some(year) => write!(f, "{} FY{}", self.period, year),
            None => write!(f, "{}", self.period),
        }
    }
}

/// A period expressed relative to the company's latest reported data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativePeriod {
    /// The latest reported period.
    MostRecent,
    /// The period reported before the latest one.
    PreviousQuarter,
    /// The latest period ending in the current calendar year.
    YearToDate,
    /// The latest period ending in the previous calendar year.
    PreviousYear,
}

impl RelativePeriod {
    /// Parses an exact relative phrase such as "latest" or "year to date".
    #[must_use]
    pub fn parse(phrase: &str) -> Option<Self> {
        match normalize_words(phrase).as_str() {
            "most recent" | "latest" | "last reported" | "last available" | "current"
            | "current period" => Some(Self::MostRecent),
            "previous quarter" | "last quarter" => Some(Self::PreviousQuarter),
            "ytd" | "year to date" => Some(Self::YearToDate),
            "previous year" | "last year" => Some(Self::PreviousYear),
            _ => None,
        }
    }

    /// Returns a stable name for logging and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MostRecent => "most recent",
            Self::PreviousQuarter => "previous quarter",
            Self::YearToDate => "year to date",
            Self::PreviousYear => "previous year",
        }
    }
}

impl fmt::Display for RelativePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A free-form period term classified by shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodDescriptor {
    /// A fiscal-term label resolved against the company's calendar.
    StructuredTerm {
        /// The label as supplied.
        label: String,
    },
    /// An explicit calendar date, already normalized.
    LiteralDate {
        /// The period end date.
        date: NaiveDate,
    },
    /// A phrase relative to the latest reported period.
    Relative(RelativePeriod),
}

impl PeriodDescriptor {
    /// Classifies a period term.
    ///
    /// Three hyphen-separated numeric components make a date literal, an exact
    /// relative phrase makes a relative period, and anything else is kept as a
    /// structured label. An empty term means the most recent period.
    ///
    /// # Errors
    /// Returns [`FiscalError::InvalidDate`] if the term is date-shaped but does
    /// not name a real calendar date.
    pub fn parse(period_term: &str) -> Result<Self> {
        let term = period_term.trim();
        if term.is_empty() {
            return Ok(Self::Relative(RelativePeriod::MostRecent));
        }
        if is_date_shaped(term) {
            return Ok(Self::LiteralDate {
                date: parse_date(term)?,
            });
        }
        if let Some(relative) = RelativePeriod::parse(term) {
            return Ok(Self::Relative(relative));
        }
        Ok(Self::StructuredTerm {
            label: term.to_string(),
        })
    }
}

impl fmt::Display for PeriodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StructuredTerm { label } => f.write_str(label),
            Self::LiteralDate { date } => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Relative(relative) => write!(f, "{relative}"),
        }
    }
}

/// Normalizes a date literal to canonical `YYYY-MM-DD`.
///
/// Year-first input is kept in order; `DD-MM-YYYY` and `D-M-YYYY` are reordered.
/// Day and month are zero-padded in both cases.
///
/// # Errors
/// Returns [`FiscalError::InvalidDate`] if the input is not three numeric
/// components or does not name a real calendar date.
pub fn normalize_date(input: &str) -> Result<String> {
    Ok(parse_date(input)?.format("%Y-%m-%d").to_string())
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    let invalid = || FiscalError::InvalidDate(input.to_string());
    if !is_date_shaped(input) {
        return Err(invalid());
    }

    let parts: Vec<&str> = input.trim().split('-').collect();
    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else if parts[2].len() == 4 {
        (parts[2], parts[1], parts[0])
    } else {
        return Err(invalid());
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

fn is_date_shaped(input: &str) -> bool {
    let parts: Vec<&str> = input.trim().split('-').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 4 && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Collapses runs of whitespace to single spaces, keeping case.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercases (ASCII only, so byte offsets are kept) and collapses whitespace.
pub(crate) fn normalize_words(s: &str) -> String {
    collapse_whitespace(s).to_ascii_lowercase()
}

/// Byte offset of the first occurrence of `phrase` in `haystack` on word boundaries.
pub(crate) fn find_phrase(haystack: &str, phrase: &str) -> Option<usize> {
    if phrase.is_empty() {
        return None;
    }
    let bytes = haystack.as_bytes();
    haystack
        .match_indices(phrase)
        .map(|(start, _)| start)
        .find(|&start| {
            let end = start + phrase.len();
            let before = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
            let after = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
            before && after
        })
}

/// Returns true if `phrase` occurs in `haystack` on word boundaries.
pub(crate) fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    find_phrase(haystack, phrase).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("2023-12-31").unwrap(), "2023-12-31");
        assert_eq!(normalize_date("31-12-2023").unwrap(), "2023-12-31");
        assert_eq!(normalize_date("3-6-2023").unwrap(), "2023-06-03");
        assert_eq!(normalize_date("03-6-2023").unwrap(), "2023-06-03");
        assert_eq!(normalize_date(" 2023-3-31 ").unwrap(), "2023-03-31");
    }

    #[test]
    fn test_normalize_date_is_idempotent() {
        for input in ["3-6-2023", "30-06-2023", "1-1-2024", "2024-12-31", "29-2-2024"] {
            let once = normalize_date(input).unwrap();
            assert_eq!(normalize_date(&once).unwrap(), once, "input {input}");
        }
    }

    #[test]
    fn test_normalize_date_rejects_bad_dates() {
        for input in ["31-02-2023", "2023-13-01", "12-31-23", "2023-12", "a-b-c", "1-1-1-2024"] {
            assert!(
                matches!(normalize_date(input), Err(FiscalError::InvalidDate(_))),
                "input {input}"
            );
        }
    }

    #[test]
    fn test_descriptor_by_shape() {
        assert_eq!(
            PeriodDescriptor::parse("3-6-2023").unwrap(),
            PeriodDescriptor::LiteralDate {
                date: NaiveDate::from_ymd_opt(2023, 6, 3).unwrap()
            }
        );
        assert_eq!(
            PeriodDescriptor::parse("Q1 2023").unwrap(),
            PeriodDescriptor::StructuredTerm {
                label: "Q1 2023".to_string()
            }
        );
        assert_eq!(
            PeriodDescriptor::parse("Most Recent").unwrap(),
            PeriodDescriptor::Relative(RelativePeriod::MostRecent)
        );
        assert_eq!(
            PeriodDescriptor::parse("  ").unwrap(),
            PeriodDescriptor::Relative(RelativePeriod::MostRecent)
        );
        assert!(PeriodDescriptor::parse("31-02-2023").is_err());
    }

    #[test]
    fn test_term_label_aliases() {
        let q1 = TermLabel::new(TermPeriod::ThreeMonths, Some(2023));
        assert_eq!(TermLabel::parse("Q1 2023"), Some(q1));
        assert_eq!(TermLabel::parse("q1 fy2023"), Some(q1));
        assert_eq!(TermLabel::parse("First Quarter 2023"), Some(q1));
        assert_eq!(TermLabel::parse("3M FY2023"), Some(q1));

        let fy = TermLabel::new(TermPeriod::TwelveMonths, Some(2022));
        assert_eq!(TermLabel::parse("FY2022"), Some(fy));
        assert_eq!(TermLabel::parse("FY 2022"), Some(fy));
        assert_eq!(TermLabel::parse("full year 2022"), Some(fy));
        assert_eq!(TermLabel::parse("Q4 2022"), Some(fy));

        assert_eq!(
            TermLabel::parse("trailing twelve months"),
            Some(TermLabel::new(TermPeriod::Ttm, None))
        );
        assert_eq!(
            TermLabel::parse("H1 2024"),
            Some(TermLabel::new(TermPeriod::SixMonths, Some(2024)))
        );
    }

    #[test]
    fn test_term_label_rejects_unknown() {
        assert_eq!(TermLabel::parse("Q5 2023"), None);
        assert_eq!(TermLabel::parse("sometime"), None);
        assert_eq!(TermLabel::parse(""), None);
    }

    #[test]
    fn test_term_label_display() {
        assert_eq!(
            TermLabel::new(TermPeriod::NineMonths, Some(2021)).to_string(),
            "9M FY2021"
        );
        assert_eq!(TermLabel::new(TermPeriod::Ttm, None).to_string(), "TTM");
    }

    #[test]
    fn test_term_period_from_str() {
        assert_eq!("12m".parse::<TermPeriod>().unwrap(), TermPeriod::TwelveMonths);
        assert_eq!("TTM".parse::<TermPeriod>().unwrap(), TermPeriod::Ttm);
        assert!("4M".parse::<TermPeriod>().is_err());
    }

    #[test]
    fn test_contains_phrase_word_boundaries() {
        assert!(contains_phrase("net income ttm", "ttm"));
        assert!(contains_phrase("eps (ttm)", "ttm"));
        assert!(!contains_phrase("bottmline", "ttm"));
        assert!(!contains_phrase("q12", "q1"));
    }
}
