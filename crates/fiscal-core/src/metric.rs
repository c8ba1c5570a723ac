//! Metric vocabulary and classification.
//!
//! A metric name is classified against a [`Vocabulary`] into one of three query
//! paths. Dissection groups are checked first, in vocabulary order, then TTM
//! indicators; everything else is a regular metric.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::{
    error::{FiscalError, Result},
    period::{collapse_whitespace, find_phrase, normalize_words},
};

/// Which query path serves a metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricClassification {
    /// A metric stored directly in the regular value table.
    Regular,
    /// A trailing-twelve-months aggregate.
    Ttm,
    /// A metric derived through a dissection group (growth, per-share, ...).
    DissectionDerived {
        /// Identifier of the dissection group.
        group_id: i64,
    },
}

impl MetricClassification {
    /// Returns the dissection group identifier, if any.
    #[must_use]
    pub const fn group_id(&self) -> Option<i64> {
        match self {
            Self::DissectionDerived { group_id } => Some(*group_id),
            _ => None,
        }
    }

    /// Returns a stable name for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Ttm => "ttm",
            Self::DissectionDerived { .. } => "dissection",
        }
    }
}

/// A classified metric name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedMetric {
    /// The query path for the metric.
    pub classification: MetricClassification,
    /// The underlying metric name with any group label or TTM marker removed.
    ///
    /// `None` when the input was a bare group label such as "Annual Growth".
    pub base_name: Option<String>,
}

impl ClassifiedMetric {
    /// Returns true if the name was a dissection group label with no metric prefix.
    #[must_use]
    pub const fn is_bare_group(&self) -> bool {
        matches!(
            self.classification,
            MetricClassification::DissectionDerived { .. }
        ) && self.base_name.is_none()
    }
}

/// A dissection group: a family of metrics derived from raw figures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DissectionGroup {
    /// Group identifier as stored by the data source.
    pub group_id: i64,
    /// Display label, also matched as an alias.
    pub label: String,
    /// Additional phrases that select this group.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl DissectionGroup {
    /// Creates a group with no extra aliases.
    #[must_use]
    pub fn new(group_id: i64, label: impl Into<String>) -> Self {
        Self {
            group_id,
            label: label.into(),
            aliases: Vec::new(),
        }
    }

    /// Adds aliases to the group.
    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Returns the byte range of the longest label or alias found in `name`.
    ///
    /// `name` must already be normalized with lowercase words.
    fn longest_match(&self, name: &str) -> Option<(usize, usize)> {
        std::iter::once(&self.label)
            .chain(&self.aliases)
            .map(|phrase| normalize_words(phrase))
            .filter(|phrase| !phrase.is_empty())
            .filter_map(|phrase| name.find(&phrase).map(|start| (start, phrase.len())))
            .max_by_key(|&(_, len)| len)
            .map(|(start, len)| (start, start + len))
    }
}

fn default_ttm_markers() -> Vec<String> {
    vec![
        "ttm".to_string(),
        "trailing twelve months".to_string(),
        "trailing 12 months".to_string(),
    ]
}

/// Vocabulary of dissection groups and TTM indicators.
///
/// The vocabulary is configuration owned by the data source's schema; the
/// [`Default`] instance carries the groups known to the standard schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Dissection groups in priority order.
    #[serde(default)]
    pub dissection_groups: Vec<DissectionGroup>,
    /// Phrases that mark a metric name as TTM.
    #[serde(default = "default_ttm_markers")]
    pub ttm_markers: Vec<String>,
    /// Metric names that are always served from the TTM path.
    #[serde(default)]
    pub ttm_metrics: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            dissection_groups: vec![
                DissectionGroup::new(2, "Annual Growth").with_aliases([
                    "yoy growth",
                    "year over year growth",
                    "year-over-year growth",
                ]),
                DissectionGroup::new(1, "Per Share").with_aliases(["/share", "per-share"]),
                DissectionGroup::new(3, "Percentage Of Asset").with_aliases([
                    "% of asset",
                    "percent of asset",
                ]),
                DissectionGroup::new(4, "Percentage Of Sales").with_aliases([
                    "% of sales",
                    "percent of sales",
                    "percentage of revenue",
                    "% of revenue",
                    "percent of revenue",
                ]),
                DissectionGroup::new(5, "Quarterly Growth").with_aliases([
                    "qoq growth",
                    "quarter over quarter growth",
                    "quarter-over-quarter growth",
                    "q/q growth",
                ]),
            ],
            ttm_markers: default_ttm_markers(),
            ttm_metrics: Vec::new(),
        }
    }
}

static DEFAULT_VOCABULARY: LazyLock<Vocabulary> = LazyLock::new(Vocabulary::default);

impl Vocabulary {
    /// Creates a vocabulary with no dissection groups and the default TTM markers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            dissection_groups: Vec::new(),
            ttm_markers: default_ttm_markers(),
            ttm_metrics: Vec::new(),
        }
    }

    /// Parses and validates a vocabulary from JSON.
    ///
    /// # Errors
    /// Returns [`FiscalError::Config`] if the JSON is malformed or a group is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let vocabulary: Self =
            serde_json::from_str(json).map_err(|e| FiscalError::Config(e.to_string()))?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    /// Checks that group labels are non-empty and group identifiers are unique.
    ///
    /// # Errors
    /// Returns [`FiscalError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (i, group) in self.dissection_groups.iter().enumerate() {
            if group.label.trim().is_empty() {
                return Err(FiscalError::Config(format!(
                    "dissection group {} has an empty label",
                    group.group_id
                )));
            }
            if self.dissection_groups[..i]
                .iter()
                .any(|g| g.group_id == group.group_id)
            {
                return Err(FiscalError::Config(format!(
                    "duplicate dissection group id {}",
                    group.group_id
                )));
            }
        }
        Ok(())
    }

    /// Appends a dissection group with the lowest priority.
    #[must_use]
    pub fn with_group(mut self, group: DissectionGroup) -> Self {
        self.dissection_groups.push(group);
        self
    }

    /// Marks a metric name as always served from the TTM path.
    #[must_use]
    pub fn with_ttm_metric(mut self, name: impl Into<String>) -> Self {
        self.ttm_metrics.push(name.into());
        self
    }

    /// Looks up a dissection group by identifier.
    #[must_use]
    pub fn group(&self, group_id: i64) -> Option<&DissectionGroup> {
        self.dissection_groups
            .iter()
            .find(|g| g.group_id == group_id)
    }

    /// Classifies a metric name and extracts its base metric.
    #[must_use]
    pub fn classify(&self, metric_name: &str) -> ClassifiedMetric {
        let shown = collapse_whitespace(metric_name);
        let name = shown.to_ascii_lowercase();

        for group in &self.dissection_groups {
            if let Some((start, end)) = group.longest_match(&name) {
                let base_name = strip_range(&shown, start, end);
                debug!(
                    metric = %shown,
                    group = %group.label,
                    group_id = group.group_id,
                    base = ?base_name,
                    "Classified as dissection metric"
                );
                return ClassifiedMetric {
                    classification: MetricClassification::DissectionDerived {
                        group_id: group.group_id,
                    },
                    base_name,
                };
            }
        }

        if self
            .ttm_metrics
            .iter()
            .any(|m| normalize_words(m) == name)
        {
            debug!(metric = %shown, "Classified as configured TTM metric");
            return ClassifiedMetric {
                classification: MetricClassification::Ttm,
                base_name: non_empty(shown),
            };
        }

        for marker in &self.ttm_markers {
            let marker = normalize_words(marker);
            if let Some(start) = find_phrase(&name, &marker) {
                let base_name = strip_range(&shown, start, start + marker.len());
                debug!(metric = %shown, base = ?base_name, "Classified as TTM metric");
                return ClassifiedMetric {
                    classification: MetricClassification::Ttm,
                    base_name,
                };
            }
        }

        debug!(metric = %shown, "Classified as regular metric");
        ClassifiedMetric {
            classification: MetricClassification::Regular,
            base_name: non_empty(shown),
        }
    }
}

/// Classifies a metric name against the default vocabulary.
#[must_use]
pub fn classify_metric(metric_name: &str) -> MetricClassification {
    DEFAULT_VOCABULARY.classify(metric_name).classification
}

fn strip_range(display: &str, start: usize, end: usize) -> Option<String> {
    let rest = format!("{} {}", &display[..start], &display[end..]);
    let rest = collapse_whitespace(&rest);
    non_empty(
        rest.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ',' | '(' | ')' | ':'))
            .to_string(),
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
