#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fiscal/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Storage for fiscal metric queries.
//!
//! [`SqliteStore`] implements both [`TermCalendar`](fiscal_core::TermCalendar)
//! and [`MetricStore`](fiscal_core::MetricStore) from `fiscal-core`.

/// SQLite-backed store.
pub mod sqlite;

pub use sqlite::SqliteStore;
