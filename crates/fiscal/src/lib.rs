#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fiscal/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Fiscal period resolution and metric query dispatch.
//!
//! This crate turns a company, a metric name and a free-form period term into
//! exactly one query against a metric store. It re-exports the core types and
//! the SQLite store, and provides the [`Resolver`].
//!
//! Period terms come in three shapes:
//!
//! - Date literals: `2023-12-31`, `31-12-2023`, `1-3-2023`
//! - Term labels: `Q1 2023`, `FY2022`, `nine months 2023`
//! - Relative phrases: `latest`, `previous quarter`, `ytd`
//!
//! Metric names are classified into regular, TTM and dissection-derived
//! metrics (`PAT Per Share`, `Revenue Annual Growth`) by a [`Vocabulary`].
//!
//! # Example
//!
//! ```rust,ignore
//! use fiscal::{QueryOutcome, Resolver, SqliteStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> fiscal::Result<()> {
//!     let store = Arc::new(SqliteStore::new("fundamentals.db")?);
//!     let resolver = Resolver::from_source(store).load_vocabulary().await?;
//!
//!     match resolver
//!         .resolve_and_dispatch("HBL", "PAT Per Share", "2023-12-31", "Unconsolidated")
//!         .await
//!     {
//!         QueryOutcome::Rows(df) => println!("{df}"),
//!         other => println!("{}", other.message()),
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use fiscal_core::*;

// Storage
pub use fiscal_store::SqliteStore;

mod resolver;
pub use resolver::{QueryOutcome, Resolver};
