//! Preparation of the Community Health Status Indicators (CHSI) county
//! dataset: loads the fixed set of vendor CSV tables, joins them into one
//! wide per-county table, and produces a cleaned, normalized, imputed
//! matrix for statistical modeling.
//!
//! Everything hangs off [`ChsiHandler`], which owns the page cache, the
//! assembled county table, and the imputation-default cache for its
//! lifetime. Single-threaded, synchronous, one-shot batch semantics.

pub mod error;
pub mod handler;
pub mod schema;
pub mod store;
pub mod truncate;

pub use error::{Error, Result};
pub use handler::ChsiHandler;
pub use schema::{Page, PageIndex};
pub use store::TableStore;
pub use truncate::Truncator;
