//! Database module: row models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: typed row models and the skip-vs-overwrite decision.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `stream_tally::db` — we re-export the
//! repository API and commonly used models for convenience.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{decide, RowCounts, StoredRow, WriteAction};
