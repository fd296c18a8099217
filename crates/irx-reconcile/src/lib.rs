//! irx-reconcile
//!
//! Record reconciliation engine.
//!
//! For every incoming `(entity type, record)` pair the engine:
//! - finds the persisted row by the entity type's unique key,
//! - decides insert / update / skip using type-aware comparison
//!   (structured fields compared as documents, everything else as text),
//! - writes only the fields that changed,
//! - counts exactly one terminal outcome per record.
//!
//! Storage is reached only through the [`Store`] trait; this crate issues no
//! SQL and opens no connections.

mod differ;
mod engine;
mod error;
pub mod normalizer;
mod stats;
mod store;
mod types;

pub use differ::diff;
pub use engine::{clean_record_keys, lookup_columns, BatchReport, Reconciler};
pub use error::ReconcileError;
pub use stats::{OutcomeCounters, RunStatistics, StatsTracker};
pub use store::Store;
pub use types::*;
