//! Test support shared by the scenario tests under `tests/`.
//!
//! - [`MemoryStore`]: in-process [`irx_reconcile::Store`] with call capture
//!   and fault injection.
//! - fixtures: the shipped registry and small helpers for building records.
//!
//! No database or network is touched here.

mod fixtures;
mod memory_store;

pub use fixtures::{batch, default_registry, record, unit_test_record};
pub use memory_store::{Fault, MemoryStore, StoreCall};
