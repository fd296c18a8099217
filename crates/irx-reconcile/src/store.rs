use anyhow::Result;

use crate::types::{ExistingRow, FieldWrite, LookupRequest, UniqueKey};

/// Storage collaborator consumed by the reconciler.
///
/// Implementations must be `Send + Sync`; the reconciler awaits one call at a
/// time, so no call overlaps another from the same reconciler.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Fetch at most one row matching `req.key`, returning only `req.columns`.
    async fn lookup(&self, req: &LookupRequest) -> Result<Option<ExistingRow>>;

    /// Insert a new row with exactly `fields`.
    async fn insert(&self, entity_type: &str, fields: &[FieldWrite]) -> Result<()>;

    /// Set `fields` on the row identified by `key`.
    async fn update(&self, entity_type: &str, fields: &[FieldWrite], key: &UniqueKey) -> Result<()>;
}
