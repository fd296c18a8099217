use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::Outcome;

/// Outcome counters for one scope (global or one entity type).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounters {
    pub total: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl OutcomeCounters {
    pub fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &OutcomeCounters) {
        self.total += other.total;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    /// `total == inserted + updated + skipped + failed`.
    pub fn is_balanced(&self) -> bool {
        self.total == self.inserted + self.updated + self.skipped + self.failed
    }
}

/// Snapshot of a run: global counters plus one set per entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub global: OutcomeCounters,
    /// Deterministic ordering by entity type.
    pub per_entity: BTreeMap<String, OutcomeCounters>,
}

impl RunStatistics {
    pub fn entity(&self, entity_type: &str) -> OutcomeCounters {
        self.per_entity
            .get(entity_type)
            .copied()
            .unwrap_or_default()
    }

    /// Fold another accumulator into this one (per-worker accumulation).
    pub fn merge(&mut self, other: &RunStatistics) {
        self.global.merge(&other.global);
        for (k, c) in &other.per_entity {
            self.per_entity.entry(k.clone()).or_default().merge(c);
        }
    }

    /// Every scope balances and the per-entity counters sum to the global ones.
    pub fn is_consistent(&self) -> bool {
        let mut sum = OutcomeCounters::default();
        for c in self.per_entity.values() {
            if !c.is_balanced() {
                return false;
            }
            sum.merge(c);
        }
        self.global.is_balanced() && sum == self.global
    }
}

/// Additive outcome tracker owned by one reconciler.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    stats: RunStatistics,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all counters and pre-seed `entity_types` at zero so they appear
    /// in the snapshot even when no record arrives for them.
    pub fn reset<'a>(&mut self, entity_types: impl IntoIterator<Item = &'a str>) {
        self.stats = RunStatistics::default();
        for t in entity_types {
            self.stats.per_entity.insert(t.to_string(), OutcomeCounters::default());
        }
    }

    pub fn record(&mut self, entity_type: &str, outcome: Outcome) {
        self.stats.global.record(outcome);
        self.stats
            .per_entity
            .entry(entity_type.to_string())
            .or_default()
            .record(outcome);
    }

    pub fn snapshot(&self) -> RunStatistics {
        self.stats.clone()
    }
}
