//! irx-audit
//!
//! Append-only outcome journal. One JSON line per record outcome, plus one
//! summary line per run. With hash chaining enabled every line carries the
//! hash of the previous line, so any edit, reorder, or deletion is detected
//! by [`verify_hash_chain`].
//!
//! This module does **not**:
//! - read the database,
//! - decide outcomes (it only records [`RecordEvent`]s it is handed).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use irx_reconcile::normalizer::canonical_json;
use irx_reconcile::{BatchReport, RecordEvent, RunStatistics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const KIND_RECORD: &str = "record";
pub const KIND_SUMMARY: &str = "summary";

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the file, starting at 0.
    pub seq: u64,
    pub run_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    /// [`KIND_RECORD`] or [`KIND_SUMMARY`].
    pub kind: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Append-only JSONL writer for reconciliation outcomes.
pub struct JournalWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl JournalWriter {
    /// Start a writer at `path`, creating parent directories.
    ///
    /// If the file already holds entries the writer continues after them:
    /// the sequence and (when chaining) the previous hash are restored from
    /// the last line.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }

        let mut w = Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        };
        if let Some(last) = read_last_entry(&w.path)? {
            w.seq = last.seq + 1;
            w.last_hash = last.hash_self;
        }
        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Number of entries in the file (= seq of the next entry).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one record outcome.
    pub fn append_event(&mut self, run_id: Uuid, event: &RecordEvent) -> Result<JournalEntry> {
        let payload = serde_json::to_value(event).context("serialize record event failed")?;
        self.append(run_id, KIND_RECORD, payload)
    }

    /// Append the closing summary of a run.
    pub fn append_summary(
        &mut self,
        run_id: Uuid,
        stats: &RunStatistics,
        cancelled: bool,
    ) -> Result<JournalEntry> {
        let payload = serde_json::json!({
            "cancelled": cancelled,
            "stats": stats,
        });
        self.append(run_id, KIND_SUMMARY, payload)
    }

    /// Journal a whole batch report: every event in order, then the summary.
    pub fn write_report(&mut self, report: &BatchReport) -> Result<usize> {
        for ev in &report.events {
            self.append_event(report.run_id, ev)?;
        }
        self.append_summary(report.run_id, &report.stats, report.cancelled)?;
        Ok(report.events.len() + 1)
    }

    fn append(&mut self, run_id: Uuid, kind: &str, payload: Value) -> Result<JournalEntry> {
        let mut entry = JournalEntry {
            seq: self.seq,
            run_id,
            ts_utc: Utc::now(),
            kind: kind.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            entry.hash_prev = self.last_hash.clone();
            let h = compute_entry_hash(&entry)?;
            entry.hash_self = Some(h.clone());
            self.last_hash = Some(h);
        }

        append_line(&self.path, &canonical_line(&entry)?)?;
        self.seq += 1;
        Ok(entry)
    }
}

fn read_last_entry(path: &Path) -> Result<Option<JournalEntry>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("read journal {:?}", path))?;
    match content.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(line) => {
            let entry: JournalEntry = serde_json::from_str(line.trim())
                .with_context(|| format!("parse last journal entry in {:?}", path))?;
            Ok(Some(entry))
        }
        None => Ok(None),
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open journal {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write journal line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

fn canonical_line(entry: &JournalEntry) -> Result<String> {
    let raw = serde_json::to_value(entry).context("serialize journal entry failed")?;
    Ok(canonical_json(&raw))
}

/// SHA-256 of the canonical line with `hash_self` cleared.
pub fn compute_entry_hash(entry: &JournalEntry) -> Result<String> {
    let mut unsigned = entry.clone();
    unsigned.hash_self = None;
    let line = canonical_line(&unsigned)?;
    Ok(hex::encode(Sha256::digest(line.as_bytes())))
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Outcome of verifying a journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read journal {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Check sequence continuity, `hash_prev` linkage, and every `hash_self`.
///
/// An unparseable line is an error rather than a `Broken` result.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut expected_seq = 0u64;
    let mut count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line_no = i + 1;
        let entry: JournalEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("parse journal entry at line {line_no}"))?;
        count += 1;

        if entry.seq != expected_seq {
            return Ok(VerifyResult::Broken {
                line: line_no,
                reason: format!("seq mismatch: expected {expected_seq}, got {}", entry.seq),
            });
        }
        if entry.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: line_no,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, entry.hash_prev
                ),
            });
        }
        if let Some(claimed) = &entry.hash_self {
            let recomputed = compute_entry_hash(&entry)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: line_no,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = entry.hash_self.clone();
        expected_seq += 1;
    }

    Ok(VerifyResult::Valid { lines: count })
}

/// Read every entry of a journal (no verification).
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<JournalEntry>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read journal {:?}", path.as_ref()))?;
    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line.trim()) {
            Ok(e) => out.push(e),
            Err(e) => bail!("parse journal entry at line {}: {e}", i + 1),
        }
    }
    Ok(out)
}
