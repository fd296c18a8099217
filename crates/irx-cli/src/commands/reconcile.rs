//! `irx reconcile`: load registry and batch, reconcile against Postgres,
//! optionally journal, print a summary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use irx_audit::JournalWriter;
use irx_db::PgStore;
use irx_reconcile::{BatchReport, Reconciler};
use tracing::{info, warn};

use super::{load_batch, load_registry};

pub struct ReconcileArgs {
    pub input: String,
    pub config_paths: Vec<String>,
    pub journal: Option<String>,
    pub hash_chain: bool,
    pub json: bool,
    pub strict: bool,
}

pub async fn run(args: ReconcileArgs) -> Result<()> {
    let loaded = load_registry(&args.config_paths)?;
    let batch = load_batch(&args.input)?;
    info!(
        config_hash = loaded.config_hash.as_str(),
        entity_types = loaded.registry.len(),
        "registry loaded"
    );

    let pool = irx_db::connect_from_env().await?;
    let mut reconciler = Reconciler::new(Arc::new(loaded.registry), PgStore::new(pool));

    // Ctrl-C stops the run between records; applied writes are kept.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after the current record");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let report = reconciler.run_batch_cancellable(batch, &cancel).await;

    if let Some(path) = &args.journal {
        let mut w = JournalWriter::new(path, args.hash_chain)?;
        let n = w
            .write_report(&report)
            .with_context(|| format!("write journal failed: {path}"))?;
        info!(path = path.as_str(), entries = n, "journal written");
    }

    if args.json {
        let s = serde_json::to_string_pretty(&report).context("serialize report failed")?;
        println!("{s}");
    } else {
        print_summary(&report, &loaded.config_hash);
    }

    if report.cancelled {
        anyhow::bail!("CANCELLED: run {} stopped before the batch finished", report.run_id);
    }
    if args.strict && report.stats.global.failed > 0 {
        anyhow::bail!(
            "RECORDS_FAILED: {} record(s) failed in run {}",
            report.stats.global.failed,
            report.run_id
        );
    }
    Ok(())
}

fn print_summary(report: &BatchReport, config_hash: &str) {
    let g = &report.stats.global;
    println!("run_id={}", report.run_id);
    println!("config_hash={}", config_hash);
    println!("cancelled={}", report.cancelled);
    println!(
        "total={} inserted={} updated={} skipped={} failed={}",
        g.total, g.inserted, g.updated, g.skipped, g.failed
    );
    for (entity, c) in &report.stats.per_entity {
        println!(
            "entity={} total={} inserted={} updated={} skipped={} failed={}",
            entity, c.total, c.inserted, c.updated, c.skipped, c.failed
        );
    }
}
