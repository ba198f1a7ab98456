//! `dealpush push` – upsert a records file.

use anyhow::Result;
use dealpush_core::config::DealpushConfig;
use dealpush_core::dispatch::{BatchStats, Dispatcher};
use dealpush_core::record;
use dealpush_core::upsert::UpsertClient;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct PushOverrides {
    pub api: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<u64>,
    pub concurrency: Option<usize>,
    pub rps: Option<u32>,
    pub no_derive_id: bool,
    pub deadline: Option<u64>,
}

impl PushOverrides {
    pub fn apply(self, mut cfg: DealpushConfig) -> DealpushConfig {
        if let Some(api) = self.api {
            cfg.api_url = api;
        }
        if let Some(key) = self.api_key {
            cfg.api_key = Some(key);
        }
        if let Some(t) = self.timeout {
            cfg.timeout_secs = t;
        }
        if let Some(n) = self.concurrency {
            cfg.concurrency = n;
        }
        if let Some(rps) = self.rps {
            cfg.requests_per_second = rps;
        }
        if self.no_derive_id {
            cfg.derive_ids = false;
        }
        if let Some(d) = self.deadline {
            cfg.deadline_secs = Some(d);
        }
        cfg
    }
}

pub async fn run_push(cfg: &DealpushConfig, file: &Path, overrides: PushOverrides) -> Result<()> {
    let cfg = overrides.apply(cfg.clone());
    cfg.validate()?;

    let mut records = record::load_records(file)?;
    if cfg.derive_ids {
        let assigned = record::assign_missing_ids(&mut records);
        if assigned > 0 {
            tracing::debug!(assigned, "derived ids for records without one");
        }
    }
    let duplicates = record::duplicate_ids(&records);
    if !duplicates.is_empty() {
        tracing::warn!(count = duplicates.len(), "duplicate ids in batch");
        println!("warning: {} duplicate id(s): {:?}", duplicates.len(), duplicates);
    }

    let client = UpsertClient::new(cfg.upsert_config())?;
    let dispatcher = Dispatcher::new(client, cfg.dispatch_options());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling remaining records");
            on_ctrl_c.cancel();
        }
    });

    let stats = dispatcher.run(records, cancel).await;
    ctrl_c.abort();

    for line in summary_lines(&stats) {
        println!("{}", line);
    }
    Ok(())
}

/// Stdout report: SUPP lines, then FAIL lines, then the DONE totals.
fn summary_lines(stats: &BatchStats) -> Vec<String> {
    let mut lines = Vec::with_capacity(stats.suppressions.len() + stats.failures.len() + 1);
    for s in &stats.suppressions {
        lines.push(format!("SUPP id={} name={:?} (blacklist)", s.id, s.name));
    }
    for f in &stats.failures {
        lines.push(format!("FAIL id={} name={:?} err={}", f.id, f.name, f.reason));
    }
    lines.push(format!("DONE {}", stats));
    lines
}
