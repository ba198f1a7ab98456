//! Single-writer aggregation of per-record outcomes.
//!
//! Workers never touch [`BatchStats`]. They send one [`OutcomeMessage`] each
//! and this task applies it and writes the record's log line, so a counter
//! update and its log line always go together.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::upsert::{DeliveryOutcome, DeliveryReport};

use super::stats::BatchStats;

#[derive(Debug)]
pub(super) struct OutcomeMessage {
    pub id: i64,
    pub name: String,
    pub report: DeliveryReport,
}

/// Stats plus the number of messages actually received.
pub(super) type Aggregate = (BatchStats, usize);

pub(super) fn spawn_aggregator(
    total: usize,
    mut rx: mpsc::Receiver<OutcomeMessage>,
) -> JoinHandle<Aggregate> {
    tokio::spawn(async move {
        let mut stats = BatchStats::new(total);
        let mut received = 0usize;
        while let Some(msg) = rx.recv().await {
            log_outcome(&msg);
            stats.record(msg.id, &msg.name, &msg.report.outcome);
            received += 1;
        }
        (stats, received)
    })
}

fn log_outcome(msg: &OutcomeMessage) {
    let OutcomeMessage { id, name, report } = msg;
    match &report.outcome {
        DeliveryOutcome::Sent => {
            tracing::info!(id, name = %name, attempts = report.attempts, "sent");
        }
        DeliveryOutcome::Suppressed => {
            tracing::info!(
                id,
                name = %name,
                attempts = report.attempts,
                suppressed = true,
                "suppressed (blacklist)"
            );
        }
        DeliveryOutcome::Failed(reason) => {
            tracing::warn!(
                id,
                name = %name,
                attempts = report.attempts,
                reason = %reason,
                "failed"
            );
        }
    }
}
