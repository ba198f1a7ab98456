//! Batch dispatcher.
//!
//! Runs one task per record. Each task takes a token from the shared
//! [`RateLimiter`], then a slot from the [`ConcurrencyGate`], then delivers
//! the record through the shared [`UpsertClient`]. Outcomes flow to a single
//! aggregator task that owns [`BatchStats`].

mod aggregate;
mod gate;
mod rate;
mod stats;

pub use gate::{ConcurrencyGate, GatePermit};
pub use rate::{RateLimiter, MAX_REQUESTS_PER_SECOND};
pub use stats::{BatchStats, RecordFailure, RecordSuppression};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::record::Record;
use crate::upsert::{DeliveryReport, UpsertClient};

use self::aggregate::{spawn_aggregator, OutcomeMessage};

/// Largest concurrency a config may ask for.
pub const MAX_CONCURRENCY: usize = 4096;

/// Upper bound on outcomes buffered between workers and the aggregator.
const OUTCOME_BUFFER: usize = 2 * MAX_CONCURRENCY;

/// Limits for one batch run.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Maximum deliveries in flight (at least 1).
    pub concurrency: usize,
    /// Global cap on new deliveries per second; `0` means unlimited.
    pub requests_per_second: u32,
    /// Cancel the whole batch after this long.
    pub deadline: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            requests_per_second: 10,
            deadline: None,
        }
    }
}

pub struct Dispatcher {
    client: Arc<UpsertClient>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(client: UpsertClient, options: DispatchOptions) -> Self {
        Self {
            client: Arc::new(client),
            options,
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Deliver every record and return the summary.
    ///
    /// Returns once every record has an outcome. Cancelling `cancel` (or
    /// reaching the configured deadline) stops records that have not started
    /// and interrupts in-flight ones; both are counted as cancelled failures,
    /// so `total == sent + suppressed + failed` always holds.
    pub async fn run(&self, records: Vec<Record>, cancel: CancellationToken) -> BatchStats {
        let total = records.len();
        let cancel = cancel.child_token();
        let deadline = self
            .options
            .deadline
            .map(|after| spawn_deadline(after, cancel.clone()));

        let gate = Arc::new(ConcurrencyGate::new(self.options.concurrency));
        let rate = Arc::new(RateLimiter::new(self.options.requests_per_second));
        let (tx, rx) = mpsc::channel(gate.limit().saturating_mul(2).min(OUTCOME_BUFFER));
        let aggregator = spawn_aggregator(total, rx);

        tracing::info!(
            total,
            concurrency = gate.limit(),
            rps = self.options.requests_per_second,
            endpoint = self.client.endpoint(),
            "dispatching batch"
        );

        let mut workers = JoinSet::new();
        for record in records {
            let client = Arc::clone(&self.client);
            let gate = Arc::clone(&gate);
            let rate = Arc::clone(&rate);
            let cancel = cancel.clone();
            let tx = tx.clone();
            workers.spawn(async move {
                let report = deliver_gated(&client, &rate, &gate, &record, &cancel).await;
                let msg = OutcomeMessage {
                    id: record.id,
                    name: record.name,
                    report,
                };
                if tx.send(msg).await.is_err() {
                    tracing::error!("aggregator closed before all outcomes were reported");
                }
            });
        }
        drop(tx);

        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                tracing::error!("upsert worker failed: {}", e);
            }
        }
        if let Some(deadline) = deadline {
            deadline.abort();
        }

        let (mut stats, received) = match aggregator.await {
            Ok(agg) => agg,
            Err(e) => {
                tracing::error!("aggregator failed: {}", e);
                (BatchStats::new(total), 0)
            }
        };
        let missing = total.saturating_sub(received);
        if missing > 0 {
            tracing::error!(missing, "records produced no outcome; counting them as failed");
            stats.failed += missing;
        }

        tracing::info!(
            total = stats.total,
            sent = stats.sent,
            suppressed = stats.suppressed,
            failed = stats.failed,
            cancelled = stats.cancelled(),
            "batch finished"
        );
        stats
    }
}

/// Pass both gates, then deliver. The gate permit is held only for the delivery.
async fn deliver_gated(
    client: &UpsertClient,
    rate: &RateLimiter,
    gate: &ConcurrencyGate,
    record: &Record,
    cancel: &CancellationToken,
) -> DeliveryReport {
    if !rate.acquire(cancel).await {
        return DeliveryReport::abandoned();
    }
    let Some(_permit) = gate.acquire(cancel).await else {
        return DeliveryReport::abandoned();
    };
    client.deliver(record, cancel).await
}

fn spawn_deadline(after: Duration, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(after) => {
                tracing::warn!(deadline_ms = after.as_millis() as u64, "batch deadline reached, cancelling");
                cancel.cancel();
            }
        }
    })
}
