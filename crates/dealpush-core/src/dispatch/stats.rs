//! Batch summary.

use std::fmt;

use crate::upsert::{DeliveryOutcome, FailureReason};

/// A record that ended in [`DeliveryOutcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub id: i64,
    pub name: String,
    pub reason: FailureReason,
}

/// A record the endpoint accepted but did not store (blacklisted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSuppression {
    pub id: i64,
    pub name: String,
}

/// Counts per outcome. Once a batch completes, `total == sent + suppressed + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub sent: usize,
    pub suppressed: usize,
    pub failed: usize,
    /// Suppressed records in the order their outcomes arrived.
    pub suppressions: Vec<RecordSuppression>,
    /// Failed records in the order their outcomes arrived.
    pub failures: Vec<RecordFailure>,
}

impl BatchStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, id: i64, name: &str, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Sent => self.sent += 1,
            DeliveryOutcome::Suppressed => {
                self.suppressed += 1;
                self.suppressions.push(RecordSuppression {
                    id,
                    name: name.to_string(),
                });
            }
            DeliveryOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(RecordFailure {
                    id,
                    name: name.to_string(),
                    reason: reason.clone(),
                });
            }
        }
    }

    /// Outcomes accounted for so far.
    pub fn accounted(&self) -> usize {
        self.sent + self.suppressed + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.accounted() == self.total
    }

    /// Failed records that were cancelled rather than rejected.
    pub fn cancelled(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.reason.is_cancelled())
            .count()
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} sent={} suppressed={} failed={}",
            self.total, self.sent, self.suppressed, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_outcome() {
        let mut stats = BatchStats::new(4);
        stats.record(1, "a", &DeliveryOutcome::Sent);
        stats.record(2, "b", &DeliveryOutcome::Suppressed);
        stats.record(3, "c", &DeliveryOutcome::Failed(FailureReason::Cancelled));
        assert!(!stats.is_complete());
        stats.record(
            4,
            "d",
            &DeliveryOutcome::Failed(FailureReason::Status {
                code: 400,
                body: "bad".into(),
            }),
        );
        assert!(stats.is_complete());
        assert_eq!((stats.sent, stats.suppressed, stats.failed), (1, 1, 2));
        assert_eq!(stats.cancelled(), 1);
        assert_eq!(stats.failures[1].id, 4);
        assert_eq!(
            stats.suppressions,
            vec![RecordSuppression {
                id: 2,
                name: "b".into()
            }]
        );
        assert_eq!(stats.to_string(), "total=4 sent=1 suppressed=1 failed=2");
    }
}
