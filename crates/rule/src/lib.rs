// Rust guideline compliant 2026-10-19

//! Correlation and rule engine for the fraud-alert pipeline.
//!
//! [`ThresholdRule`] implements the `domain::FraudRule` port: a window is
//! flagged when it holds at least `min_transactions` transactions and its
//! total exceeds the account's average spend. The rule is pure; replacing it
//! with a richer model touches neither codecs nor orchestration.

use domain::{AccountKey, FraudRule, Verdict, WindowAggregate};

/// Default minimum transaction count for a window to be considered.
pub const DEFAULT_MIN_TRANSACTIONS: i64 = 2;

// ---------------------------------------------------------------------------
// ThresholdRule
// ---------------------------------------------------------------------------

/// Threshold heuristic: `count >= min_transactions AND total > average_spend`.
///
/// An absent operand makes its condition false, so any of `transaction_count`,
/// `total_amount` or `average_spend` being `None` yields a negative verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdRule {
    min_transactions: i64,
}

impl ThresholdRule {
    /// Create a rule with a custom minimum transaction count.
    #[must_use]
    pub fn new(min_transactions: i64) -> Self {
        Self { min_transactions }
    }

    /// Minimum transaction count this rule requires.
    #[must_use]
    pub fn min_transactions(&self) -> i64 {
        self.min_transactions
    }
}

impl Default for ThresholdRule {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TRANSACTIONS)
    }
}

impl FraudRule for ThresholdRule {
    fn evaluate(&self, key: &AccountKey, aggregate: &WindowAggregate) -> Verdict {
        let busy = aggregate
            .transaction_count
            .is_some_and(|count| count >= self.min_transactions);
        let over_baseline = match (aggregate.total_amount, key.average_spend) {
            (Some(total), Some(average)) => total > average,
            _ => false,
        };
        let is_fraudulent = busy && over_baseline;
        tracing::trace!(busy, over_baseline, is_fraudulent, "rule.threshold.evaluated");

        Verdict {
            is_fraudulent,
            total_amount: aggregate.total_amount,
            transaction_count: aggregate.transaction_count,
            average_spend: key.average_spend,
            time_range: aggregate.time_range(),
        }
    }

    fn name(&self) -> &str {
        "threshold"
    }
}
