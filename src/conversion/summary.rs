//! Pure conversion arithmetic
//!
//! A selected holder always converts its whole utility balance. Whatever is
//! left below the rate mints nothing and is not refunded.

use super::selection::Selection;
use crate::domain::{ConversionRate, ConversionReceipt, Holder};

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionLineResult {
    pub address: String,
    pub display_name: Option<String>,
    pub utility_spent: u64,
    pub security_issued: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub rate: ConversionRate,
    pub lines: Vec<ConversionLineResult>,
    /// Totals are widened so any set of valid balances sums without overflow
    pub total_utility_spent: u128,
    pub total_security_issued: u128,
}

impl ConversionSummary {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Compute the batch summary from scratch.
///
/// Selected addresses missing from `holders` are skipped. Lines follow the
/// selection's iteration order.
pub fn compute_summary(
    holders: &[Holder],
    selection: &Selection,
    rate: ConversionRate,
) -> ConversionSummary {
    let by_address: HashMap<&str, &Holder> =
        holders.iter().map(|h| (h.address.as_str(), h)).collect();

    let lines: Vec<ConversionLineResult> = selection
        .iter()
        .filter_map(|address| by_address.get(address))
        .map(|holder| ConversionLineResult {
            address: holder.address.clone(),
            display_name: holder.display_name.clone(),
            utility_spent: holder.utility_balance,
            security_issued: rate.security_for(holder.utility_balance),
        })
        .collect();

    ConversionSummary {
        rate,
        total_utility_spent: lines.iter().map(|l| u128::from(l.utility_spent)).sum(),
        total_security_issued: lines.iter().map(|l| u128::from(l.security_issued)).sum(),
        lines,
    }
}

/// Difference between the expected summary and what the backend reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiptDiscrepancy {
    /// Expected line absent from the receipt
    Missing { address: String },
    /// Receipt line for an address that was not in the batch
    Unexpected { address: String },
    AmountMismatch {
        address: String,
        expected_security: u64,
        issued_security: u64,
        expected_utility: u64,
        spent_utility: u64,
    },
}

/// Compare a receipt against the summary it was submitted with
pub fn reconcile(summary: &ConversionSummary, receipt: &ConversionReceipt) -> Vec<ReceiptDiscrepancy> {
    let issued: HashMap<&str, _> = receipt
        .issued
        .iter()
        .map(|i| (i.address.as_str(), i))
        .collect();

    let mut discrepancies = Vec::new();
    for line in &summary.lines {
        match issued.get(line.address.as_str()) {
            None => discrepancies.push(ReceiptDiscrepancy::Missing {
                address: line.address.clone(),
            }),
            Some(i)
                if i.security_issued != line.security_issued
                    || i.utility_spent != line.utility_spent =>
            {
                discrepancies.push(ReceiptDiscrepancy::AmountMismatch {
                    address: line.address.clone(),
                    expected_security: line.security_issued,
                    issued_security: i.security_issued,
                    expected_utility: line.utility_spent,
                    spent_utility: i.utility_spent,
                })
            }
            Some(_) => {}
        }
    }

    for i in &receipt.issued {
        if !summary.lines.iter().any(|l| l.address == i.address) {
            discrepancies.push(ReceiptDiscrepancy::Unexpected {
                address: i.address.clone(),
            });
        }
    }

    discrepancies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IssuedAmount;
    use chrono::Utc;
    use uuid::Uuid;

    fn rate(r: i64) -> ConversionRate {
        ConversionRate::new(r).unwrap()
    }

    fn holders() -> Vec<Holder> {
        vec![
            Holder::new("A", 100).with_display_name("Alice"),
            Holder::new("B", 250),
            Holder::new("C", 7),
        ]
    }

    #[test]
    fn test_two_holder_scenario() {
        let selection: Selection = ["A", "B"].into_iter().collect();
        let summary = compute_summary(&holders(), &selection, rate(10));

        assert_eq!(summary.lines.len(), 2);
        assert_eq!(summary.lines[0].address, "A");
        assert_eq!(summary.lines[0].display_name.as_deref(), Some("Alice"));
        assert_eq!(summary.lines[0].utility_spent, 100);
        assert_eq!(summary.lines[0].security_issued, 10);
        assert_eq!(summary.lines[1].address, "B");
        assert_eq!(summary.lines[1].utility_spent, 250);
        assert_eq!(summary.lines[1].security_issued, 25);
        assert_eq!(summary.total_utility_spent, 350);
        assert_eq!(summary.total_security_issued, 35);
    }

    #[test]
    fn test_balance_below_rate_is_fully_spent_for_nothing() {
        let selection: Selection = ["C"].into_iter().collect();
        let summary = compute_summary(&holders(), &selection, rate(10));

        assert_eq!(summary.lines[0].utility_spent, 7);
        assert_eq!(summary.lines[0].security_issued, 0);
        assert_eq!(summary.total_utility_spent, 7);
    }

    #[test]
    fn test_floor_holds_across_rates() {
        let all: Selection = ["A", "B", "C"].into_iter().collect();
        for r in [1, 2, 3, 7, 10, 99, 100, 101, 250, 251, 999, 1000] {
            let summary = compute_summary(&holders(), &all, rate(r));
            for line in &summary.lines {
                assert_eq!(line.security_issued, line.utility_spent / r as u64);
            }
            assert_eq!(summary.total_utility_spent, 357);
            assert_eq!(
                summary.total_security_issued,
                summary.lines.iter().map(|l| u128::from(l.security_issued)).sum::<u128>()
            );
        }
    }

    #[test]
    fn test_compute_is_idempotent() {
        let selection: Selection = ["B", "A", "C"].into_iter().collect();
        let first = compute_summary(&holders(), &selection, rate(3));
        let second = compute_summary(&holders(), &selection, rate(3));
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_unknown_addresses_are_skipped() {
        let selection: Selection = ["A", "ghost"].into_iter().collect();
        let summary = compute_summary(&holders(), &selection, rate(10));
        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.total_utility_spent, 100);
    }

    #[test]
    fn test_totals_do_not_overflow_at_max_balance() {
        let holders = vec![Holder::new("A", u64::MAX), Holder::new("B", u64::MAX), Holder::new("C", 1)];
        let selection: Selection = ["A", "B", "C"].into_iter().collect();
        let summary = compute_summary(&holders, &selection, rate(1));

        assert_eq!(summary.total_utility_spent, 2 * u128::from(u64::MAX) + 1);
        assert_eq!(summary.total_security_issued, 2 * u128::from(u64::MAX) + 1);
        assert_eq!(summary.lines[0].security_issued, u64::MAX);
    }

    #[test]
    fn test_reconcile_flags_each_kind() {
        let selection: Selection = ["A", "B"].into_iter().collect();
        let summary = compute_summary(&holders(), &selection, rate(10));

        let exact = ConversionReceipt {
            batch_id: Uuid::new_v4(),
            rate: rate(10),
            issued: vec![
                IssuedAmount {
                    address: "A".into(),
                    utility_spent: 100,
                    security_issued: 10,
                },
                IssuedAmount {
                    address: "B".into(),
                    utility_spent: 250,
                    security_issued: 25,
                },
            ],
            executed_at: Utc::now(),
        };
        assert!(reconcile(&summary, &exact).is_empty());

        let mut off = exact.clone();
        off.issued[1].security_issued = 24;
        off.issued.remove(0);
        off.issued.push(IssuedAmount {
            address: "Z".into(),
            utility_spent: 1,
            security_issued: 0,
        });

        let found = reconcile(&summary, &off);
        assert_eq!(
            found,
            vec![
                ReceiptDiscrepancy::Missing {
                    address: "A".into()
                },
                ReceiptDiscrepancy::AmountMismatch {
                    address: "B".into(),
                    expected_security: 25,
                    issued_security: 24,
                    expected_utility: 250,
                    spent_utility: 250,
                },
                ReceiptDiscrepancy::Unexpected {
                    address: "Z".into()
                },
            ]
        );
    }
}
