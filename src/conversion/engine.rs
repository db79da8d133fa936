//! Conversion batch engine

use super::selection::Selection;
use super::summary::{compute_summary, reconcile, ConversionSummary};
use crate::backend::{guarded, Backend, ConversionRequest};
use crate::domain::{ConversionRate, ConversionReceipt, Holder};
use crate::error::{CoreError, CoreResult};

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Validated batch ready for external confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionPlan {
    pub request: ConversionRequest,
    pub summary: ConversionSummary,
}

/// Selection, rate and holder snapshot for one dashboard session.
///
/// Mutating methods take `&mut self`, so a session cannot issue a second
/// execute while one is in flight.
pub struct ConversionBatchEngine {
    /// Backend collaborator
    backend: Arc<dyn Backend>,
    /// Deadline for each backend call
    request_timeout: Duration,
    /// Last holder list fetched from the backend
    holders: Vec<Holder>,
    selection: Selection,
    rate: ConversionRate,
    /// Memoised summary, dropped on any input change
    cached_summary: Option<ConversionSummary>,
    /// Set after a successful execute until holders are refetched
    needs_refresh: bool,
}

impl ConversionBatchEngine {
    pub fn new(backend: Arc<dyn Backend>, rate: ConversionRate, request_timeout: Duration) -> Self {
        Self {
            backend,
            request_timeout,
            holders: Vec::new(),
            selection: Selection::new(),
            rate,
            cached_summary: None,
            needs_refresh: true,
        }
    }

    pub fn rate(&self) -> ConversionRate {
        self.rate
    }

    pub fn holders(&self) -> &[Holder] {
        &self.holders
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// True until holders have been fetched since the last execute
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    pub fn set_rate(&mut self, rate: i64) -> CoreResult<()> {
        let rate = ConversionRate::new(rate).map_err(|e| {
            crate::metrics::record_validation_rejection(e.code());
            e
        })?;
        if rate != self.rate {
            debug!("Conversion rate changed {} -> {}", self.rate, rate);
            self.rate = rate;
            self.invalidate();
        }
        Ok(())
    }

    /// Flip one holder in or out of the selection.
    /// Addresses absent from the holder snapshot are ignored.
    pub fn toggle_holder(&mut self, address: &str) {
        if !self.is_known(address) {
            debug!("Ignoring toggle for unknown holder {}", address);
            return;
        }
        self.selection.toggle(address);
        self.invalidate();
    }

    pub fn select_all<I, S>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known: Vec<String> = addresses
            .into_iter()
            .filter(|a| self.is_known(a.as_ref()))
            .map(|a| a.as_ref().to_string())
            .collect();
        self.selection.extend(known);
        debug!("Selection now holds {} holders", self.selection.len());
        self.invalidate();
    }

    /// Select every holder whose balance reaches `min_balance`.
    /// Returns how many holders were newly selected.
    pub fn select_eligible(&mut self, min_balance: u64) -> usize {
        let mut added = 0;
        for holder in &self.holders {
            if holder.utility_balance >= min_balance && self.selection.insert(holder.address.clone())
            {
                added += 1;
            }
        }
        if added > 0 {
            self.invalidate();
        }
        added
    }

    pub fn clear(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.invalidate();
        }
    }

    /// Replace the holder snapshot and prune selections that no longer exist
    ///
    /// Holders with an empty address are dropped, as are repeated addresses
    /// after their first occurrence.
    pub fn replace_holders(&mut self, holders: Vec<Holder>) {
        let mut seen: HashSet<String> = HashSet::with_capacity(holders.len());
        let mut accepted = Vec::with_capacity(holders.len());
        for holder in holders {
            if holder.address.trim().is_empty() {
                warn!("Dropping holder with empty address from snapshot");
            } else if !seen.insert(holder.address.clone()) {
                warn!("Dropping duplicate holder {} from snapshot", holder.address);
            } else {
                accepted.push(holder);
            }
        }

        self.holders = accepted;
        let known: HashSet<&str> = self.holders.iter().map(|h| h.address.as_str()).collect();
        let pruned = self.selection.retain_known(&known);
        if !pruned.is_empty() {
            info!(
                "Pruned {} selected holders missing from refreshed list",
                pruned.len()
            );
        }
        self.needs_refresh = false;
        self.invalidate();
    }

    /// Fetch the full holder list from the backend.
    /// On failure the previous snapshot and selection are kept.
    pub async fn refresh_holders(&mut self) -> CoreResult<usize> {
        let holders = guarded(
            "fetch_holders",
            self.request_timeout,
            self.backend.fetch_holders(),
        )
        .await?;
        let count = holders.len();
        self.replace_holders(holders);
        debug!("Holder snapshot refreshed: {} holders", count);
        Ok(count)
    }

    /// Summary for the current holders, selection and rate
    pub fn summary(&mut self) -> &ConversionSummary {
        let (holders, selection, rate) = (&self.holders, &self.selection, self.rate);
        self.cached_summary
            .get_or_insert_with(|| compute_summary(holders, selection, rate))
    }

    /// Rate is valid by construction, so only the selection gates execution
    pub fn can_execute(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Validate the batch and describe it for external confirmation
    pub fn prepare(&mut self) -> CoreResult<ConversionPlan> {
        if self.selection.is_empty() {
            crate::metrics::record_validation_rejection(CoreError::EmptySelection.code());
            return Err(CoreError::EmptySelection);
        }

        let summary = self.summary().clone();
        Ok(ConversionPlan {
            request: ConversionRequest {
                request_id: Uuid::new_v4(),
                addresses: self.selection.to_vec(),
                rate: self.rate,
            },
            summary,
        })
    }

    /// Submit the current batch to the backend.
    ///
    /// On success the selection is cleared and holders must be refetched.
    /// On any failure the selection is left exactly as it was.
    pub async fn execute(&mut self) -> CoreResult<ConversionReceipt> {
        let plan = self.prepare()?;
        let request_id = plan.request.request_id;

        info!(
            "Executing conversion batch {}: {} holders at rate {}",
            request_id,
            plan.request.addresses.len(),
            plan.request.rate
        );

        let result = guarded(
            "execute_conversion",
            self.request_timeout,
            self.backend.execute_conversion(plan.request),
        )
        .await;

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Conversion batch {} failed: {}", request_id, e);
                crate::metrics::record_conversion_failed(e.code());
                return Err(e);
            }
        };

        let discrepancies = reconcile(&plan.summary, &receipt);
        if !discrepancies.is_empty() {
            warn!(
                "Receipt {} disagrees with local summary on {} lines: {:?}",
                receipt.batch_id,
                discrepancies.len(),
                discrepancies
            );
            crate::metrics::record_receipt_discrepancies(discrepancies.len());
        }

        crate::metrics::record_conversion_executed(
            receipt.total_utility_spent(),
            receipt.total_security_issued(),
        );
        info!(
            "Conversion batch {} executed: {} utility spent, {} security issued",
            receipt.batch_id,
            receipt.total_utility_spent(),
            receipt.total_security_issued()
        );

        self.selection.clear();
        self.needs_refresh = true;
        self.invalidate();

        Ok(receipt)
    }

    fn is_known(&self, address: &str) -> bool {
        self.holders.iter().any(|h| h.address == address)
    }

    fn invalidate(&mut self) {
        self.cached_summary = None;
    }
}
