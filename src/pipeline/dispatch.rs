//! Result dispatch — one webhook POST per prospect result.
//!
//! Delivery is strictly ordered (intake order) with a fixed pause
//! between consecutive POSTs so the receiving automation is never
//! flooded. A failed delivery is logged and skipped, never retried;
//! the remaining results still go out.

use std::time::Duration;

use super::error::DeliveryError;
use super::traits::DeliverySink;
use super::types::{Batch, OutreachResult};

const WEBHOOK_TIMEOUT_SECS: u64 = 30;

/// Delivery transport backed by a blocking HTTP client.
pub struct WebhookSink {
    client: reqwest::blocking::Client,
}

impl WebhookSink {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for WebhookSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliverySink for WebhookSink {
    fn deliver(&self, callback_url: &str, result: &OutreachResult) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(callback_url)
            .json(result)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    DeliveryError::Connection(e.to_string())
                } else {
                    DeliveryError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Per-batch delivery accounting, for the completion log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Post every result to the batch's callback target, in order, pausing
/// `delivery_delay` between consecutive POSTs. Exactly one delivery
/// attempt per result.
pub fn dispatch_batch(
    sink: &dyn DeliverySink,
    batch: &Batch,
    results: &[OutreachResult],
    delivery_delay: Duration,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    for (i, result) in results.iter().enumerate() {
        if i > 0 && !delivery_delay.is_zero() {
            std::thread::sleep(delivery_delay);
        }

        match sink.deliver(&batch.callback_url, result) {
            Ok(()) => {
                tracing::debug!(
                    batch_id = %batch.id,
                    prospect_id = %result.id,
                    selected = result.selected,
                    "Result delivered"
                );
                summary.delivered += 1;
            }
            Err(e) => {
                tracing::error!(
                    batch_id = %batch.id,
                    prospect_id = %result.id,
                    error = %e,
                    "Result delivery failed, continuing with remaining results"
                );
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        batch_id = %batch.id,
        company = %batch.company,
        delivered = summary.delivered,
        failed = summary.failed,
        "Batch dispatch complete"
    );
    summary
}
