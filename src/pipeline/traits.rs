//! Trait seams between the orchestration core and its collaborators.
//!
//! Two boundaries — the core depends only on these signatures:
//! - Capabilities: the external reasoning calls (company research,
//!   prospect scoring, variant generation, best-variant selection)
//! - DeliverySink: the outbound webhook transport

use super::error::{CapabilityError, DeliveryError};
use super::types::{MessageVariant, OutreachResult, Prospect, ResearchContext, ScoreOutcome, SelectedMessage};

/// External reasoning capabilities consumed by the batch runner.
///
/// Every method receives the quality gate's feedback from the previous
/// rejected attempt (`None` on the first attempt). Implementations fold
/// it into their prompt; deterministic stubs may ignore it.
pub trait Capabilities: Send + Sync {
    /// Research the company once per batch. Returns free-text findings.
    fn research(&self, company: &str, feedback: Option<&str>) -> Result<String, CapabilityError>;

    /// Score one prospect (0-100) against the shared research context.
    fn score_prospect(
        &self,
        prospect: &Prospect,
        context: &ResearchContext,
        feedback: Option<&str>,
    ) -> Result<ScoreOutcome, CapabilityError>;

    /// Generate candidate messages for a selected prospect.
    fn generate_variants(
        &self,
        prospect: &Prospect,
        context: &ResearchContext,
        feedback: Option<&str>,
    ) -> Result<Vec<MessageVariant>, CapabilityError>;

    /// Pick the best variant and score it 1-10.
    fn select_best(
        &self,
        variants: &[MessageVariant],
        prospect: &Prospect,
        context: &ResearchContext,
        feedback: Option<&str>,
    ) -> Result<SelectedMessage, CapabilityError>;
}

/// Outbound delivery transport. Exactly one call per prospect result;
/// the dispatcher never retries a failed delivery.
pub trait DeliverySink: Send + Sync {
    fn deliver(&self, callback_url: &str, result: &OutreachResult) -> Result<(), DeliveryError>;
}
